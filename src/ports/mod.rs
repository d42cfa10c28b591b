mod notification_sink;
mod proposal_store;
mod remote_source;

pub use notification_sink::{NoopSink, NotificationSink};
pub use proposal_store::ProposalStore;
pub use remote_source::{OpenListing, RemoteSource};
