mod memory_proposal_store;
mod notification_sinks;
mod portal_client_http;
mod sqlite_proposal_store;

pub use memory_proposal_store::MemoryProposalStore;
pub use notification_sinks::{ChannelSink, LogSink};
pub use portal_client_http::HttpPortalClient;
pub use sqlite_proposal_store::SqliteProposalStore;
