pub mod configuration;
pub mod error;
pub mod event;
pub mod proposal;

pub use configuration::{
    PortalApiConfig, ReconcileConfig, ScheduleConfig, StorageConfig, SyncConfig,
};
pub use error::AppError;
pub use event::{ChangedFields, FieldChange, FieldValue, ProposalEvent, TrackedField};
pub use proposal::{Channel, OPTIONAL_FIELDS, Proposal, REQUIRED_FIELDS, RawProposal, Tally};
