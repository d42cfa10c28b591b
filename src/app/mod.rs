pub mod config_loader;
mod proposal_book;
mod reconciler;
mod sync_service;

pub use config_loader::{DEFAULT_CONFIG_FILE, load_config};
pub use proposal_book::ProposalBook;
pub use reconciler::{CycleReport, Reconciler};
pub use sync_service::SyncHandle;
