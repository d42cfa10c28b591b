pub mod sync_config;
pub mod sync_config_parser;

pub use sync_config::{PortalApiConfig, ReconcileConfig, ScheduleConfig, StorageConfig, SyncConfig};
