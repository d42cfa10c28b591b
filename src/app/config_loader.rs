//! Host configuration loading.

use std::fs;
use std::path::Path;

use crate::domain::configuration::sync_config_parser::parse_config_content;
use crate::domain::{AppError, SyncConfig};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "propsync.toml";

/// Load the configuration.
///
/// An explicit path must exist. Without one, `propsync.toml` in the working
/// directory is used when present, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig, AppError> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(AppError::Configuration(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            read_config(path)
        }
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.exists() {
                read_config(fallback)
            } else {
                log::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                Ok(SyncConfig::default())
            }
        }
    }
}

fn read_config(path: &Path) -> Result<SyncConfig, AppError> {
    log::debug!("loading config from {}", path.display());
    let content = fs::read_to_string(path)?;
    parse_config_content(&content)
}
