use crate::domain::{AppError, SyncConfig};

/// Parse and validate `propsync.toml` content.
pub fn parse_config_content(content: &str) -> Result<SyncConfig, AppError> {
    let config: SyncConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
