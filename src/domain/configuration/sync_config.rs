//! Sync configuration domain models.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::AppError;

/// Configuration for the host process, loaded from `propsync.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Voting portal API configuration.
    #[serde(default)]
    pub portal: PortalApiConfig,
    /// Reconciliation timer configuration.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Reconciliation policy.
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Persistence configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Default `env_logger` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            portal: PortalApiConfig::default(),
            schedule: ScheduleConfig::default(),
            reconcile: ReconcileConfig::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        self.portal.validate()?;
        self.schedule.validate()?;
        self.reconcile.validate()?;
        Ok(())
    }
}

/// Voting portal API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalApiConfig {
    /// Base URL of the versioned API, ending with a slash.
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    /// Path of the open-proposal list, relative to `api_url`.
    #[serde(default = "default_open_endpoint")]
    pub open_endpoint: String,
    /// Path prefix of the per-id detail endpoint, relative to `api_url`.
    #[serde(default = "default_detail_endpoint")]
    pub detail_endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for PortalApiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            open_endpoint: default_open_endpoint(),
            detail_endpoint: default_detail_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

impl PortalApiConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.timeout_secs == 0 {
            return Err(AppError::InvalidConfig("timeout_secs must be greater than 0".to_string()));
        }
        if self.open_endpoint.trim().is_empty() {
            return Err(AppError::InvalidConfig("open_endpoint must not be empty".to_string()));
        }
        if self.detail_endpoint.trim().is_empty() {
            return Err(AppError::InvalidConfig("detail_endpoint must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_url() -> Url {
    Url::parse("https://vote.smartcash.cc/api/v1/").expect("Default API URL must be valid")
}

fn default_open_endpoint() -> String {
    "voteproposals".to_string()
}

fn default_detail_endpoint() -> String {
    "voteproposals/detail/".to_string()
}

fn default_timeout() -> u64 {
    20
}

/// Reconciliation timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Delay before the first cycle, in seconds.
    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,
    /// Delay between the end of one cycle and the start of the next, in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { startup_delay_secs: default_startup_delay(), interval_secs: default_interval() }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.interval_secs == 0 {
            return Err(AppError::InvalidConfig("interval_secs must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_startup_delay() -> u64 {
    1
}

fn default_interval() -> u64 {
    120
}

/// Reconciliation policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    /// A reminder fires once the deadline is closer than this, in seconds.
    #[serde(default = "default_reminder_window")]
    pub reminder_window_secs: i64,
    /// Consecutive detail-fetch failures before an ended proposal is left stale.
    #[serde(default = "default_max_detail_attempts")]
    pub max_detail_attempts: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            reminder_window_secs: default_reminder_window(),
            max_detail_attempts: default_max_detail_attempts(),
        }
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.reminder_window_secs <= 0 {
            return Err(AppError::InvalidConfig(
                "reminder_window_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_detail_attempts == 0 {
            return Err(AppError::InvalidConfig(
                "max_detail_attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_reminder_window() -> i64 {
    48 * 60 * 60
}

fn default_max_detail_attempts() -> u32 {
    5
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// SQLite database file holding the proposal history.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_path: default_database_path() }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("proposals.db")
}

fn default_log_level() -> String {
    "info".to_string()
}
