use std::io;

use thiserror::Error;

/// Library-wide error type for propsync operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Configuration or environment issue.
    #[error("{0}")]
    Configuration(String),

    /// Configuration values failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    /// A required proposal attribute is absent from the payload.
    #[error("Malformed proposal: '{0}' not found")]
    MissingField(String),

    /// The payload or its envelope does not have the expected shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Proposal status is not one of the known portal states.
    #[error("Invalid proposal state - {0}")]
    InvalidState(String),

    /// Network failure, non-200 response or an envelope whose status is not OK.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Detail endpoint answered with a different proposal.
    #[error("proposalId mismatch: requested {requested}, received {received}")]
    IdMismatch { requested: u64, received: u64 },

    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl AppError {
    pub fn config_error<S: Into<String>>(message: S) -> Self {
        AppError::Configuration(message.into())
    }

    /// Malformed record; the offending record is skipped.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            AppError::MissingField(_) | AppError::MalformedPayload(_) | AppError::InvalidState(_)
        )
    }

    /// Remote failure; retried on the next timer tick.
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, AppError::Fetch(_) | AppError::IdMismatch { .. })
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::MalformedPayload(e.to_string())
    }
}
