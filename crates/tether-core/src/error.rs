//! Error types for tether-core

use thiserror::Error;

use crate::enforcement::EnforcementAction;

/// Result type alias using tether-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tether-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Durable store could not be read or written
    #[error("Durable store unavailable: {0}")]
    StoreUnavailable(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timestamp that is not valid ISO-8601
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid policy configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external enforcement collaborator (logout, purge, audit) failed
    #[error("{action} collaborator failed: {message}")]
    Collaborator {
        action: EnforcementAction,
        message: String,
    },
}

impl Error {
    /// Build a collaborator failure for the given enforcement action.
    pub fn collaborator(action: EnforcementAction, message: impl Into<String>) -> Self {
        Self::Collaborator {
            action,
            message: message.into(),
        }
    }

    /// Whether the failure came from the durable store layer.
    ///
    /// Store failures are retried on the next scheduler tick.
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::LibSql(_) | Self::Io(_))
    }
}
