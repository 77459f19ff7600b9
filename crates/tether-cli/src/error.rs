use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tether_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Operation ID cannot be empty")]
    EmptyOperationId,
    #[error("No queued operation matches id/prefix: {0}")]
    OperationNotFound(String),
    #[error("{0}")]
    AmbiguousOperationId(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
