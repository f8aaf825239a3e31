//! Error types for Conductor.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown intent: {0}")]
    UnknownIntent(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Backend execution failed: {0}")]
    BackendExecution(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Callback delivery failed: {0}")]
    CallbackDelivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is raised before any job record exists.
    pub fn is_pre_job(&self) -> bool {
        matches!(self, Self::UnknownIntent(_) | Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
