//! Error types for the GDPR ledger.

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ledger operations
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before touching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown record or request
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Fulfilment of a data subject request failed
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-readable code, stable across message changes
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::Processing(_) => "PROCESSING_FAILED",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}
