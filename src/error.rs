//! Error types for Parlor.

use thiserror::Error;

/// Common error type for Parlor.
#[derive(Error, Debug)]
pub enum ParlorError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for configuration values.
    #[error("validation error: {0}")]
    Validation(String),

    /// The command processor task has stopped and no longer accepts requests.
    #[error("command processor is not running")]
    ProcessorClosed,
}

/// Result type alias for Parlor operations.
pub type Result<T> = std::result::Result<T, ParlorError>;
