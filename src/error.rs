//! Error types for the chat relay.

use thiserror::Error;

/// Common error type for the chat relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for configuration or user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The session hub task is no longer running.
    #[error("session hub is closed")]
    HubClosed,
}

/// Result type alias for chat relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
