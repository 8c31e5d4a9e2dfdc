//! Crate error type

use std::time::Duration;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for session cache and driver operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error (connection string, TLS material, environment)
    #[error("configuration error: {0}")]
    Config(String),

    /// Wire protocol violation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Server reported a command failure (`ok != 1`)
    #[error("server error: {0}")]
    Server(String),

    /// Authentication failure
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Connection closed by the server
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Invalid connection state transition
    #[error("invalid connection state: expected {expected}, got {actual}")]
    InvalidState {
        /// What the state machine would have accepted
        expected: String,
        /// The transition that was attempted
        actual: String,
    },

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation exceeded its configured timeout
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}
