//! Error types for the client layer.

use thiserror::Error;

/// Errors produced by build-system and payload clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// An external command could not be spawned or exited non-zero.
    #[error("command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// An external command exceeded its deadline.
    #[error("command `{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    /// A response was missing a field the caller requires.
    #[error("{context}: missing required field `{field}`")]
    MissingField { context: String, field: String },

    /// A response could not be interpreted.
    #[error("unable to parse {context}: {detail}")]
    Parse { context: String, detail: String },

    /// The queried record does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Process I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
