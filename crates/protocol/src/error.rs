//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering malformed request bodies.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to deserialize data.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A request body had the wrong overall shape.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Deserialization(err.to_string())
    }
}
