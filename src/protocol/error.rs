//! Protocol error types.

use thiserror::Error;

/// Errors related to protocol message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty payload")]
    Empty,

    #[error("malformed message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}
