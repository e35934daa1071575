//! Error types for the wire protocol.

use thiserror::Error;

/// Errors from encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line is not a valid message. Line framing cannot be resynchronized
    /// after a bad line, so receivers treat this as fatal for the connection.
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}
