//! Error types for the server side.

use thiserror::Error;
use toolwire_transport::TransportError;

/// A domain-level failure reported by a tool handler.
///
/// This is not a protocol error: the dispatcher turns it into a successful
/// response whose result carries the `isError` marker.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors from running a serve loop.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
