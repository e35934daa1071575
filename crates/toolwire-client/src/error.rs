//! Error types for client sessions.

use thiserror::Error;
use toolwire_transport::TransportError;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server answered with a JSON-RPC error object. The connection
    /// survives; only this call failed.
    #[error("JSON-RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    /// The peer violated the protocol (e.g. a response with neither result
    /// nor error, or an unparseable result payload).
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("request '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// The connection closed while the call was pending.
    #[error("connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
