//! Error types for transports.

use thiserror::Error;
use toolwire_protocol::ProtocolError;

/// Errors from establishing or using a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The connection was closed locally; no further sends are possible.
    #[error("connection closed")]
    Closed,

    /// A received line was not a valid message. Fatal for the connection:
    /// line framing cannot be resynchronized.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
