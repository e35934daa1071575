//! Transports for toolwire.
//!
//! A [`Connection`] carries framed messages over one byte stream. Two ways
//! of producing one are provided: spawning a child process and using its
//! stdio ([`ProcessTransport`]), and TCP ([`TcpTransport`] for the dialing
//! side, [`tcp::accepted`] for an accepted socket). Any other paired
//! reader/writer (e.g. `tokio::io::duplex` in tests) works through
//! [`Connection::new`].

pub mod connection;
pub mod error;
pub mod process;
pub mod tcp;

pub use connection::Connection;
pub use error::TransportError;
pub use process::ProcessTransport;
pub use tcp::TcpTransport;
