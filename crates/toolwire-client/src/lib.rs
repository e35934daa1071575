//! Client side of toolwire.
//!
//! A [`Session`] wraps one connection: it performs the initialize handshake,
//! runs a single background reader that routes responses to waiting callers
//! by request id, and exposes `list_tools` / `call_tool` and the resource
//! operations. Multiple tasks may call into one session concurrently; each
//! blocks only on its own pending call.

pub mod config;
pub mod error;
pub mod session;

pub use config::{Endpoint, EndpointConfig};
pub use error::SessionError;
pub use session::{Session, SessionOptions};
