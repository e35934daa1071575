//! Server side of toolwire: a registry of named, schema-typed tools and the
//! dispatch/serve loops that expose them over a connection.
//!
//! Tools are registered before serving begins; the registry is read-only
//! afterwards and shared freely across per-connection tasks. Each connection
//! runs an independent sequential loop: read a request, dispatch it, write
//! the response.

pub mod dispatch;
pub mod error;
pub mod registry;
pub mod schema;
pub mod serve;
pub mod tool;

pub use dispatch::Dispatcher;
pub use error::{ServeError, ToolError};
pub use registry::Registry;
pub use serve::Server;
pub use tool::{FnTool, Tool, ToolFuture};
