//! Wire protocol for toolwire.
//!
//! Messages are JSON-RPC 2.0 objects, one per line, UTF-8, `\n`-terminated.
//! This crate defines the three message kinds (request, response,
//! notification), the line codec, the standard error codes, and the shared
//! payload types used by both the client and the server (tool descriptors,
//! call results, initialize payloads, resources).

pub mod convention;
pub mod error;
pub mod jsonrpc;
pub mod types;

pub use convention::CallConvention;
pub use error::ProtocolError;
pub use jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR, Message, Notification, Request,
    RequestId, Response, RpcError, decode_line, encode_line,
};
pub use types::{
    CallToolParams, CallToolResult, Content, Implementation, InitializeParams, InitializeResult,
    ReadResourceParams, ReadResourceResult, ResourceContents, ResourceInfo, ResourcesListResult,
    ToolInfo, ToolsListResult, default_input_schema,
};

/// Protocol revision sent during the initialize handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Reserved method names.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    /// Legacy invocation method: `call_tool` with `tool_name` in params.
    pub const CALL_TOOL_LEGACY: &str = "call_tool";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
}
