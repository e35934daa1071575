//! JSON-RPC 2.0 message types and the newline-delimited codec.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

// Standard JSON-RPC error codes.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
/// Also used for "unknown tool": the tool name is the method as far as the
/// caller is concerned.
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// A request correlation id: string or integer, unique per sender while the
/// request is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A JSON-RPC 2.0 response: exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: RequestId, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A JSON-RPC 2.0 notification: no id, no response expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

/// One framed wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

/// Encode a message as exactly one `\n`-terminated line.
pub fn encode_line(msg: &Message) -> Result<String, ProtocolError> {
    match msg {
        Message::Request(r) => to_line(r),
        Message::Response(r) => to_line(r),
        Message::Notification(n) => to_line(n),
    }
}

fn to_line<T: Serialize>(body: &T) -> Result<String, ProtocolError> {
    #[derive(Serialize)]
    struct Wire<'a, T> {
        jsonrpc: &'static str,
        #[serde(flatten)]
        body: &'a T,
    }

    let mut line = serde_json::to_string(&Wire {
        jsonrpc: JSONRPC_VERSION,
        body,
    })?;
    line.push('\n');
    Ok(line)
}

/// Decode one line into a message.
///
/// The kind is inferred from field presence: `method` means request (with
/// `id`) or notification (without), `result`/`error` means response. A line
/// carrying both `result` and `error`, or a request whose `method` is empty,
/// is rejected.
pub fn decode_line(line: &str) -> Result<Message, ProtocolError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ProtocolError::malformed(format!("invalid JSON: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ProtocolError::malformed("message is not a JSON object"))?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some(JSONRPC_VERSION) => {}
        _ => return Err(ProtocolError::malformed("missing or unsupported jsonrpc version")),
    }

    let has_result = obj.contains_key("result");
    let has_error = obj.contains_key("error");
    if has_result && has_error {
        return Err(ProtocolError::malformed(
            "response carries both result and error",
        ));
    }

    if let Some(method) = obj.get("method") {
        let method = method
            .as_str()
            .ok_or_else(|| ProtocolError::malformed("method is not a string"))?;
        if method.is_empty() {
            return Err(ProtocolError::malformed("method is empty"));
        }
        let params = obj.get("params").cloned();
        return match obj.get("id") {
            Some(id) => {
                let id: RequestId = serde_json::from_value(id.clone())
                    .map_err(|_| ProtocolError::malformed("id is not a string or integer"))?;
                Ok(Message::Request(Request::new(id, method, params)))
            }
            None => Ok(Message::Notification(Notification::new(method, params))),
        };
    }

    if has_result || has_error {
        let response: Response = serde_json::from_value(value)
            .map_err(|e| ProtocolError::malformed(format!("invalid response: {e}")))?;
        return Ok(Message::Response(response));
    }

    Err(ProtocolError::malformed(
        "cannot infer message kind: no method, result, or error",
    ))
}
