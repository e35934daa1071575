//! Request dispatch: reserved methods, tool invocation, error mapping.

use crate::registry::Registry;
use crate::schema::validate_arguments;
use futures_util::FutureExt;
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use toolwire_protocol::{
    CallToolParams, CallToolResult, CallConvention, INTERNAL_ERROR, INVALID_PARAMS,
    Implementation, InitializeParams, InitializeResult, METHOD_NOT_FOUND, Message,
    PROTOCOL_VERSION, ReadResourceParams, ReadResourceResult, Response, ResourcesListResult,
    RpcError, ToolsListResult, methods,
};

/// Handles decoded messages against one registry.
///
/// Cheap to clone; every per-connection loop gets its own handle on the
/// shared, read-only registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    info: Implementation,
    convention: CallConvention,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, info: Implementation, convention: CallConvention) -> Self {
        Self {
            registry,
            info,
            convention,
        }
    }

    /// Handle one message. Requests produce a response; notifications are
    /// processed identically but produce none (failures are only logged).
    /// A stray response on a server connection is dropped.
    pub async fn dispatch(&self, msg: Message) -> Option<Response> {
        match msg {
            Message::Request(req) => {
                tracing::debug!(method = %req.method, id = %req.id, "dispatching request");
                Some(match self.handle_method(&req.method, req.params).await {
                    Ok(result) => Response::success(req.id, result),
                    Err(error) => Response::failure(req.id, error),
                })
            }
            Message::Notification(n) => {
                if let Err(error) = self.handle_method(&n.method, n.params).await {
                    tracing::debug!(
                        method = %n.method,
                        code = error.code,
                        "notification dispatch failed: {}",
                        error.message
                    );
                }
                None
            }
            Message::Response(resp) => {
                tracing::warn!(id = %resp.id, "dropping unexpected response from peer");
                None
            }
        }
    }

    async fn handle_method(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        match method {
            methods::INITIALIZE => self.initialize(params),
            methods::INITIALIZED => Ok(Value::Null),
            methods::TOOLS_LIST => to_result(&ToolsListResult {
                tools: self.registry.descriptors(),
            }),
            methods::RESOURCES_LIST => to_result(&ResourcesListResult {
                resources: self.registry.resource_descriptors(),
            }),
            methods::RESOURCES_READ => self.read_resource(params),
            other if self.convention.is_call_method(other) => {
                let call = self.parse_call(other, params)?;
                self.call_tool(&call.name, call.arguments).await
            }
            other => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("unknown method '{other}'"),
            )),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, RpcError> {
        if let Some(params) = params {
            match serde_json::from_value::<InitializeParams>(params) {
                Ok(init) => tracing::info!(
                    client = %init.client_info.name,
                    version = %init.client_info.version,
                    "client initialized"
                ),
                Err(e) => tracing::debug!("unparseable initialize params: {e}"),
            }
        }
        to_result(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({"tools": {}, "resources": {}}),
            server_info: self.info.clone(),
        })
    }

    fn parse_call(&self, method: &str, params: Option<Value>) -> Result<CallToolParams, RpcError> {
        match self.convention {
            CallConvention::ToolsCall => {
                let params = params.ok_or_else(|| {
                    RpcError::new(INVALID_PARAMS, "tool call params are missing")
                })?;
                serde_json::from_value(params)
                    .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid tool call params: {e}")))
            }
            CallConvention::MethodPerTool => Ok(CallToolParams {
                name: method.to_string(),
                arguments: params.unwrap_or(Value::Null),
            }),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, RpcError> {
        let Some(tool) = self.registry.get(name) else {
            return Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("unknown tool '{name}'"),
            ));
        };

        if let Err(reason) = validate_arguments(&tool.input_schema(), &arguments) {
            return Err(RpcError::new(INVALID_PARAMS, reason));
        }

        // A panicking handler must not take the serve loop down with it.
        let outcome = AssertUnwindSafe(tool.call(arguments)).catch_unwind().await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => CallToolResult::error(e.to_string()),
            Err(_) => {
                tracing::error!(tool = name, "tool handler panicked");
                return Err(RpcError::new(
                    INTERNAL_ERROR,
                    format!("tool '{name}' failed internally"),
                ));
            }
        };
        to_result(&result)
    }

    fn read_resource(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params: ReadResourceParams = params
            .ok_or_else(|| RpcError::new(INVALID_PARAMS, "resource read params are missing"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| RpcError::new(INVALID_PARAMS, format!("invalid resource read params: {e}")))
            })?;

        match self.registry.read_resource(&params.uri) {
            Some(Ok(contents)) => to_result(&ReadResourceResult {
                contents: vec![contents],
            }),
            Some(Err(e)) => Err(RpcError::new(
                INTERNAL_ERROR,
                format!("failed to read resource '{}': {e}", params.uri),
            )),
            None => Err(RpcError::new(
                METHOD_NOT_FOUND,
                format!("unknown resource '{}'", params.uri),
            )),
        }
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value)
        .map_err(|e| RpcError::new(INTERNAL_ERROR, format!("failed to encode result: {e}")))
}
