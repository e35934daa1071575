//! The Tool trait and a closure adapter.

use crate::error::ToolError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use toolwire_protocol::{CallToolResult, ToolInfo, default_input_schema};

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<CallToolResult, ToolError>> + Send + 'a>>;

/// A named, schema-typed remote operation.
///
/// `call` receives arguments already validated against `input_schema`. A
/// returned `ToolError` is a domain failure and becomes an `isError` result;
/// protocol-level failures (unknown tool, bad arguments) never reach the
/// handler.
pub trait Tool: Send + Sync {
    /// Unique name within a registry.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// JSON schema for the argument object.
    fn input_schema(&self) -> Value {
        default_input_schema()
    }

    fn call(&self, arguments: Value) -> ToolFuture<'_>;

    /// Descriptor sent in `tools/list`.
    fn descriptor(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

type BoxedHandler =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<CallToolResult, ToolError>> + Send>> + Send + Sync>;

/// A tool backed by an async closure.
pub struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: BoxedHandler,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.schema.clone()
    }

    fn call(&self, arguments: Value) -> ToolFuture<'_> {
        (self.handler)(arguments)
    }
}
