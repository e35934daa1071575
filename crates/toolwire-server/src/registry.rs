//! The tool registry: name → (schema, handler), append-only at startup.

use crate::error::ToolError;
use crate::tool::{FnTool, Tool};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use toolwire_protocol::{CallToolResult, ResourceContents, ResourceInfo, ToolInfo};

type ResourceProvider = Box<dyn Fn() -> Result<String, ToolError> + Send + Sync>;

struct Resource {
    info: ResourceInfo,
    provider: ResourceProvider,
}

/// Registry of tools and read-only resources.
///
/// Registration happens before serving begins; afterwards the registry is
/// read-only and shared across per-connection loops without locking.
/// `descriptors()` preserves registration order.
#[derive(Default)]
pub struct Registry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    resources: Vec<Resource>,
    resource_index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// Panics on a duplicate name: duplicate registration is a startup
    /// programming error, not a runtime condition.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            panic!("duplicate tool registration: '{name}'");
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
    }

    /// Register an async closure as a tool.
    pub fn register_fn<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CallToolResult, ToolError>> + Send + 'static,
    {
        self.register(Arc::new(FnTool::new(name, description, schema, handler)));
    }

    /// Register a read-only resource with a lazy contents provider.
    ///
    /// Panics on a duplicate uri, same as duplicate tools.
    pub fn register_resource(
        &mut self,
        info: ResourceInfo,
        provider: impl Fn() -> Result<String, ToolError> + Send + Sync + 'static,
    ) {
        if self.resource_index.contains_key(&info.uri) {
            panic!("duplicate resource registration: '{}'", info.uri);
        }
        self.resource_index
            .insert(info.uri.clone(), self.resources.len());
        self.resources.push(Resource {
            info,
            provider: Box::new(provider),
        });
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool descriptors in registration order.
    pub fn descriptors(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    /// Resource descriptors in registration order.
    pub fn resource_descriptors(&self) -> Vec<ResourceInfo> {
        self.resources.iter().map(|r| r.info.clone()).collect()
    }

    /// Produce the contents of a resource, or `None` if the uri is unknown.
    pub fn read_resource(&self, uri: &str) -> Option<Result<ResourceContents, ToolError>> {
        let resource = self
            .resource_index
            .get(uri)
            .map(|&i| &self.resources[i])?;
        Some((resource.provider)().map(|text| ResourceContents {
            uri: resource.info.uri.clone(),
            mime_type: resource.info.mime_type.clone(),
            text,
        }))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
