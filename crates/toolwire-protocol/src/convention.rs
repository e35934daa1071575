//! Tool-invocation call conventions.
//!
//! Two wire shapes exist for invoking a tool and both are in active use:
//! `tools/call` carrying `{name, arguments}` params (the common shape, with
//! `call_tool` + `tool_name` as a legacy alias), and method-per-tool, where
//! the method itself names the tool and `params` is the argument object.
//! A dispatcher is configured with one convention.

use crate::methods;

/// How a request maps to a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallConvention {
    /// `tools/call` with `params = {name, arguments}`. The legacy
    /// `call_tool` method with `params.tool_name` is accepted as an alias.
    #[default]
    ToolsCall,
    /// The method is the tool name and `params` is the argument object.
    MethodPerTool,
}

impl CallConvention {
    /// Whether `method` is an invocation method under this convention.
    /// Reserved methods never are.
    pub fn is_call_method(self, method: &str) -> bool {
        match self {
            Self::ToolsCall => {
                method == methods::TOOLS_CALL || method == methods::CALL_TOOL_LEGACY
            }
            Self::MethodPerTool => !is_reserved(method),
        }
    }
}

/// Whether a method name is reserved by the protocol.
pub fn is_reserved(method: &str) -> bool {
    matches!(
        method,
        methods::INITIALIZE
            | methods::INITIALIZED
            | methods::TOOLS_LIST
            | methods::TOOLS_CALL
            | methods::RESOURCES_LIST
            | methods::RESOURCES_READ
    )
}
