//! Tool trait: callables an agent may invoke mid-execution.
//!
//! A tool receives its JSON arguments plus a [`ToolContext`], which gives it
//! the calling agent's name, the shared state and the invocation. A tool can
//! also ask the enclosing loop to stop via [`ToolContext::request_exit`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::agent::InvocationContext;
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::state::SharedState;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    /// A successful result carrying structured data; `output` is its JSON text.
    pub fn structured(data: serde_json::Value) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: data.to_string(),
            data: Some(data),
        }
    }
}

/// What a tool sees of the agent that called it.
pub struct ToolContext<'a> {
    agent_name: &'a str,
    invocation: &'a mut InvocationContext,
    exit_requested: bool,
}

impl<'a> ToolContext<'a> {
    pub fn new(agent_name: &'a str, invocation: &'a mut InvocationContext) -> Self {
        Self {
            agent_name,
            invocation,
            exit_requested: false,
        }
    }

    /// Name of the agent executing the tool.
    pub fn agent_name(&self) -> &str {
        self.agent_name
    }

    pub fn state(&self) -> &SharedState {
        self.invocation.state()
    }

    pub fn state_mut(&mut self) -> &mut SharedState {
        self.invocation.state_mut()
    }

    pub fn invocation(&mut self) -> &mut InvocationContext {
        &mut *self.invocation
    }

    /// Ask the nearest enclosing loop to stop after its current pass.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "exit_loop").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    ///
    /// `Err` aborts the calling agent. A result with `success: false` is
    /// handed back to the model instead.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of named tools.
///
/// Workflow builders use it to resolve the tool names an agent declares.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call.
    pub async fn execute(
        &self,
        call: &ToolCall,
        ctx: &mut ToolContext<'_>,
    ) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone(), ctx).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}
