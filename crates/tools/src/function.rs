//! Tools built from plain closures.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tandem_core::error::ToolError;
use tandem_core::tool::{Tool, ToolContext, ToolResult};

type Handler = dyn Fn(Value, &mut ToolContext<'_>) -> Result<Value, ToolError> + Send + Sync;

/// A tool whose body is a synchronous closure.
///
/// The closure's JSON return value becomes the tool result: a string is
/// passed through as the output text, anything else is serialized.
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    schema: Value,
    handler: Arc<Handler>,
}

impl FunctionTool {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value, &mut ToolContext<'_>) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(handler),
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(
        &self,
        arguments: Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        match (self.handler)(arguments, ctx)? {
            Value::String(text) => Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: text,
                data: None,
            }),
            value => Ok(ToolResult::structured(value)),
        }
    }
}
