//! The loop exit tool.
//!
//! Calling it flags the tool context; the agent that ran it then returns
//! `ControlSignal::RequestExit` and the nearest enclosing loop stops after
//! finishing its current pass.

use async_trait::async_trait;
use tandem_core::error::ToolError;
use tandem_core::tool::{Tool, ToolContext, ToolResult};
use tracing::info;

pub const EXIT_LOOP_TOOL: &str = "exit_loop";

pub struct ExitLoopTool {
    message: String,
}

impl ExitLoopTool {
    pub fn new() -> Self {
        Self {
            message: "Approved. Exiting refinement loop.".into(),
        }
    }

    /// Use a custom acknowledgement in the tool result.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl Default for ExitLoopTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ExitLoopTool {
    fn name(&self) -> &str {
        EXIT_LOOP_TOOL
    }

    fn description(&self) -> &str {
        "Call this function ONLY when the critique indicates no further changes are needed, \
         signaling that the iterative process should end."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _arguments: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        info!(agent = %ctx.agent_name(), "Exit requested");
        ctx.request_exit();
        Ok(ToolResult::structured(serde_json::json!({
            "status": "approved",
            "message": self.message,
        })))
    }
}
