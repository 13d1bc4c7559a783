//! Agents exposed as tools.
//!
//! A coordinator agent can delegate to another agent by calling it like any
//! other tool. The wrapped agent runs on a fork of the caller's invocation
//! whose user input is the tool's `request` argument; its state writes are
//! merged back into the caller's state once it finishes.

use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::agent::{Agent, run_observed};
use tandem_core::error::ToolError;
use tandem_core::tool::{Tool, ToolContext, ToolResult};
use tracing::{debug, warn};

pub struct AgentTool {
    agent: Arc<dyn Agent>,
    description: String,
}

impl AgentTool {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        let description = if agent.description().is_empty() {
            format!("Delegate a request to the {} agent", agent.name())
        } else {
            agent.description().to_string()
        };
        Self { agent, description }
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        self.agent.name()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "What the agent should do"
                }
            },
            "required": ["request"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &mut ToolContext<'_>,
    ) -> Result<ToolResult, ToolError> {
        let request = arguments["request"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'request' argument".into()))?;

        let caller = ctx.agent_name().to_string();
        let invocation = ctx.invocation();
        let mut child = invocation.fork_with_input(request);

        debug!(caller = %caller, agent = %self.agent.name(), "Delegating to agent");

        let outcome = run_observed(self.agent.as_ref(), &mut child)
            .await
            .map_err(|e| {
                warn!(
                    caller = %caller,
                    agent = %self.agent.name(),
                    error = %e,
                    "Delegated agent failed"
                );
                ToolError::ExecutionFailed {
                    tool_name: self.agent.name().to_string(),
                    reason: e.to_string(),
                }
            })?;

        invocation.state_mut().apply(child.state().delta());

        if outcome.requests_exit() {
            debug!(agent = %self.agent.name(), "Exit request stays inside the delegated agent");
        }

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: outcome.output.unwrap_or_default(),
            data: None,
        })
    }
}
