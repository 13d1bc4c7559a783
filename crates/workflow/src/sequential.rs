//! Sequential composite: children run one after another on the same state.

use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::agent::{
    Agent, AgentKind, AgentOutcome, ControlSignal, InvocationContext, run_observed,
};
use tandem_core::error::{Result, WorkflowError};
use tracing::debug;

use crate::validate::ensure_unique_names;

/// Runs its children in list order, passing the same state through the chain.
///
/// The result is the last child's result. The first child failure aborts the
/// remaining children. An exit request from any child is passed up to the
/// enclosing loop once every child has run.
pub struct SequentialAgent {
    name: String,
    description: String,
    sub_agents: Vec<Arc<dyn Agent>>,
}

impl SequentialAgent {
    pub fn new(
        name: impl Into<String>,
        sub_agents: Vec<Arc<dyn Agent>>,
    ) -> std::result::Result<Self, WorkflowError> {
        let name = name.into();
        check_composite(&name, &sub_agents)?;
        Ok(Self {
            name,
            description: String::new(),
            sub_agents,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Shared construction checks for every composite.
pub(crate) fn check_composite(
    name: &str,
    sub_agents: &[Arc<dyn Agent>],
) -> std::result::Result<(), WorkflowError> {
    if name.trim().is_empty() {
        return Err(WorkflowError::InvalidDefinition {
            agent: name.to_string(),
            reason: "agent name must not be empty".into(),
        });
    }
    if sub_agents.is_empty() {
        return Err(WorkflowError::EmptyComposite(name.to_string()));
    }
    ensure_unique_names(name, sub_agents)
}

/// One ordered pass over `children`.
///
/// Returns the last child's outcome and whether any child requested exit.
pub(crate) async fn run_in_order(
    parent: &str,
    children: &[Arc<dyn Agent>],
    ctx: &mut InvocationContext,
) -> Result<(Option<AgentOutcome>, bool)> {
    let mut last = None;
    let mut exit_requested = false;

    for child in children {
        let outcome = run_observed(child.as_ref(), ctx).await?;
        if outcome.requests_exit() {
            debug!(parent = %parent, agent = %child.name(), "Child requested exit");
            exit_requested = true;
        }
        last = Some(outcome);
    }

    Ok((last, exit_requested))
}

#[async_trait]
impl Agent for SequentialAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Sequential
    }

    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.sub_agents
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
        let (last, exit_requested) = run_in_order(&self.name, &self.sub_agents, ctx).await?;
        let signal = if exit_requested {
            ControlSignal::RequestExit
        } else {
            ControlSignal::Continue
        };
        Ok(AgentOutcome::new(&self.name, last.and_then(|o| o.output)).with_signal(signal))
    }
}
