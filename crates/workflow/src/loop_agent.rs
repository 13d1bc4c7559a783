//! Loop composite: bounded refinement with early exit.
//!
//! Each iteration is one ordered pass over the children against the shared
//! state. After a pass the loop stops if any child requested exit during that
//! pass, or if it has run `max_iterations` passes. The loop consumes the exit
//! request; its parent sees a plain `Continue`.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tandem_core::agent::{Agent, AgentKind, AgentOutcome, InvocationContext};
use tandem_core::error::{Result, WorkflowError};
use tandem_core::event::{DomainEvent, LoopTermination};
use tracing::{debug, info};

use crate::sequential::{check_composite, run_in_order};

/// How a loop run ended.
#[derive(Debug, Clone)]
pub struct LoopReport {
    /// Passes completed
    pub iterations: u32,

    pub reason: LoopTermination,

    /// Outcome of the last child in the final pass
    pub last: Option<AgentOutcome>,
}

pub struct LoopAgent {
    name: String,
    description: String,
    sub_agents: Vec<Arc<dyn Agent>>,
    max_iterations: u32,
}

impl LoopAgent {
    pub fn new(
        name: impl Into<String>,
        sub_agents: Vec<Arc<dyn Agent>>,
        max_iterations: u32,
    ) -> std::result::Result<Self, WorkflowError> {
        let name = name.into();
        if max_iterations == 0 {
            return Err(WorkflowError::InvalidMaxIterations(name));
        }
        check_composite(&name, &sub_agents)?;
        Ok(Self {
            name,
            description: String::new(),
            sub_agents,
            max_iterations,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Run the loop and report why it stopped.
    pub async fn run_loop(&self, ctx: &mut InvocationContext) -> Result<LoopReport> {
        let mut last = None;

        for iteration in 1..=self.max_iterations {
            debug!(agent = %self.name, iteration, "Loop pass starting");

            let (outcome, exit_requested) = run_in_order(&self.name, &self.sub_agents, ctx).await?;
            last = outcome;

            ctx.events().publish(DomainEvent::LoopIterationCompleted {
                agent: self.name.clone(),
                iteration,
                timestamp: Utc::now(),
            });

            if exit_requested {
                return Ok(self.terminate(ctx, iteration, LoopTermination::ExitSignaled, last));
            }
        }

        Ok(self.terminate(
            ctx,
            self.max_iterations,
            LoopTermination::MaxIterationsReached,
            last,
        ))
    }

    fn terminate(
        &self,
        ctx: &InvocationContext,
        iterations: u32,
        reason: LoopTermination,
        last: Option<AgentOutcome>,
    ) -> LoopReport {
        info!(agent = %self.name, iterations, reason = %reason, "Loop terminated");
        ctx.events().publish(DomainEvent::LoopTerminated {
            agent: self.name.clone(),
            iterations,
            reason,
            timestamp: Utc::now(),
        });
        LoopReport {
            iterations,
            reason,
            last,
        }
    }
}

#[async_trait]
impl Agent for LoopAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Loop {
            max_iterations: self.max_iterations,
        }
    }

    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.sub_agents
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
        let report = self.run_loop(ctx).await?;
        Ok(AgentOutcome::new(
            &self.name,
            report.last.and_then(|o| o.output),
        ))
    }
}
