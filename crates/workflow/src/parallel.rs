//! Parallel composite: children run concurrently on isolated state copies.
//!
//! Each child gets a fork of the incoming state, so no sibling sees another's
//! in-flight writes. After every child has finished, each child's writes are
//! applied to the outgoing state in declaration order; on a key collision the
//! later-declared child wins regardless of which finished last.
//!
//! The first failure (by completion time) cancels the remaining children and
//! is returned as-is. Nothing is merged in that case.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tandem_core::agent::{
    Agent, AgentKind, AgentOutcome, ControlSignal, InvocationContext, run_observed,
};
use tandem_core::error::{Error, Result, WorkflowError};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::sequential::check_composite;

/// What a finished branch hands back for the merge.
struct Branch {
    outcome: AgentOutcome,
    writes: BTreeMap<String, Value>,
}

pub struct ParallelAgent {
    name: String,
    description: String,
    sub_agents: Vec<Arc<dyn Agent>>,
}

impl ParallelAgent {
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

#[async_trait]
impl Agent for ParallelAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Parallel
    }

    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &self.sub_agents
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
        let siblings = ctx.cancellation().child_token();
        let mut set: JoinSet<(usize, Result<Branch>)> = JoinSet::new();

        for (index, child) in self.sub_agents.iter().enumerate() {
            let agent = child.clone();
            let mut branch_ctx = ctx.fork(siblings.child_token());
            set.spawn(async move {
                let result = run_observed(agent.as_ref(), &mut branch_ctx)
                    .await
                    .map(|outcome| Branch {
                        outcome,
                        writes: branch_ctx.state().delta(),
                    });
                (index, result)
            });
        }

        debug!(agent = %self.name, branches = self.sub_agents.len(), "Parallel branches started");

        let mut finished: Vec<Option<Branch>> = self.sub_agents.iter().map(|_| None).collect();

        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok((index, Ok(branch))) => {
                    finished[index] = Some(branch);
                    continue;
                }
                Ok((index, Err(e))) => {
                    warn!(
                        agent = %self.name,
                        branch = %self.sub_agents[index].name(),
                        error = %e,
                        "Parallel branch failed, cancelling siblings"
                    );
                    e
                }
                Err(join_error) => {
                    warn!(agent = %self.name, error = %join_error, "Parallel branch panicked");
                    Error::Internal(format!(
                        "parallel branch of '{}' panicked: {join_error}",
                        self.name
                    ))
                }
            };
            siblings.cancel();
            set.shutdown().await;
            return Err(failure);
        }

        let mut outputs = Vec::new();
        let mut exit_requested = false;
        let mut merged_keys = 0;

        for branch in finished.into_iter().flatten() {
            exit_requested |= branch.outcome.requests_exit();
            merged_keys += branch.writes.len();
            ctx.state_mut().apply(branch.writes);
            if let Some(text) = branch.outcome.output.filter(|t| !t.is_empty()) {
                outputs.push(text);
            }
        }

        info!(
            agent = %self.name,
            branches = self.sub_agents.len(),
            keys = merged_keys,
            "Parallel branches merged"
        );

        let output = if outputs.is_empty() {
            None
        } else {
            Some(outputs.join("\n\n"))
        };
        let signal = if exit_requested {
            ControlSignal::RequestExit
        } else {
            ControlSignal::Continue
        };
        Ok(AgentOutcome::new(&self.name, output).with_signal(signal))
    }
}
