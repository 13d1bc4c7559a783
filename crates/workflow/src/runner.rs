//! Top-level driver for one agent tree.

use std::sync::Arc;
use tandem_core::agent::{Agent, InvocationContext, run_observed};
use tandem_core::error::{Result, WorkflowError};
use tandem_core::event::EventBus;
use tandem_core::state::SharedState;
use tandem_core::template::MissingKeyPolicy;
use tandem_core::CancellationToken;
use tracing::{debug, info, warn};

use crate::validate::ensure_unique_names;

/// What a finished run hands back.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub invocation_id: String,
    /// Final shared state
    pub state: SharedState,
    /// The root agent's result
    pub response: Option<String>,
}

/// Runs a root agent against a seeded state.
///
/// All runs share one event bus and one cancellation token; `cancel()`
/// aborts every run in flight. Each run gets its own child token, so a
/// finished run never leaves the runner cancelled.
pub struct Runner {
    root: Arc<dyn Agent>,
    events: Arc<EventBus>,
    cancel: CancellationToken,
    missing_key_policy: MissingKeyPolicy,
}

impl Runner {
    /// Wrap `root`, rejecting trees with duplicate agent names.
    pub fn new(root: Arc<dyn Agent>) -> std::result::Result<Self, WorkflowError> {
        ensure_unique_names(root.name(), root.sub_agents())?;
        Ok(Self {
            root,
            events: Arc::new(EventBus::default()),
            cancel: CancellationToken::new(),
            missing_key_policy: MissingKeyPolicy::default(),
        })
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key_policy = policy;
        self
    }

    pub fn root(&self) -> &Arc<dyn Agent> {
        &self.root
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Abort every run in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the root agent once.
    ///
    /// Any failure in the tree fails the run; there is no partial result.
    pub async fn run(&self, input: impl Into<String>, seed: SharedState) -> Result<RunOutput> {
        let mut ctx = InvocationContext::new(input)
            .with_state(seed)
            .with_events(self.events.clone())
            .with_cancellation(self.cancel.child_token())
            .with_missing_key_policy(self.missing_key_policy);

        let invocation_id = ctx.invocation_id().to_string();
        info!(
            invocation = %invocation_id,
            root = %self.root.name(),
            seeded_keys = ctx.state().len(),
            "Run started"
        );

        let outcome = match run_observed(self.root.as_ref(), &mut ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(invocation = %invocation_id, error = %e, "Run failed");
                return Err(e);
            }
        };

        if outcome.requests_exit() {
            debug!(
                invocation = %invocation_id,
                agent = %outcome.agent,
                "Exit requested outside any loop, ignoring"
            );
        }

        let state = ctx.into_state();
        info!(invocation = %invocation_id, keys = state.len(), "Run finished");

        Ok(RunOutput {
            invocation_id,
            state,
            response: outcome.output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SequentialAgent;
    use crate::test_helpers::*;
    use std::time::Duration;
    use tandem_core::{DomainEvent, Error};

    fn pipeline() -> Arc<dyn Agent> {
        Arc::new(
            SequentialAgent::new(
                "Pipeline",
                vec![
                    Arc::new(TemplateAgent::new("Writer", Some("draft"), "A")),
                    Arc::new(TemplateAgent::new("Reviewer", Some("verdict"), "{draft}-reviewed")),
                ],
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn returns_final_state_and_response() {
        let runner = Runner::new(pipeline()).unwrap();
        let output = runner.run("go", SharedState::new()).await.unwrap();

        assert_eq!(output.response.as_deref(), Some("A-reviewed"));
        assert_eq!(output.state.get_str("draft"), Some("A"));
        assert_eq!(output.state.get_str("verdict"), Some("A-reviewed"));
        assert!(!output.invocation_id.is_empty());
    }

    #[tokio::test]
    async fn exit_outside_a_loop_is_ignored() {
        let runner = Runner::new(Arc::new(ScriptedAgent::new(
            "Approver",
            "approval",
            &[("ok", true)],
        )))
        .unwrap();
        let output = runner.run("go", SharedState::new()).await.unwrap();
        assert_eq!(output.response.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn strict_policy_surfaces_missing_keys() {
        let runner = Runner::new(Arc::new(TemplateAgent::new("Writer", Some("draft"), "{topic}")))
            .unwrap()
            .with_missing_key_policy(MissingKeyPolicy::Error);
        let err = runner.run("go", SharedState::new()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Workflow(WorkflowError::MissingStateKey { ref key, .. }) if key == "topic"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_aborts_the_tree() {
        let runner = Arc::new(
            Runner::new(Arc::new(
                TemplateAgent::new("Slow", Some("slow"), "x").with_delay(Duration::from_secs(30)),
            ))
            .unwrap(),
        );

        let handle = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run("go", SharedState::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        runner.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn failures_surface_and_are_published() {
        let events = Arc::new(EventBus::new(16));
        let mut rx = events.subscribe();
        let runner = Runner::new(Arc::new(FailingAgent::new("Broken")))
            .unwrap()
            .with_event_bus(events);

        assert!(runner.run("go", SharedState::new()).await.is_err());

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::ErrorOccurred { agent, .. } = event.as_ref() {
                saw_error = agent == "Broken";
            }
        }
        assert!(saw_error);
    }

    #[test]
    fn duplicate_names_never_reach_a_runner() {
        let root: Arc<dyn Agent> = Arc::new(TemplateAgent::new("Writer", None, ""));
        let nested = SequentialAgent::new("Outer", vec![root.clone()]).unwrap();
        assert!(Runner::new(Arc::new(nested)).is_ok());

        let clash = SequentialAgent::new(
            "Writer",
            vec![Arc::new(TemplateAgent::new("Reviewer", None, ""))],
        )
        .unwrap();
        let outer = SequentialAgent::new("Outer", vec![Arc::new(clash), root])
            .err()
            .unwrap();
        assert!(matches!(outer, WorkflowError::DuplicateAgentName(ref n) if n == "Writer"));
    }
}
