//! The Agent trait: the one capability leaf agents and composites share.
//!
//! Every runnable unit (an LLM-backed leaf, a sequential pipeline, a
//! parallel fan-out, a refinement loop) implements [`Agent`]. Composites hold
//! their children as `Arc<dyn Agent>`, so workflows nest arbitrarily.
//!
//! An agent run takes an [`InvocationContext`] (shared state, cancellation,
//! event bus) and returns an [`AgentOutcome`]. A request to leave the
//! enclosing loop travels back up as [`ControlSignal::RequestExit`] instead of
//! a hidden flag.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::{DomainEvent, EventBus};
use crate::state::SharedState;
use crate::template::{self, MissingKeyPolicy, Placeholder};

/// Control-flow signal carried out of an agent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlSignal {
    #[default]
    Continue,
    /// Stop the nearest enclosing loop after the current pass.
    RequestExit,
}

/// What an agent run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    /// Name of the agent whose result this is.
    pub agent: String,
    /// The agent's textual result, if it produced one.
    pub output: Option<String>,
    pub signal: ControlSignal,
}

impl AgentOutcome {
    pub fn new(agent: impl Into<String>, output: Option<String>) -> Self {
        Self {
            agent: agent.into(),
            output,
            signal: ControlSignal::Continue,
        }
    }

    /// An outcome that asks the enclosing loop to stop.
    pub fn exit(agent: impl Into<String>, output: Option<String>) -> Self {
        Self {
            signal: ControlSignal::RequestExit,
            ..Self::new(agent, output)
        }
    }

    pub fn with_signal(mut self, signal: ControlSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn requests_exit(&self) -> bool {
        self.signal == ControlSignal::RequestExit
    }
}

/// Structural kind of an agent, used by build-time checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Leaf,
    Sequential,
    Parallel,
    Loop { max_iterations: u32 },
}

/// Per-invocation context handed down the agent tree.
pub struct InvocationContext {
    invocation_id: String,
    user_input: String,
    state: SharedState,
    cancel: CancellationToken,
    events: Arc<EventBus>,
    missing_key_policy: MissingKeyPolicy,
}

impl InvocationContext {
    /// Create a context for a new invocation with an empty state.
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            invocation_id: Uuid::new_v4().to_string(),
            user_input: user_input.into(),
            state: SharedState::new(),
            cancel: CancellationToken::new(),
            events: Arc::new(EventBus::default()),
            missing_key_policy: MissingKeyPolicy::default(),
        }
    }

    pub fn with_state(mut self, state: SharedState) -> Self {
        self.state = state;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
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

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    /// The input this invocation was started with.
    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SharedState {
        &mut self.state
    }

    pub fn into_state(self) -> SharedState {
        self.state
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn missing_key_policy(&self) -> MissingKeyPolicy {
        self.missing_key_policy
    }

    /// Fail with `Error::Cancelled` if the invocation was cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// A child context with an isolated copy of the state.
    ///
    /// The fork shares the invocation id, event bus and missing-key policy,
    /// and is cancelled by `cancel`.
    pub fn fork(&self, cancel: CancellationToken) -> Self {
        Self {
            invocation_id: self.invocation_id.clone(),
            user_input: self.user_input.clone(),
            state: self.state.fork(),
            cancel,
            events: self.events.clone(),
            missing_key_policy: self.missing_key_policy,
        }
    }

    /// Like [`fork`](Self::fork) but with a different user input.
    pub fn fork_with_input(&self, user_input: impl Into<String>) -> Self {
        let mut child = self.fork(self.cancel.child_token());
        child.user_input = user_input.into();
        child
    }

    /// Resolve an instruction template against the current state.
    pub fn render_instruction(&self, agent: &str, instruction: &str) -> Result<String> {
        Ok(template::render(
            agent,
            instruction,
            &self.state,
            self.missing_key_policy,
        )?)
    }

    /// Write an agent's output under `key` and announce it.
    pub fn write_output(&mut self, agent: &str, key: &str, value: impl Into<serde_json::Value>) {
        self.state.set(key, value);
        self.events.publish(DomainEvent::StateUpdated {
            agent: agent.to_string(),
            key: key.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn publish(&self, event: DomainEvent) {
        self.events.publish(event);
    }
}

/// The Runnable capability.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name within a workflow graph.
    fn name(&self) -> &str;

    /// Human-readable summary. Does not affect behavior.
    fn description(&self) -> &str {
        ""
    }

    fn kind(&self) -> AgentKind;

    /// Children, in execution order. Empty for leaves.
    fn sub_agents(&self) -> &[Arc<dyn Agent>] {
        &[]
    }

    /// State key this agent writes its result under, if any.
    fn output_key(&self) -> Option<&str> {
        None
    }

    /// State keys this agent's instruction reads.
    fn input_keys(&self) -> Vec<Placeholder> {
        Vec::new()
    }

    /// Run the agent against the shared state in `ctx`.
    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome>;
}

/// Run `agent` with start/completion/error events around it.
///
/// Composites call their children through this so every node in the tree
/// shows up in the event stream.
pub async fn run_observed(agent: &dyn Agent, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
    ctx.check_cancelled()?;
    ctx.publish(DomainEvent::AgentStarted {
        invocation_id: ctx.invocation_id().to_string(),
        agent: agent.name().to_string(),
        timestamp: Utc::now(),
    });

    match agent.run(ctx).await {
        Ok(outcome) => {
            ctx.publish(DomainEvent::AgentCompleted {
                invocation_id: ctx.invocation_id().to_string(),
                agent: agent.name().to_string(),
                exit_requested: outcome.requests_exit(),
                timestamp: Utc::now(),
            });
            Ok(outcome)
        }
        Err(e) => {
            ctx.publish(DomainEvent::ErrorOccurred {
                agent: agent.name().to_string(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
            Err(e)
        }
    }
}
