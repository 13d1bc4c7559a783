//! Domain event system: observe a workflow run without coupling to it.
//!
//! Agents publish events as they start, finish, call tools and write state.
//! The CLI (or a test) can subscribe to follow a run as it happens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Why a loop agent stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopTermination {
    /// The configured iteration budget was used up.
    MaxIterationsReached,
    /// A child requested exit during the last pass.
    ExitSignaled,
}

impl std::fmt::Display for LoopTermination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopTermination::MaxIterationsReached => write!(f, "max_iterations_reached"),
            LoopTermination::ExitSignaled => write!(f, "exit_signaled"),
        }
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// An agent began running
    AgentStarted {
        invocation_id: String,
        agent: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent finished successfully
    AgentCompleted {
        invocation_id: String,
        agent: String,
        exit_requested: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        agent: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An agent wrote its output into shared state
    StateUpdated {
        agent: String,
        key: String,
        timestamp: DateTime<Utc>,
    },

    /// A loop finished one full pass over its children
    LoopIterationCompleted {
        agent: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// A loop stopped
    LoopTerminated {
        agent: String,
        iterations: u32,
        reason: LoopTermination,
        timestamp: DateTime<Utc>,
    },

    /// A model call failed with a retryable status and will be retried
    ModelCallRetried {
        provider: String,
        attempt: u32,
        status_code: Option<u16>,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        agent: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
