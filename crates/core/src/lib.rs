//! # Tandem Core
//!
//! Domain types, traits, and error definitions for the Tandem agent
//! workflow engine. This crate has **no framework dependencies**; it defines
//! the domain model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here:
//! - [`Agent`]: the Runnable capability shared by leaf agents and the
//!   sequential, parallel and loop composites
//! - [`Provider`]: the opaque model call
//! - [`Tool`]: callables an agent may invoke mid-execution
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted providers and hand-written agents.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod state;
pub mod template;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, AgentKind, AgentOutcome, ControlSignal, InvocationContext, run_observed};
pub use error::{Error, ProviderError, Result, ToolError, WorkflowError};
pub use event::{DomainEvent, EventBus, LoopTermination};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, TokenUsage, ToolDefinition};
pub use state::SharedState;
pub use template::{MissingKeyPolicy, Placeholder};
pub use tool::{Tool, ToolCall, ToolContext, ToolRegistry, ToolResult};
pub use tokio_util::sync::CancellationToken;
