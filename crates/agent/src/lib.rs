//! Model-backed leaf agents.
//!
//! An [`LlmAgent`] follows a short cycle:
//!
//! 1. **Render** its instruction against the shared state
//! 2. **Call** the configured provider, retrying transient failures
//! 3. **If tool calls**: execute them, append results, call again
//! 4. **If text**: that text is the result, written under `output_key`
//!
//! A tool that requests exit ends the cycle early; the agent then reports
//! `ControlSignal::RequestExit` to its parent.

pub mod llm_agent;

#[cfg(test)]
mod test_helpers;

pub use llm_agent::{LlmAgent, LlmAgentBuilder};
