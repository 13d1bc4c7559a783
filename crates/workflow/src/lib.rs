//! Workflow engine: composable agents over shared state.
//!
//! Three composites wrap any set of [`Agent`](tandem_core::Agent)s and are
//! agents themselves, so workflows nest freely:
//!
//! - [`SequentialAgent`] runs children in order on one state.
//! - [`ParallelAgent`] runs children concurrently on isolated copies and
//!   merges their writes in declaration order.
//! - [`LoopAgent`] repeats its children until a child requests exit or the
//!   iteration bound is reached.
//!
//! [`Runner`] drives a root agent for one invocation, and
//! [`validate_state_flow`] checks a tree's placeholders before it runs.

pub mod loop_agent;
pub mod parallel;
pub mod runner;
pub mod sequential;
pub mod validate;

#[cfg(test)]
mod test_helpers;

pub use loop_agent::{LoopAgent, LoopReport};
pub use parallel::ParallelAgent;
pub use runner::{RunOutput, Runner};
pub use sequential::SequentialAgent;
pub use validate::{StateFlowIssue, ensure_unique_names, validate_state_flow};
