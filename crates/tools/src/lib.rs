//! Built-in tools for Tandem agents.
//!
//! - [`ExitLoopTool`] asks the nearest enclosing loop to stop
//! - [`AgentTool`] lets one agent delegate to another
//! - [`FunctionTool`] wraps a closure

pub mod agent_tool;
pub mod exit_loop;
pub mod function;

use std::sync::Arc;
use tandem_core::tool::ToolRegistry;

pub use agent_tool::AgentTool;
pub use exit_loop::{EXIT_LOOP_TOOL, ExitLoopTool};
pub use function::FunctionTool;

/// A registry holding every built-in tool that needs no configuration.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ExitLoopTool::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_include_exit_loop() {
        let registry = builtin_registry();
        assert_eq!(registry.names(), vec![EXIT_LOOP_TOOL]);
    }
}
