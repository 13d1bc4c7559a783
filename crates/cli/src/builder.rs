//! Turns a workflow definition file into a runnable agent tree.

use std::collections::HashMap;
use std::sync::Arc;
use tandem_agent::LlmAgentBuilder;
use tandem_config::workflow::AGENT_TOOL_PREFIX;
use tandem_config::{AgentDefinition, AgentKindConfig, AppConfig, WorkflowConfig};
use tandem_core::agent::Agent;
use tandem_core::error::WorkflowError;
use tandem_core::provider::Provider;
use tandem_core::tool::{Tool, ToolRegistry};
use tandem_tools::{AgentTool, builtin_registry};
use tandem_workflow::{LoopAgent, ParallelAgent, SequentialAgent};
use tracing::debug;

/// Builds agents from one workflow file, reusing each built agent.
pub struct WorkflowBuilder<'a> {
    workflow: &'a WorkflowConfig,
    config: &'a AppConfig,
    provider: Arc<dyn Provider>,
    builtins: ToolRegistry,
    built: HashMap<String, Arc<dyn Agent>>,
}

impl<'a> WorkflowBuilder<'a> {
    pub fn new(
        workflow: &'a WorkflowConfig,
        config: &'a AppConfig,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            workflow,
            config,
            provider,
            builtins: builtin_registry(),
            built: HashMap::new(),
        }
    }

    /// Register an extra tool that agents can name in their `tools` list.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.builtins.register(tool);
        self
    }

    /// Build the workflow's root agent.
    pub fn build(mut self) -> Result<Arc<dyn Agent>, WorkflowError> {
        self.workflow.validate()?;
        let root = self.workflow.root.clone();
        self.agent(&root)
    }

    fn agent(&mut self, name: &str) -> Result<Arc<dyn Agent>, WorkflowError> {
        if let Some(agent) = self.built.get(name) {
            return Ok(agent.clone());
        }

        let workflow = self.workflow;
        let def = workflow
            .get(name)
            .ok_or_else(|| WorkflowError::UnknownAgent(name.to_string()))?;

        let agent: Arc<dyn Agent> = match def.kind {
            AgentKindConfig::Llm => Arc::new(self.llm_agent(def)?),
            AgentKindConfig::Sequential => {
                let children = self.children(def)?;
                Arc::new(
                    SequentialAgent::new(&def.name, children)?.with_description(&def.description),
                )
            }
            AgentKindConfig::Parallel => {
                let children = self.children(def)?;
                Arc::new(
                    ParallelAgent::new(&def.name, children)?.with_description(&def.description),
                )
            }
            AgentKindConfig::Loop => {
                let children = self.children(def)?;
                let max_iterations = def.max_iterations.unwrap_or(0);
                Arc::new(
                    LoopAgent::new(&def.name, children, max_iterations)?
                        .with_description(&def.description),
                )
            }
        };

        debug!(agent = %name, kind = ?def.kind, "Built agent");
        self.built.insert(name.to_string(), agent.clone());
        Ok(agent)
    }

    fn children(&mut self, def: &AgentDefinition) -> Result<Vec<Arc<dyn Agent>>, WorkflowError> {
        def.sub_agents.iter().map(|child| self.agent(child)).collect()
    }

    fn llm_agent(
        &mut self,
        def: &AgentDefinition,
    ) -> Result<tandem_agent::LlmAgent, WorkflowError> {
        let mut builder = LlmAgentBuilder::from_config(&def.name, self.config)
            .description(&def.description)
            .instruction(self.workflow.instruction_for(def))
            .provider(self.provider.clone());

        if let Some(model) = &def.model {
            builder = builder.model(model);
        }
        if let Some(temperature) = def.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(key) = &def.output_key {
            builder = builder.output_key(key);
        }

        for tool in &def.tools {
            let resolved: Arc<dyn Tool> = match tool.strip_prefix(AGENT_TOOL_PREFIX) {
                Some(target) => Arc::new(AgentTool::new(self.agent(target)?)),
                None => self.builtins.get(tool).ok_or_else(|| WorkflowError::UnknownTool {
                    agent: def.name.clone(),
                    tool: tool.clone(),
                })?,
            };
            builder = builder.tool(resolved);
        }

        builder.build()
    }
}

/// Build the root agent of `workflow` with every model call going to
/// `provider`.
pub fn build_workflow(
    workflow: &WorkflowConfig,
    config: &AppConfig,
    provider: Arc<dyn Provider>,
) -> Result<Arc<dyn Agent>, WorkflowError> {
    WorkflowBuilder::new(workflow, config, provider).build()
}
