//! Workflow definition files.
//!
//! A workflow file describes an agent graph in TOML: a flat list of agents,
//! composites referring to their children by name, and the name of the root.
//!
//! ```toml
//! root = "StoryPipeline"
//!
//! [[agents]]
//! name = "StoryPipeline"
//! kind = "sequential"
//! sub_agents = ["InitialWriterAgent", "StoryRefinementLoop"]
//!
//! [[agents]]
//! name = "StoryRefinementLoop"
//! kind = "loop"
//! max_iterations = 2
//! sub_agents = ["CriticAgent", "RefinerAgent"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tandem_core::WorkflowError;

use crate::ConfigError;
use crate::instruction::load_instruction;

/// Prefix that turns an agent reference into a tool (`agent:<name>`).
pub const AGENT_TOOL_PREFIX: &str = "agent:";

const DEFAULT_INSTRUCTION: &str = "Default instruction";

/// The shape of an agent in a workflow file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKindConfig {
    #[default]
    Llm,
    Sequential,
    Parallel,
    Loop,
}

/// One `[[agents]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,

    #[serde(default)]
    pub kind: AgentKindConfig,

    #[serde(default)]
    pub description: String,

    /// Model id; falls back to the app's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Inline instruction template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,

    /// Instruction template file, relative to the workflow file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_file: Option<PathBuf>,

    /// Used when `instruction_file` can't be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_default: Option<String>,

    /// Built-in tool names, or `agent:<name>` to call another agent as a tool
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_agents: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl AgentDefinition {
    /// Agents this one calls through `agent:<name>` tools.
    pub fn agent_tools(&self) -> impl Iterator<Item = &str> {
        self.tools
            .iter()
            .filter_map(|t| t.strip_prefix(AGENT_TOOL_PREFIX))
    }
}

/// A whole workflow file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Name of the agent the runner invokes
    pub root: String,

    #[serde(default)]
    pub description: String,

    /// Keys the caller promises to seed before the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seed_keys: Vec<String>,

    #[serde(default)]
    pub agents: Vec<AgentDefinition>,

    /// Directory relative instruction files resolve against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl WorkflowConfig {
    /// Load and validate a workflow file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut workflow: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        workflow.base_dir = path.parent().map(Path::to_path_buf);

        workflow.validate()?;
        Ok(workflow)
    }

    /// Parse and validate a workflow from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let workflow: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Look up an agent definition by name.
    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// The instruction text for `agent`: inline, from file, or empty.
    pub fn instruction_for(&self, agent: &AgentDefinition) -> String {
        if let Some(inline) = &agent.instruction {
            return inline.clone();
        }
        match &agent.instruction_file {
            Some(file) => {
                let path = match &self.base_dir {
                    Some(base) if file.is_relative() => base.join(file),
                    _ => file.clone(),
                };
                let default = agent
                    .instruction_default
                    .as_deref()
                    .unwrap_or(DEFAULT_INSTRUCTION);
                load_instruction(&path, default)
            }
            None => String::new(),
        }
    }

    /// Check the graph is well-formed.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let mut by_name: HashMap<&str, &AgentDefinition> = HashMap::new();
        for agent in &self.agents {
            if by_name.insert(agent.name.as_str(), agent).is_some() {
                return Err(WorkflowError::DuplicateAgentName(agent.name.clone()));
            }
        }

        if !by_name.contains_key(self.root.as_str()) {
            return Err(WorkflowError::UnknownAgent(self.root.clone()));
        }

        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for agent in &self.agents {
            validate_shape(agent)?;

            for child in &agent.sub_agents {
                if !by_name.contains_key(child.as_str()) {
                    return Err(WorkflowError::UnknownAgent(child.clone()));
                }
                if let Some(previous) = parent_of.insert(child.as_str(), agent.name.as_str()) {
                    return Err(WorkflowError::InvalidDefinition {
                        agent: child.clone(),
                        reason: format!(
                            "listed as a sub-agent of both '{previous}' and '{}'",
                            agent.name
                        ),
                    });
                }
            }

            for target in agent.agent_tools() {
                if !by_name.contains_key(target) {
                    return Err(WorkflowError::UnknownAgent(target.to_string()));
                }
            }
        }

        if parent_of.contains_key(self.root.as_str()) {
            return Err(WorkflowError::InvalidDefinition {
                agent: self.root.clone(),
                reason: "the root agent cannot be a sub-agent".into(),
            });
        }

        detect_cycles(&by_name)
    }
}

fn validate_shape(agent: &AgentDefinition) -> Result<(), WorkflowError> {
    let invalid = |reason: &str| WorkflowError::InvalidDefinition {
        agent: agent.name.clone(),
        reason: reason.to_string(),
    };

    match agent.kind {
        AgentKindConfig::Llm => {
            if !agent.sub_agents.is_empty() {
                return Err(invalid("llm agents cannot have sub_agents"));
            }
            if agent.instruction.is_some() && agent.instruction_file.is_some() {
                return Err(invalid("set either instruction or instruction_file, not both"));
            }
        }
        kind => {
            if agent.sub_agents.is_empty() {
                return Err(WorkflowError::EmptyComposite(agent.name.clone()));
            }
            if !agent.tools.is_empty() || agent.output_key.is_some() {
                return Err(invalid("composite agents take no tools or output_key"));
            }
            match (kind, agent.max_iterations) {
                (AgentKindConfig::Loop, None | Some(0)) => {
                    return Err(WorkflowError::InvalidMaxIterations(agent.name.clone()));
                }
                (AgentKindConfig::Loop, Some(_)) | (_, None) => {}
                (_, Some(_)) => return Err(invalid("only loop agents take max_iterations")),
            }
        }
    }

    Ok(())
}

/// Depth-first search over sub-agent and agent-tool edges.
fn detect_cycles(by_name: &HashMap<&str, &AgentDefinition>) -> Result<(), WorkflowError> {
    fn visit<'a>(
        name: &'a str,
        by_name: &HashMap<&'a str, &'a AgentDefinition>,
        in_progress: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), WorkflowError> {
        if done.contains(name) {
            return Ok(());
        }
        if !in_progress.insert(name) {
            return Err(WorkflowError::Cycle(name.to_string()));
        }
        if let Some(&agent) = by_name.get(name) {
            let edges = agent
                .sub_agents
                .iter()
                .map(String::as_str)
                .chain(agent.agent_tools());
            for next in edges {
                visit(next, by_name, in_progress, done)?;
            }
        }
        in_progress.remove(name);
        done.insert(name);
        Ok(())
    }

    let mut names: Vec<&str> = by_name.keys().copied().collect();
    names.sort_unstable();

    let mut in_progress = HashSet::new();
    let mut done = HashSet::new();
    for name in names {
        visit(name, by_name, &mut in_progress, &mut done)?;
    }
    Ok(())
}
