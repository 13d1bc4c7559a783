//! The model-backed leaf agent.
//!
//! An [`LlmAgent`] renders its instruction template against the shared
//! state, calls its provider, and runs any tool calls the model asks for
//! until the model answers in plain text. The answer is the agent's result
//! and is written under `output_key` when one is declared.
//!
//! Tool calls follow three rules:
//! - a tool returning `Err` fails the agent
//! - a result with `success: false` goes back to the model
//! - once a tool requests exit, the loop stops without another model call

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tandem_config::AppConfig;
use tandem_core::agent::{Agent, AgentKind, AgentOutcome, ControlSignal, InvocationContext};
use tandem_core::error::{Error, Result, ToolError, WorkflowError};
use tandem_core::event::DomainEvent;
use tandem_core::message::{Message, MessageToolCall};
use tandem_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tandem_core::template::{self, Placeholder};
use tandem_core::tool::{Tool, ToolCall, ToolContext, ToolRegistry};
use tandem_providers::{RetryPolicy, complete_with_retry};
use tracing::{debug, info, warn};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 10;

/// A leaf agent backed by a language model.
pub struct LlmAgent {
    name: String,
    description: String,
    model: String,
    instruction: String,
    tools: ToolRegistry,
    output_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    max_tool_iterations: u32,
    provider: Arc<dyn Provider>,
    retry: Option<RetryPolicy>,
}

/// What came back from running one tool call.
struct ToolOutcome {
    text: String,
    exit_requested: bool,
}

impl LlmAgent {
    pub fn builder(name: impl Into<String>) -> LlmAgentBuilder {
        LlmAgentBuilder::new(name)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    async fn call_model(
        &self,
        ctx: &InvocationContext,
        request: ProviderRequest,
    ) -> Result<ProviderResponse> {
        let call = async {
            match &self.retry {
                Some(policy) => {
                    complete_with_retry(
                        self.provider.as_ref(),
                        policy,
                        request,
                        Some(ctx.events().as_ref()),
                    )
                    .await
                }
                None => self.provider.complete(request).await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Err(Error::Cancelled),
            result = call => Ok(result?),
        }
    }

    async fn invoke_tool(
        &self,
        ctx: &mut InvocationContext,
        tc: &MessageToolCall,
    ) -> Result<ToolOutcome> {
        let arguments = match parse_arguments(&tc.arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(
                    agent = %self.name,
                    tool = %tc.name,
                    error = %e,
                    "Model sent malformed tool arguments"
                );
                return Ok(ToolOutcome {
                    text: format!("Error: invalid JSON arguments: {e}"),
                    exit_requested: false,
                });
            }
        };

        let call = ToolCall {
            id: tc.id.clone(),
            name: tc.name.clone(),
            arguments,
        };

        let start = Instant::now();
        let mut tool_ctx = ToolContext::new(&self.name, ctx);
        let result = self.tools.execute(&call, &mut tool_ctx).await;
        let exit_requested = tool_ctx.exit_requested();
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let success = matches!(&result, Ok(r) if r.success);
        ctx.events().publish(DomainEvent::ToolExecuted {
            agent: self.name.clone(),
            tool_name: tc.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        match result {
            Ok(tool_result) => {
                if !tool_result.success {
                    debug!(
                        agent = %self.name,
                        tool = %tc.name,
                        "Tool reported failure to the model"
                    );
                }
                Ok(ToolOutcome {
                    text: tool_result.output,
                    exit_requested,
                })
            }
            Err(ToolError::NotFound(name)) => {
                warn!(agent = %self.name, tool = %name, "Model asked for an undeclared tool");
                Ok(ToolOutcome {
                    text: format!("Error: unknown tool '{name}'"),
                    exit_requested: false,
                })
            }
            Err(e) => {
                warn!(agent = %self.name, tool = %tc.name, error = %e, "Tool execution failed");
                Err(e.into())
            }
        }
    }

    /// Record `text` as this agent's result.
    fn finish(
        &self,
        ctx: &mut InvocationContext,
        text: String,
        signal: ControlSignal,
    ) -> AgentOutcome {
        if let Some(key) = &self.output_key {
            ctx.write_output(&self.name, key, text.clone());
        }
        AgentOutcome::new(&self.name, Some(text)).with_signal(signal)
    }
}

fn parse_arguments(raw: &str) -> std::result::Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        Ok(serde_json::json!({}))
    } else {
        serde_json::from_str(raw)
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Leaf
    }

    fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    fn input_keys(&self) -> Vec<Placeholder> {
        template::placeholders(&self.instruction)
    }

    async fn run(&self, ctx: &mut InvocationContext) -> Result<AgentOutcome> {
        let system_prompt = ctx.render_instruction(&self.name, &self.instruction)?;

        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Message::system(system_prompt));
        }
        messages.push(Message::user(ctx.user_input()));

        let definitions = self.tools.definitions();
        let mut tool_rounds: u32 = 0;

        debug!(agent = %self.name, model = %self.model, tools = definitions.len(), "Running agent");

        loop {
            ctx.check_cancelled()?;

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
            };

            let response = self.call_model(ctx, request).await?;
            if let Some(usage) = response.usage {
                debug!(
                    agent = %self.name,
                    model = %response.model,
                    prompt_tokens = usage.prompt,
                    completion_tokens = usage.completion,
                    "Model replied"
                );
            }
            let reply = response.message;

            if !reply.requests_tools() {
                return Ok(self.finish(ctx, reply.content, ControlSignal::Continue));
            }

            if tool_rounds >= self.max_tool_iterations {
                warn!(
                    agent = %self.name,
                    iterations = tool_rounds,
                    "Max tool iterations reached"
                );
                return Err(Error::Internal(format!(
                    "agent '{}' exceeded {} tool iterations",
                    self.name, self.max_tool_iterations
                )));
            }
            tool_rounds += 1;

            let text = reply.content.clone();
            let calls = reply.tool_calls.clone();
            messages.push(reply);

            let mut exit_ack = None;
            for tc in &calls {
                let outcome = self.invoke_tool(ctx, tc).await?;
                if outcome.exit_requested {
                    exit_ack = Some(outcome.text.clone());
                }
                messages.push(Message::tool_result(&tc.id, outcome.text));
            }

            if let Some(ack) = exit_ack {
                info!(agent = %self.name, "Tool requested loop exit");
                if text.trim().is_empty() {
                    return Ok(AgentOutcome::exit(&self.name, Some(ack)));
                }
                return Ok(self.finish(ctx, text, ControlSignal::RequestExit));
            }

            ctx.check_cancelled()?;
        }
    }
}

/// Builds an [`LlmAgent`], checking its definition.
pub struct LlmAgentBuilder {
    name: String,
    description: String,
    model: Option<String>,
    instruction: String,
    tools: Vec<Arc<dyn Tool>>,
    output_key: Option<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    max_tool_iterations: u32,
    provider: Option<Arc<dyn Provider>>,
    retry: Option<RetryPolicy>,
}

impl LlmAgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            model: None,
            instruction: String::new(),
            tools: Vec::new(),
            output_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            provider: None,
            retry: None,
        }
    }

    /// Start from the application defaults: the active provider's model,
    /// sampling, tool budget and retry policy.
    pub fn from_config(name: impl Into<String>, config: &AppConfig) -> Self {
        Self::new(name)
            .model(config.model_name())
            .temperature(config.model.temperature)
            .max_tokens(config.model.max_tokens)
            .max_tool_iterations(config.engine.max_tool_iterations)
            .retry(RetryPolicy::from(&config.retry))
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Instruction template; `{key}` placeholders resolve from shared state.
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn max_tool_iterations(mut self, max: u32) -> Self {
        self.max_tool_iterations = max;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Retry failed model calls under `policy`.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.retry = None;
        self
    }

    pub fn build(self) -> std::result::Result<LlmAgent, WorkflowError> {
        let invalid = |reason: &str| WorkflowError::InvalidDefinition {
            agent: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("agent name must not be empty"));
        }
        let Some(provider) = self.provider.clone() else {
            return Err(invalid("no model provider configured"));
        };
        let Some(model) = self.model.clone() else {
            return Err(invalid("no model configured"));
        };
        if self.max_tool_iterations == 0 {
            return Err(invalid("max_tool_iterations must be at least 1"));
        }
        if matches!(self.output_key.as_deref(), Some(k) if k.trim().is_empty()) {
            return Err(invalid("output_key must not be empty"));
        }

        let mut tools = ToolRegistry::new();
        for tool in &self.tools {
            if tools.get(tool.name()).is_some() {
                return Err(invalid(&format!("tool '{}' declared twice", tool.name())));
            }
            tools.register(tool.clone());
        }

        Ok(LlmAgent {
            name: self.name,
            description: self.description,
            model,
            instruction: self.instruction,
            tools,
            output_key: self.output_key,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            max_tool_iterations: self.max_tool_iterations,
            provider,
            retry: self.retry,
        })
    }
}
