//! Shared fixtures for the scenario tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use tandem_agent::LlmAgent;
use tandem_core::error::ProviderError;
use tandem_core::message::{Message, MessageToolCall, Role};
use tandem_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tandem_tools::{EXIT_LOOP_TOOL, ExitLoopTool};

/// One scripted model turn.
#[derive(Debug, Clone, Copy)]
pub enum Turn {
    Text(&'static str),
    /// Call `exit_loop`, with optional text alongside the call.
    Exit(&'static str),
    Fail(u16),
}

/// A model that replays its turns in order and remembers every prompt.
///
/// The last turn repeats once the script runs out.
pub struct ScriptedModel {
    turns: Mutex<VecDeque<Turn>>,
    last: Mutex<Option<Turn>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn text(reply: &'static str) -> Arc<Self> {
        Self::new(vec![Turn::Text(reply)])
    }

    pub fn failing(status_code: u16) -> Arc<Self> {
        Self::new(vec![Turn::Fail(status_code)])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// System prompts in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.messages.iter().find(|m| m.role == Role::System))
            .map(|m| m.content.clone())
            .collect()
    }

    fn next_turn(&self) -> Result<ProviderResponse, ProviderError> {
        let mut turns = self.turns.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(turn) = turns.pop_front() {
            *last = Some(turn);
        }
        (*last).unwrap_or(Turn::Text("")).respond()
    }
}

impl Turn {
    fn respond(self) -> Result<ProviderResponse, ProviderError> {
        let message = match self {
            Turn::Text(text) => Message::assistant(text),
            Turn::Exit(text) => {
                Message::assistant(text).with_tool_calls(vec![MessageToolCall {
                    id: "call_exit".into(),
                    name: EXIT_LOOP_TOOL.into(),
                    arguments: "{}".into(),
                }])
            }
            Turn::Fail(status_code) => {
                return Err(ProviderError::ApiError {
                    status_code,
                    message: "scripted failure".into(),
                });
            }
        };
        Ok(ProviderResponse {
            message,
            usage: None,
            model: "mock-model".into(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.next_turn()
    }
}

/// An LLM agent on `model` with retries off.
pub fn llm(name: &str, instruction: &str, output_key: &str, model: Arc<ScriptedModel>) -> LlmAgent {
    LlmAgent::builder(name)
        .model("mock-model")
        .instruction(instruction)
        .output_key(output_key)
        .provider(model)
        .no_retry()
        .build()
        .unwrap()
}

/// Like [`llm`] but with the exit tool available.
pub fn llm_with_exit(
    name: &str,
    instruction: &str,
    output_key: &str,
    model: Arc<ScriptedModel>,
) -> LlmAgent {
    LlmAgent::builder(name)
        .model("mock-model")
        .instruction(instruction)
        .output_key(output_key)
        .tool(Arc::new(ExitLoopTool::new()))
        .provider(model)
        .no_retry()
        .build()
        .unwrap()
}
