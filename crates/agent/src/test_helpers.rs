//! Scripted providers for agent tests.

use std::sync::Mutex;
use tandem_core::error::ProviderError;
use tandem_core::message::{Message, MessageToolCall};
use tandem_core::provider::{Provider, ProviderRequest, ProviderResponse, TokenUsage};

/// A mock provider that replays scripted results in order and records every
/// request it sees.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    script: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub fn single_text(text: &str) -> Self {
        Self::replies(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let script = self.script.lock().unwrap();
        let call = requests.len();
        assert!(
            call < script.len(),
            "ScriptedProvider: no more responses (call #{call}, have {})",
            script.len()
        );
        requests.push(request);
        script[call].clone()
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(TokenUsage {
            prompt: 10,
            completion: 5,
        }),
        model: "mock-model".into(),
    }
}

/// A response carrying tool calls alongside optional text.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, text: &str) -> ProviderResponse {
    let mut response = make_text_response(text);
    response.message = response.message.with_tool_calls(tool_calls);
    response
}

pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
