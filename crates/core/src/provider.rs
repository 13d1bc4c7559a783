//! The model seam.
//!
//! Leaf agents hand a [`Provider`] their conversation and get the model's
//! next message back. Which backend answers, and over what wire, is the
//! provider's business.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;
use crate::message::Message;

/// One model call.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,

    /// Tools the model may call this turn
    pub tools: Vec<ToolDefinition>,
}

/// How a tool is described to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,

    /// JSON Schema of the arguments
    pub parameters: serde_json::Value,
}

/// The model's reply to one [`ProviderRequest`].
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub message: Message,
    pub usage: Option<TokenUsage>,

    /// The model that answered, which may differ from the one requested
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt.saturating_add(self.completion)
    }
}

/// A model backend.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Run one model call. Failures that came from an HTTP response keep
    /// their status code so callers can decide whether to retry.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;

    async fn health_check(&self) -> Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_total_saturates() {
        let usage = TokenUsage {
            prompt: 12,
            completion: 3,
        };
        assert_eq!(usage.total(), 15);
        assert_eq!(
            TokenUsage {
                prompt: u32::MAX,
                completion: 1
            }
            .total(),
            u32::MAX
        );
    }

    #[test]
    fn tool_definitions_serialize_as_json_schema_functions() {
        let tool = ToolDefinition {
            name: "exit_loop".into(),
            description: "Stop the enclosing refinement loop".into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        };
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["name"], "exit_loop");
        assert_eq!(json["parameters"]["type"], "object");
    }
}
