//! Error types for the Tandem domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Tandem operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Workflow errors ---
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    // --- Cancellation ---
    #[error("Invocation cancelled")]
    Cancelled,

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed (status: {status_code}): {message}")]
    AuthenticationFailed { status_code: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        attempts: u32,
        last_error: Box<ProviderError>,
    },
}

impl ProviderError {
    /// The HTTP status code carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::ApiError { status_code, .. }
            | ProviderError::AuthenticationFailed { status_code, .. } => Some(*status_code),
            ProviderError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether this error's status code is in `retryable_codes`.
    pub fn is_retryable(&self, retryable_codes: &[u16]) -> bool {
        self.status_code()
            .is_some_and(|code| retryable_codes.contains(&code))
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error("Duplicate agent name: {0}")]
    DuplicateAgentName(String),

    #[error("Loop agent '{0}' needs max_iterations >= 1")]
    InvalidMaxIterations(String),

    #[error("Composite agent '{0}' has no sub-agents")]
    EmptyComposite(String),

    #[error("Unknown agent referenced: {0}")]
    UnknownAgent(String),

    #[error("Unknown tool '{tool}' on agent '{agent}'")]
    UnknownTool { agent: String, tool: String },

    #[error("Agent graph contains a cycle through '{0}'")]
    Cycle(String),

    #[error("Invalid agent definition '{agent}': {reason}")]
    InvalidDefinition { agent: String, reason: String },

    #[error("Agent '{agent}' references state key '{key}' which is not set")]
    MissingStateKey { agent: String, key: String },
}
