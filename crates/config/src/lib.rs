//! Configuration for Tandem.
//!
//! Application settings live in `~/.tandem/config.toml` (or the file named by
//! `TANDEM_CONFIG`), grouped into `[model]`, `[retry]`, `[engine]` and
//! `[providers.<name>]` sections. Workflow definition files and instruction
//! files are loaded by the [`workflow`] and [`instruction`] modules.

pub mod instruction;
pub mod workflow;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tandem_core::MissingKeyPolicy;

pub use instruction::load_instruction;
pub use workflow::{AgentDefinition, AgentKindConfig, WorkflowConfig};

/// Environment variables consulted for an API key, highest priority first.
pub const API_KEY_VARS: [&str; 3] = ["TANDEM_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY"];

/// Everything `config.toml` can set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-provider endpoints, keys and model overrides
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// Defaults for every leaf agent that does not say otherwise.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider that serves model calls
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model used when neither the agent nor its provider names one
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Key shared by providers without their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model_name() -> String {
    "google/gemini-2.5-flash-lite".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_model_name(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key: None,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Replaces `model.name` for agents served by this provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn secret(key: &Option<String>) -> &'static str {
    if key.is_some() { "[REDACTED]" } else { "None" }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("name", &self.name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &secret(&self.api_key))
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &secret(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Bounded exponential backoff for model calls.
///
/// The n-th retry waits `initial_delay_secs * exp_base^(n-1)`, capped at
/// `max_delay_secs`. Only failures whose HTTP status is listed in
/// `http_status_codes` are retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first call
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_exp_base")]
    pub exp_base: f64,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,

    #[serde(default = "default_retry_codes")]
    pub http_status_codes: Vec<u16>,
}

fn default_attempts() -> u32 {
    5
}
fn default_exp_base() -> f64 {
    7.0
}
fn default_initial_delay() -> f64 {
    1.0
}
fn default_max_delay() -> f64 {
    60.0
}
fn default_retry_codes() -> Vec<u16> {
    vec![429, 500, 503, 504]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            exp_base: default_exp_base(),
            initial_delay_secs: default_initial_delay(),
            max_delay_secs: default_max_delay(),
            http_status_codes: default_retry_codes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// What a `{key}` placeholder resolves to when the key is not set
    #[serde(default)]
    pub missing_key_policy: MissingKeyPolicy,

    /// Model round-trips a leaf agent may spend on tool calls
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Buffer size of the domain event bus
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_tool_iterations() -> u32 {
    10
}
fn default_event_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            missing_key_policy: MissingKeyPolicy::default(),
            max_tool_iterations: default_max_tool_iterations(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl AppConfig {
    /// Load [`AppConfig::path`], then apply environment overrides.
    ///
    /// - `TANDEM_API_KEY`, `OPENROUTER_API_KEY`, `OPENAI_API_KEY`: shared key
    ///   when the file sets none
    /// - `TANDEM_PROVIDER`: active provider
    /// - `TANDEM_MODEL`: model of the active provider
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::path())?;
        config.apply_env(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
        Ok(config)
    }

    /// Load one file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a config document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `TANDEM_CONFIG`, or `~/.tandem/config.toml`.
    pub fn path() -> PathBuf {
        match std::env::var_os("TANDEM_CONFIG") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => home_dir().join(".tandem").join("config.toml"),
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.model.api_key.is_none() {
            self.model.api_key = API_KEY_VARS.iter().find_map(|name| lookup(name));
        }
        if let Some(provider) = lookup("TANDEM_PROVIDER") {
            self.model.provider = provider;
        }
        if let Some(model) = lookup("TANDEM_MODEL") {
            let active = self.model.provider.clone();
            self.providers.entry(active).or_default().model = Some(model);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| Err(ConfigError::ValidationError(message.to_string()));

        if self.model.provider.trim().is_empty() {
            return fail("model.provider must not be empty");
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return fail("model.temperature must be between 0.0 and 2.0");
        }
        if self.retry.attempts == 0 {
            return fail("retry.attempts must be at least 1");
        }
        if self.retry.exp_base < 1.0 {
            return fail("retry.exp_base must be >= 1.0");
        }
        if self.retry.initial_delay_secs < 0.0 || self.retry.max_delay_secs < 0.0 {
            return fail("retry delays must not be negative");
        }
        if self.engine.max_tool_iterations == 0 {
            return fail("engine.max_tool_iterations must be at least 1");
        }
        if self.engine.event_capacity == 0 {
            return fail("engine.event_capacity must be at least 1");
        }
        Ok(())
    }

    /// The model agents use when they do not name one: the active
    /// provider's `model`, falling back to `model.name`.
    pub fn model_name(&self) -> &str {
        self.providers
            .get(&self.model.provider)
            .and_then(|p| p.model.as_deref())
            .unwrap_or(&self.model.name)
    }

    /// Key for `provider`: its own, else the shared one.
    pub fn api_key_for(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.as_deref())
            .or(self.model.api_key.as_deref())
    }

    /// Whether the active provider has a key.
    pub fn has_api_key(&self) -> bool {
        self.api_key_for(&self.model.provider).is_some()
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid workflow definition: {0}")]
    Workflow(#[from] tandem_core::WorkflowError),
}
