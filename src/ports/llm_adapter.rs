//! LLM Adapter Port - Interface for language model integrations.
//!
//! The decision and synthesis stages talk to a model only through this port,
//! so providers (OpenAI-compatible APIs, mocks in tests) are swappable.
//!
//! # Design
//!
//! - `generate_completion` for free text
//! - `generate_structured_output` for JSON constrained by a schema
//! - Error variants classify transient failures via [`LlmError::is_retryable`]

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Port for language model interactions.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    /// Generate free text for a conversation.
    async fn generate_completion(
        &self,
        conversation: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String, LlmError>;

    /// Generate a JSON value conforming to `schema`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Parse` if the model output is not valid JSON.
    async fn generate_structured_output(
        &self,
        conversation: &[ChatMessage],
        schema: &Value,
        options: &GenerationOptions,
    ) -> Result<Value, LlmError>;

    /// Name and model of the adapter, for logs and health output.
    fn adapter_info(&self) -> AdapterInfo;
}

/// Calls `generate_structured_output` and decodes the result into `T`.
pub async fn generate_typed<T: DeserializeOwned>(
    adapter: &dyn LlmAdapter,
    conversation: &[ChatMessage],
    schema: &Value,
    options: &GenerationOptions,
) -> Result<T, LlmError> {
    let value = adapter
        .generate_structured_output(conversation, schema, options)
        .await?;
    serde_json::from_value(value).map_err(|e| LlmError::parse(e.to_string()))
}

/// A message in a model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// Sampling options for a generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    /// 0.0 = deterministic, 1.0+ = creative.
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Vec<String>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }
}

/// Adapter identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterInfo {
    pub name: String,
    pub model: String,
}

impl AdapterInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// LLM adapter errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("network error: {0}")]
    Network(String),

    /// Output could not be parsed into the requested shape.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl LlmError {
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn timeout(timeout_secs: u64) -> Self {
        Self::Timeout { timeout_secs }
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::Unavailable { .. }
                | LlmError::Network(_)
                | LlmError::Timeout { .. }
        )
    }
}
