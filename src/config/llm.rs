//! Language model configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Upper bound on `max_retries`; backoff doubles per retry.
pub const MAX_LLM_RETRIES: u32 = 5;

/// Settings for the OpenAI-compatible adapter and the stages that call it.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// API key; without one the service runs against the mock adapter
    pub api_key: Option<Secret<String>>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    #[serde(default = "default_retries")]
    pub max_retries: u32,

    #[serde(default = "default_decision_temperature")]
    pub decision_temperature: f32,

    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ValidationError::InvalidBaseUrl(self.base_url.clone()));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::MustBePositive {
                field: "llm.timeout_secs",
            });
        }
        if self.max_tokens == 0 {
            return Err(ValidationError::MustBePositive {
                field: "llm.max_tokens",
            });
        }
        if self.max_retries > MAX_LLM_RETRIES {
            return Err(ValidationError::TooManyRetries {
                value: self.max_retries,
                max: MAX_LLM_RETRIES,
            });
        }
        for t in [self.decision_temperature, self.synthesis_temperature] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ValidationError::InvalidTemperature(t));
            }
        }
        Ok(())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            decision_temperature: default_decision_temperature(),
            synthesis_temperature: default_synthesis_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

fn default_decision_temperature() -> f32 {
    0.2
}

fn default_synthesis_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}
