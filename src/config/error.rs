//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid LLM base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Temperature must be between 0.0 and 2.0: {0}")]
    InvalidTemperature(f32),

    #[error("{field} must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("llm.max_retries must be at most {max}, got {value}")]
    TooManyRetries { value: u32, max: u32 },

    #[error("max_history_length must be at least 2, got {0}")]
    HistoryTooShort(usize),

    #[error("API key is required in production")]
    ApiKeyRequiredInProduction,
}
