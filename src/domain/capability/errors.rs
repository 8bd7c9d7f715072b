//! Capability registry and execution errors.

use thiserror::Error;

use super::parameter::ParameterError;

/// Errors raised by the capability registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("Capability not found: {0}")]
    NotFound(String),

    #[error("Capability already registered: {0}")]
    DuplicateName(String),

    #[error("Invalid parameters for {capability}: {source}")]
    InvalidParameters {
        capability: String,
        #[source]
        source: ParameterError,
    },

    #[error("Capability {capability} failed: {message}")]
    Execution { capability: String, message: String },

    #[error("Capability {capability} timed out after {timeout_ms}ms")]
    TimedOut { capability: String, timeout_ms: u64 },
}

impl CapabilityError {
    /// Message suitable for an `ERROR:` marker in synthesis input.
    ///
    /// Handler failures pass through untouched; everything else uses Display.
    pub fn message(&self) -> String {
        match self {
            CapabilityError::Execution { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Returns true if the failure came from the caller's input rather than the handler.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CapabilityError::NotFound(_) | CapabilityError::InvalidParameters { .. }
        )
    }
}
