//! Orchestration pipeline configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Timeout for a single capability invocation, in milliseconds
    #[serde(default = "default_capability_timeout")]
    pub capability_timeout_ms: u64,

    /// How many earlier flows the planner sees
    #[serde(default = "default_history_flows")]
    pub decision_history_flows: usize,

    /// Capability used when planning fails
    #[serde(default = "default_general_query")]
    pub general_query_capability: String,

    /// Flows kept on a session before the oldest are dropped
    #[serde(default = "default_max_flows")]
    pub max_flows_retained: usize,

    /// Summarize evicted context with the LLM instead of the heuristic
    #[serde(default)]
    pub use_llm_summarizer: bool,
}

impl OrchestratorConfig {
    pub fn capability_timeout(&self) -> Duration {
        Duration::from_millis(self.capability_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.capability_timeout_ms == 0 {
            return Err(ValidationError::MustBePositive {
                field: "orchestrator.capability_timeout_ms",
            });
        }
        if self.max_flows_retained == 0 {
            return Err(ValidationError::MustBePositive {
                field: "orchestrator.max_flows_retained",
            });
        }
        if self.general_query_capability.trim().is_empty() {
            return Err(ValidationError::MissingRequired(
                "orchestrator.general_query_capability",
            ));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            capability_timeout_ms: default_capability_timeout(),
            decision_history_flows: default_history_flows(),
            general_query_capability: default_general_query(),
            max_flows_retained: default_max_flows(),
            use_llm_summarizer: false,
        }
    }
}

fn default_capability_timeout() -> u64 {
    10_000
}

fn default_history_flows() -> usize {
    3
}

fn default_general_query() -> String {
    "general_query".to_string()
}

fn default_max_flows() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.capability_timeout(), Duration::from_secs(10));
        assert_eq!(config.general_query_capability, "general_query");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let config = OrchestratorConfig {
            capability_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
