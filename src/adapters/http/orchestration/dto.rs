//! HTTP DTOs for orchestration endpoints.
//!
//! These types decouple the HTTP API from domain types, allowing independent evolution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::orchestration::{HealthReport, ProcessedMessage, SessionHistory};
use crate::domain::capability::AgentCapabilities;
use crate::domain::flow::ActionRecord;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Request to process a user message.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessMessageRequest {
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Query parameters for session history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 200;

    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT)
    }
}

/// Request addressing a user's workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRequest {
    pub user_id: String,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

/// Response for a processed message or resumed workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub response: String,
    pub actions: Vec<ActionRecord>,
}

impl From<ProcessedMessage> for MessageResponse {
    fn from(processed: ProcessedMessage) -> Self {
        Self {
            response: processed.response,
            actions: processed.actions,
        }
    }
}

/// Discovery listing of public capabilities grouped by agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    pub agents: Vec<AgentCapabilities>,
    pub total: usize,
}

impl From<Vec<AgentCapabilities>> for CapabilitiesResponse {
    fn from(agents: Vec<AgentCapabilities>) -> Self {
        let total = agents.iter().map(|a| a.capabilities.len()).sum();
        Self { agents, total }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub capabilities: usize,
    pub active_sessions: usize,
    pub llm: LlmInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmInfo {
    pub adapter: String,
    pub model: String,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        Self {
            status: report.status,
            capabilities: report.capabilities,
            active_sessions: report.active_sessions,
            llm: LlmInfo {
                adapter: report.llm_adapter,
                model: report.llm_model,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseResponse {
    pub paused: bool,
}

/// One message in a session history response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// Session summary with recent messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistoryResponse {
    pub user_id: String,
    pub message_count: u64,
    pub flow_count: usize,
    pub created_at: String,
    pub last_activity: String,
    pub last_message: Option<String>,
    pub last_response: Option<String>,
    pub paused_workflow: Option<String>,
    pub messages: Vec<HistoryMessage>,
}

impl From<SessionHistory> for SessionHistoryResponse {
    fn from(history: SessionHistory) -> Self {
        Self {
            user_id: history.user_id,
            message_count: history.message_count,
            flow_count: history.flow_count,
            created_at: history.created_at.as_datetime().to_rfc3339(),
            last_activity: history.last_activity.as_datetime().to_rfc3339(),
            last_message: history.last_message,
            last_response: history.last_response,
            paused_workflow: history.paused_workflow,
            messages: history
                .messages
                .iter()
                .map(|m| HistoryMessage {
                    role: m.role().as_str().to_string(),
                    content: m.content().to_string(),
                    timestamp: m.timestamp().as_datetime().to_rfc3339(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearSessionResponse {
    pub cleared: bool,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self {
            code: "NOT_FOUND".to_string(),
            message: format!("{} not found: {}", resource_type, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::CapabilityInfo;
    use serde_json::json;

    #[test]
    fn message_request_metadata_is_optional() {
        let request: ProcessMessageRequest =
            serde_json::from_value(json!({"user_id": "u1", "text": "hi"})).unwrap();
        assert!(request.metadata.is_none());
    }

    #[test]
    fn capabilities_response_counts_all_capabilities() {
        let info = |name: &str| CapabilityInfo {
            name: name.to_string(),
            description: String::new(),
            parameters: Vec::new(),
            examples: Vec::new(),
            stats: Default::default(),
        };
        let response = CapabilitiesResponse::from(vec![
            AgentCapabilities {
                agent: "a".into(),
                description: String::new(),
                capabilities: vec![info("x"), info("y")],
            },
            AgentCapabilities {
                agent: "b".into(),
                description: String::new(),
                capabilities: vec![info("z")],
            },
        ]);
        assert_eq!(response.total, 3);
    }

    #[test]
    fn history_limit_defaults_and_caps() {
        assert_eq!(HistoryQuery::default().limit(), HistoryQuery::DEFAULT_LIMIT);
        let huge = HistoryQuery { limit: Some(10_000) };
        assert_eq!(huge.limit(), HistoryQuery::MAX_LIMIT);
    }

    #[test]
    fn error_response_serializes() {
        let body = serde_json::to_value(ErrorResponse::bad_request("user_id is required")).unwrap();
        assert_eq!(body["code"], "BAD_REQUEST");
    }
}
