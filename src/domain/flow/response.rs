//! Execution outcomes and the caller-facing action audit trail.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::Timestamp;

use super::AgentDecision;

/// Outcome of running one decision (or one workflow step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: String,
    pub capability: String,
    pub response: Option<Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl AgentResponse {
    pub fn succeeded(
        agent: impl Into<String>,
        capability: impl Into<String>,
        response: Value,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            agent: agent.into(),
            capability: capability.into(),
            response: Some(response),
            success: true,
            error: None,
            execution_time_ms,
        }
    }

    pub fn failed(
        agent: impl Into<String>,
        capability: impl Into<String>,
        error: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            agent: agent.into(),
            capability: capability.into(),
            response: None,
            success: false,
            error: Some(error.into()),
            execution_time_ms,
        }
    }
}

/// Audit entry returned to the caller of `process_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub agent: String,
    pub action: String,
    pub parameters: Map<String, Value>,
    pub result: Option<Value>,
    pub timestamp: Timestamp,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionRecord {
    /// Pairs a decision with its outcome.
    pub fn from_outcome(
        parameters: Map<String, Value>,
        response: &AgentResponse,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            agent: response.agent.clone(),
            action: response.capability.clone(),
            parameters,
            result: response.response.clone(),
            timestamp,
            success: response.success,
            error: response.error.clone(),
        }
    }

    /// Builds records for a decision list and its same-ordered responses.
    pub fn from_decisions(
        decisions: &[AgentDecision],
        responses: &[AgentResponse],
        timestamp: Timestamp,
    ) -> Vec<Self> {
        decisions
            .iter()
            .zip(responses)
            .map(|(d, r)| Self::from_outcome(d.parameters.clone(), r, timestamp))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failed_response_has_no_payload() {
        let r = AgentResponse::failed("market", "market_price", "rate limited", 12);
        assert!(!r.success);
        assert_eq!(r.response, None);
        assert_eq!(r.error.as_deref(), Some("rate limited"));
    }

    #[test]
    fn action_records_pair_decisions_with_responses() {
        let mut params = Map::new();
        params.insert("ticker".into(), json!("KAS"));
        let decisions = vec![AgentDecision::new("market", "market_price", params)];
        let responses = vec![AgentResponse::succeeded(
            "market",
            "market_price",
            json!({"price": 0.1}),
            5,
        )];

        let records = ActionRecord::from_decisions(&decisions, &responses, Timestamp::now());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "market_price");
        assert_eq!(records[0].parameters["ticker"], "KAS");
        assert!(records[0].success);
    }

    #[test]
    fn error_field_is_omitted_when_absent() {
        let r = AgentResponse::succeeded("a", "c", json!(1), 0);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("error").is_none());
    }
}
