//! Session aggregate - per-user conversational memory.
//!
//! # Invariants
//!
//! - One session per user id
//! - `last_activity` is never before `created_at`
//! - `flows` holds at most the retention limit passed to [`Session::record_flow`]

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::flow::OrchestrationFlow;
use crate::domain::foundation::{SessionId, Timestamp, UserId};

use super::context::{ContextMessage, ContextRole, ConversationContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    context: ConversationContext,
    #[serde(default)]
    preferences: Map<String, Value>,
    #[serde(default)]
    state: Map<String, Value>,
    created_at: Timestamp,
    last_activity: Timestamp,
    #[serde(default)]
    flows: Vec<OrchestrationFlow>,
    /// User messages received over the session's lifetime, compression included.
    #[serde(default)]
    message_count: u64,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        let now = Timestamp::now();
        Self {
            id: SessionId::new(),
            user_id,
            context: ConversationContext::new(),
            preferences: Map::new(),
            state: Map::new(),
            created_at: now,
            last_activity: now,
            flows: Vec::new(),
            message_count: 0,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ConversationContext {
        &mut self.context
    }

    pub fn preferences(&self) -> &Map<String, Value> {
        &self.preferences
    }

    pub fn preference(&self, key: &str) -> Option<&Value> {
        self.preferences.get(key)
    }

    pub fn state(&self) -> &Map<String, Value> {
        &self.state
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn last_activity(&self) -> &Timestamp {
        &self.last_activity
    }

    pub fn flows(&self) -> &[OrchestrationFlow] {
        &self.flows
    }

    /// The last `n` flows, oldest first.
    pub fn recent_flows(&self, n: usize) -> &[OrchestrationFlow] {
        let start = self.flows.len().saturating_sub(n);
        &self.flows[start..]
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Content of the most recent user message still in context.
    pub fn last_message(&self) -> Option<&str> {
        self.context
            .last_with_role(ContextRole::User)
            .map(ContextMessage::content)
    }

    /// Content of the most recent agent reply still in context.
    pub fn last_response(&self) -> Option<&str> {
        self.context
            .last_with_role(ContextRole::Agent)
            .map(ContextMessage::content)
    }

    /// Returns true if there has been no activity since `cutoff`.
    pub fn is_inactive_since(&self, cutoff: &Timestamp) -> bool {
        self.last_activity.is_before(cutoff)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Appends a message without compressing; callers own the length bound.
    pub fn push_message(&mut self, message: ContextMessage) {
        if message.role() == ContextRole::User {
            self.message_count += 1;
        }
        self.context.push(message);
        self.touch();
    }

    /// Appends a finished flow, dropping the oldest beyond `max_retained`.
    pub fn record_flow(&mut self, flow: OrchestrationFlow, max_retained: usize) {
        self.flows.push(flow);
        if self.flows.len() > max_retained {
            let excess = self.flows.len() - max_retained;
            self.flows = self.flows.split_off(excess);
        }
        self.touch();
    }

    pub fn set_preference(&mut self, key: impl Into<String>, value: Value) {
        self.preferences.insert(key.into(), value);
        self.touch();
    }

    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
        self.touch();
    }

    pub fn touch(&mut self) {
        let now = Timestamp::now();
        if self.last_activity.is_before(&now) {
            self.last_activity = now;
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_activity(&mut self, at: Timestamp) {
        self.last_activity = at;
    }
}
