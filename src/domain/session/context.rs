//! Conversation context - the ordered message memory of a session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{MessageId, Timestamp};
use crate::domain::workflow::Workflow;

/// Who produced a context message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRole {
    User,
    Agent,
    System,
}

impl ContextRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextRole::User => "user",
            ContextRole::Agent => "agent",
            ContextRole::System => "system",
        }
    }
}

/// An immutable entry in a conversation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    id: MessageId,
    role: ContextRole,
    content: String,
    timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

impl ContextMessage {
    pub fn new(role: ContextRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Timestamp::now(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn role(&self) -> ContextRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }
}

/// Ordered conversation memory, optionally holding a paused workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    messages: Vec<ContextMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_workflow: Option<Workflow>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ContextMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ContextMessage) {
        self.messages.push(message);
    }

    /// The last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[ContextMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Most recent message with the given role.
    pub fn last_with_role(&self, role: ContextRole) -> Option<&ContextMessage> {
        self.messages.iter().rev().find(|m| m.role == role)
    }

    /// JSON snapshot of the last `n` messages, as injected into capability calls.
    pub fn snapshot(&self, n: usize) -> Value {
        Value::Array(
            self.recent(n)
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "role": m.role,
                        "content": m.content,
                        "timestamp": m.timestamp,
                    })
                })
                .collect(),
        )
    }

    pub fn active_workflow(&self) -> Option<&Workflow> {
        self.active_workflow.as_ref()
    }

    pub fn set_active_workflow(&mut self, workflow: Workflow) {
        self.active_workflow = Some(workflow);
    }

    pub fn take_active_workflow(&mut self) -> Option<Workflow> {
        self.active_workflow.take()
    }

    /// Replaces the oldest `count` messages with a single message.
    pub(crate) fn replace_oldest(&mut self, count: usize, replacement: ContextMessage) {
        let count = count.min(self.messages.len());
        let kept = self.messages.split_off(count);
        self.messages = std::iter::once(replacement).chain(kept).collect();
    }
}
