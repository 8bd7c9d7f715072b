//! Context compression - keeps conversation memory bounded.
//!
//! When a context holds more than `max_history_length` messages, everything
//! but the most recent `floor(max_history_length * 0.3)` messages is folded
//! into one `system` message reading `"[Context Summary]: <summary>"`.
//!
//! # Invariants
//!
//! - Compressing a context at or below the threshold is a no-op
//! - After compression, `len == keep_recent + 1 <= max_history_length`

use async_trait::async_trait;
use thiserror::Error;

use super::context::{ContextMessage, ContextRole, ConversationContext};

/// Prefix of the synthesized summary message.
pub const SUMMARY_PREFIX: &str = "[Context Summary]: ";

/// Summary generation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    #[error("Summarizer failed: {0}")]
    SummarizerFailed(String),
}

/// Produces a summary of messages being dropped from a context.
#[async_trait]
pub trait ContextSummarizer: Send + Sync {
    /// Summarize messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `CompressionError` if a summary cannot be produced; callers
    /// fall back to [`HeuristicSummarizer`].
    async fn summarize(&self, messages: &[ContextMessage]) -> Result<String, CompressionError>;
}

/// Number of messages kept verbatim for a given history limit.
pub fn keep_recent(max_history_length: usize) -> usize {
    max_history_length * 3 / 10
}

/// Returns true if the context exceeds the limit.
pub fn needs_compression(context: &ConversationContext, max_history_length: usize) -> bool {
    context.len() > max_history_length.max(1)
}

/// Compresses with a synchronous summary function. Returns true if the
/// context was compressed.
pub fn compress_context_with<F>(
    context: &mut ConversationContext,
    max_history_length: usize,
    summarize: F,
) -> bool
where
    F: FnOnce(&[ContextMessage]) -> String,
{
    if !needs_compression(context, max_history_length) {
        return false;
    }
    let drop = context.len() - keep_recent(max_history_length.max(1));
    let summary = summarize(&context.messages()[..drop]);
    apply_summary(context, drop, summary);
    true
}

/// Compresses using a pluggable summarizer, falling back to the heuristic
/// summary if it fails. Returns true if the context was compressed.
pub async fn compress_context(
    context: &mut ConversationContext,
    max_history_length: usize,
    summarizer: &dyn ContextSummarizer,
) -> bool {
    if !needs_compression(context, max_history_length) {
        return false;
    }
    let drop = context.len() - keep_recent(max_history_length.max(1));
    let dropped = context.messages()[..drop].to_vec();

    let summary = match summarizer.summarize(&dropped).await {
        Ok(summary) if !summary.trim().is_empty() => summary,
        Ok(_) => HeuristicSummarizer::default().summarize_now(&dropped),
        Err(e) => {
            tracing::warn!("Context summarizer failed, using heuristic summary: {}", e);
            HeuristicSummarizer::default().summarize_now(&dropped)
        }
    };
    apply_summary(context, drop, summary);
    true
}

fn apply_summary(context: &mut ConversationContext, drop: usize, summary: String) {
    let message = ContextMessage::new(
        ContextRole::System,
        format!("{}{}", SUMMARY_PREFIX, summary.trim()),
    );
    context.replace_oldest(drop, message);
}

/// Deterministic summary built from message counts and recent user topics.
#[derive(Debug, Clone)]
pub struct HeuristicSummarizer {
    max_topics: usize,
    max_topic_chars: usize,
}

impl Default for HeuristicSummarizer {
    fn default() -> Self {
        Self {
            max_topics: 5,
            max_topic_chars: 80,
        }
    }
}

impl HeuristicSummarizer {
    pub fn summarize_now(&self, messages: &[ContextMessage]) -> String {
        let users = messages
            .iter()
            .filter(|m| m.role() == ContextRole::User)
            .count();
        let agents = messages
            .iter()
            .filter(|m| m.role() == ContextRole::Agent)
            .count();

        let mut parts = vec![format!(
            "{} earlier messages ({} from user, {} from agent).",
            messages.len(),
            users,
            agents
        )];

        if let Some(previous) = messages
            .iter()
            .filter(|m| m.role() == ContextRole::System)
            .filter_map(|m| m.content().strip_prefix(SUMMARY_PREFIX))
            .last()
        {
            parts.push(format!("Before that: {}", previous));
        }

        let topics: Vec<String> = messages
            .iter()
            .filter(|m| m.role() == ContextRole::User)
            .rev()
            .take(self.max_topics)
            .map(|m| clip(m.content(), self.max_topic_chars))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if !topics.is_empty() {
            parts.push(format!("User asked about: {}.", topics.join("; ")));
        }

        parts.join(" ")
    }
}

#[async_trait]
impl ContextSummarizer for HeuristicSummarizer {
    async fn summarize(&self, messages: &[ContextMessage]) -> Result<String, CompressionError> {
        Ok(self.summarize_now(messages))
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
