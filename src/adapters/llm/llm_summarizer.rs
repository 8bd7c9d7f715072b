//! LLM-backed context summarizer.
//!
//! Asks the language model for a short recap of messages evicted during
//! context compression. Failures surface as `CompressionError` so the caller
//! can fall back to the heuristic summary.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::session::{CompressionError, ContextMessage, ContextRole, ContextSummarizer};
use crate::ports::{ChatMessage, GenerationOptions, LlmAdapter};

const SUMMARY_INSTRUCTIONS: &str = "Summarize the following conversation excerpt in at most \
three sentences. Keep names, numbers and open requests. Reply with the summary only.";

pub struct LlmSummarizer {
    llm: Arc<dyn LlmAdapter>,
    max_tokens: u32,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self {
            llm,
            max_tokens: 200,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

fn transcript(messages: &[ContextMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            let speaker = match m.role() {
                ContextRole::User => "User",
                ContextRole::Agent => "Assistant",
                ContextRole::System => "System",
            };
            format!("{}: {}", speaker, m.content())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ContextSummarizer for LlmSummarizer {
    async fn summarize(&self, messages: &[ContextMessage]) -> Result<String, CompressionError> {
        let conversation = vec![
            ChatMessage::system(SUMMARY_INSTRUCTIONS),
            ChatMessage::user(transcript(messages)),
        ];
        let options = GenerationOptions::new()
            .with_temperature(0.0)
            .with_max_tokens(self.max_tokens);

        self.llm
            .generate_completion(&conversation, &options)
            .await
            .map(|s| s.trim().to_string())
            .map_err(|e| CompressionError::SummarizerFailed(e.to_string()))
    }
}
