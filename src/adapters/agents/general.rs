//! Built-in `general` agent.
//!
//! Provides `general_query`, the capability the decision stage falls back to
//! when planning fails. It answers directly with the language model so a
//! flow always has something to synthesize.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::capability::{
    AgentGroup, Capability, CapabilityArgs, CapabilityHandler, HandlerError, ParameterSchema,
    ParameterType,
};
use crate::ports::{ChatMessage, GenerationOptions, LlmAdapter};

pub const GENERAL_AGENT: &str = "general";
pub const GENERAL_QUERY: &str = "general_query";

const GENERAL_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question \
briefly and accurately. If you do not know, say so.";

/// Answers free-form questions with the language model.
pub struct GeneralQueryHandler {
    llm: Arc<dyn LlmAdapter>,
    options: GenerationOptions,
}

impl GeneralQueryHandler {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self {
            llm,
            options: GenerationOptions::new().with_temperature(0.5).with_max_tokens(500),
        }
    }
}

#[async_trait]
impl CapabilityHandler for GeneralQueryHandler {
    async fn handle(&self, args: CapabilityArgs) -> Result<Value, HandlerError> {
        let query = args.str("query")?;

        let mut conversation = vec![ChatMessage::system(GENERAL_SYSTEM_PROMPT)];
        if let Some(Value::Array(recent)) = args.context() {
            for entry in recent {
                let content = entry.get("content").and_then(Value::as_str).unwrap_or_default();
                match entry.get("role").and_then(Value::as_str) {
                    Some("user") => conversation.push(ChatMessage::user(content)),
                    Some("agent") => conversation.push(ChatMessage::assistant(content)),
                    _ => {}
                }
            }
        }
        // the latest user message is usually already the tail of the context
        if conversation.last().map(|m| m.content.as_str()) != Some(query) {
            conversation.push(ChatMessage::user(query));
        }

        let answer = self
            .llm
            .generate_completion(&conversation, &self.options)
            .await
            .map_err(|e| HandlerError::new(format!("general query failed: {}", e)))?;

        Ok(json!({ "answer": answer.trim() }))
    }
}

/// The `general` agent group.
pub fn general_agent(llm: Arc<dyn LlmAdapter>) -> AgentGroup {
    AgentGroup::new(GENERAL_AGENT, "Answers general questions directly").with_capability(
        Capability::new(
            GENERAL_QUERY,
            "Answer a general question that no specialised capability covers",
            Arc::new(GeneralQueryHandler::new(llm)),
        )
        .with_parameter(ParameterSchema::required(
            "query",
            ParameterType::String,
            "The user's question",
        ))
        .with_example("What can you help me with?")
        .with_example("Explain what a liquidity pool is"),
    )
}
