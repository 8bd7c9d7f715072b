//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `llm` - OpenAI-compatible and mock language model adapters, LLM summarizer
//! - `session` - in-memory session store
//! - `cache` - in-memory TTL result cache
//! - `agents` - built-in capability groups
//! - `http` - axum REST API

pub mod agents;
pub mod cache;
pub mod http;
pub mod llm;
pub mod session;

pub use cache::InMemoryResultCache;
pub use llm::{LlmSummarizer, MockLlmAdapter, OpenAiAdapter, OpenAiConfig};
pub use session::InMemorySessionStore;
