//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `LlmAdapter` - language model used by the decision and synthesis stages
//! - `SessionStore` - per-user session persistence
//! - `ResultCache` - TTL cache for capability results

mod llm_adapter;
mod result_cache;
mod session_store;

pub use llm_adapter::{
    generate_typed, AdapterInfo, ChatMessage, ChatRole, GenerationOptions, LlmAdapter, LlmError,
};
pub use result_cache::{cache_key, ResultCache};
pub use session_store::{SessionStore, SessionStoreError};
