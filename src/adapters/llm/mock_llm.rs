//! Mock LLM Adapter for testing.
//!
//! Provides a configurable implementation of the LlmAdapter port, allowing
//! tests to drive the decision and synthesis stages without a real model.
//!
//! # Features
//!
//! - Pre-configured replies consumed in order by both generation methods
//! - Simulated delays for timeout testing
//! - Error injection for resilience testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let adapter = MockLlmAdapter::new()
//!     .with_json(json!({"decisions": [], "reasoning": "nothing to do"}))
//!     .with_json(json!({"response": "Hello!", "reasoning": "greeting"}));
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;

use crate::ports::{AdapterInfo, ChatMessage, GenerationOptions, LlmAdapter, LlmError};

/// A configured mock reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Free text; structured calls parse it as JSON.
    Text(String),
    /// A JSON value; completion calls receive it serialized.
    Json(Value),
    Error(MockError),
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    Timeout { timeout_secs: u64 },
}

impl From<MockError> for LlmError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => LlmError::rate_limited(retry_after_secs),
            MockError::Unavailable { message } => LlmError::unavailable(message),
            MockError::AuthenticationFailed => LlmError::AuthenticationFailed,
            MockError::Network { message } => LlmError::network(message),
            MockError::Timeout { timeout_secs } => LlmError::timeout(timeout_secs),
        }
    }
}

/// A recorded adapter call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub conversation: Vec<ChatMessage>,
    /// Present for structured-output calls.
    pub schema: Option<Value>,
    pub options: GenerationOptions,
}

/// Mock LLM adapter for testing.
#[derive(Debug, Clone)]
pub struct MockLlmAdapter {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    fallback: MockReply,
    delay: Duration,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for MockLlmAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmAdapter {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            fallback: MockReply::Text("Mock response".to_string()),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a text reply.
    pub fn with_text(self, content: impl Into<String>) -> Self {
        lock(&self.replies).push_back(MockReply::Text(content.into()));
        self
    }

    /// Queues a JSON reply.
    pub fn with_json(self, value: Value) -> Self {
        lock(&self.replies).push_back(MockReply::Json(value));
        self
    }

    /// Queues an error.
    pub fn with_error(self, error: MockError) -> Self {
        lock(&self.replies).push_back(MockReply::Error(error));
        self
    }

    /// Reply used once the queue is exhausted.
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Sets simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn get_calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    async fn next_reply(
        &self,
        conversation: &[ChatMessage],
        schema: Option<&Value>,
        options: &GenerationOptions,
    ) -> MockReply {
        lock(&self.calls).push(MockCall {
            conversation: conversation.to_vec(),
            schema: schema.cloned(),
            options: options.clone(),
        });

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let next = lock(&self.replies).pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    async fn generate_completion(
        &self,
        conversation: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        match self.next_reply(conversation, None, options).await {
            MockReply::Text(text) => Ok(text),
            MockReply::Json(value) => Ok(value.to_string()),
            MockReply::Error(err) => Err(err.into()),
        }
    }

    async fn generate_structured_output(
        &self,
        conversation: &[ChatMessage],
        schema: &Value,
        options: &GenerationOptions,
    ) -> Result<Value, LlmError> {
        match self.next_reply(conversation, Some(schema), options).await {
            MockReply::Text(text) => serde_json::from_str(&text)
                .map_err(|e| LlmError::parse(format!("Mock reply is not JSON: {}", e))),
            MockReply::Json(value) => Ok(value),
            MockReply::Error(err) => Err(err.into()),
        }
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo::new("mock", "mock-model-1")
    }
}
