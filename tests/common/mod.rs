//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use maestro::adapters::llm::MockLlmAdapter;
use maestro::domain::capability::{
    handler_fn, AgentGroup, Capability, CapabilityArgs, CapabilityRegistry, HandlerError,
    ParameterSchema, ParameterType,
};
use maestro::domain::foundation::UserId;
use maestro::domain::session::Session;
use maestro::ports::{
    AdapterInfo, ChatMessage, GenerationOptions, LlmAdapter, LlmError, SessionStore,
    SessionStoreError,
};

/// Invocation counters for the test capabilities.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub market_price: Arc<AtomicUsize>,
    pub general_query: Arc<AtomicUsize>,
    pub slow_step: Arc<AtomicUsize>,
    pub add_one: Arc<AtomicUsize>,
}

impl Counters {
    pub fn get(counter: &Arc<AtomicUsize>) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

fn counted(counter: &Arc<AtomicUsize>) -> Arc<AtomicUsize> {
    counter.clone()
}

/// Registry with market, portfolio, math and general agents.
pub fn registry(counters: &Counters) -> Arc<CapabilityRegistry> {
    let market_calls = counted(&counters.market_price);
    let general_calls = counted(&counters.general_query);
    let slow_calls = counted(&counters.slow_step);
    let add_calls = counted(&counters.add_one);

    let mut registry = CapabilityRegistry::new();
    registry
        .register_group(
            AgentGroup::new("market", "Market data").with_capability(
                Capability::new(
                    "market_price",
                    "Current token price",
                    handler_fn(move |args: CapabilityArgs| {
                        let calls = market_calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            let ticker = args.str("ticker")?;
                            Ok::<_, HandlerError>(json!({"ticker": ticker, "price": 0.12}))
                        }
                    }),
                )
                .with_parameter(ParameterSchema::required(
                    "ticker",
                    ParameterType::String,
                    "Token ticker symbol",
                ))
                .with_example("What is the price of KAS?"),
            ),
        )
        .unwrap();
    registry
        .register_group(
            AgentGroup::new("portfolio", "Wallet balances").with_capability(Capability::new(
                "get_balance",
                "Wallet balance",
                handler_fn(|_| async { Err(HandlerError::new("rate limited")) }),
            )),
        )
        .unwrap();
    registry
        .register_group(
            AgentGroup::new("math", "Arithmetic helpers")
                .with_capability(Capability::new(
                    "produce_x",
                    "Produces X",
                    handler_fn(|_| async { Ok(json!({"X": 42})) }),
                ))
                .with_capability(
                    Capability::new(
                        "add_one",
                        "Adds one",
                        handler_fn(move |args: CapabilityArgs| {
                            let calls = add_calls.clone();
                            async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                let value = args
                                    .get("value")
                                    .and_then(Value::as_f64)
                                    .ok_or_else(|| HandlerError::new("value must be a number"))?;
                                Ok::<_, HandlerError>(json!({"value": value, "result": value + 1.0}))
                            }
                        }),
                    )
                    .with_parameter(ParameterSchema::required(
                        "value",
                        ParameterType::Number,
                        "Input",
                    )),
                )
                .with_capability(Capability::new(
                    "slow_step",
                    "Takes a while",
                    handler_fn(move |_| {
                        let calls = slow_calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(200)).await;
                            Ok(json!({"X": 1}))
                        }
                    }),
                )),
        )
        .unwrap();
    registry
        .register_group(
            AgentGroup::new("general", "General conversation").with_capability(
                Capability::new(
                    "general_query",
                    "Answers anything else",
                    handler_fn(move |args: CapabilityArgs| {
                        let calls = general_calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            let query = args.str("query")?;
                            Ok::<_, HandlerError>(json!({"answer": format!("About {}", query)}))
                        }
                    }),
                )
                .with_parameter(ParameterSchema::required(
                    "query",
                    ParameterType::String,
                    "The question",
                )),
            ),
        )
        .unwrap();
    Arc::new(registry)
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// LLM wrapper that stalls planner calls only.
pub struct SlowPlanner {
    pub inner: MockLlmAdapter,
    pub delay: Duration,
}

#[async_trait]
impl LlmAdapter for SlowPlanner {
    async fn generate_completion(
        &self,
        conversation: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String, LlmError> {
        self.inner.generate_completion(conversation, options).await
    }

    async fn generate_structured_output(
        &self,
        conversation: &[ChatMessage],
        schema: &Value,
        options: &GenerationOptions,
    ) -> Result<Value, LlmError> {
        if schema.pointer("/properties/decisions").is_some() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner
            .generate_structured_output(conversation, schema, options)
            .await
    }

    fn adapter_info(&self) -> AdapterInfo {
        self.inner.adapter_info()
    }
}

/// Session store whose every operation fails.
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn get(&self, _: &UserId) -> Result<Option<Session>, SessionStoreError> {
        Err(SessionStoreError::Backend("database offline".into()))
    }

    async fn save(&self, _: &Session) -> Result<(), SessionStoreError> {
        Err(SessionStoreError::Backend("database offline".into()))
    }

    async fn delete(&self, _: &UserId) -> Result<bool, SessionStoreError> {
        Err(SessionStoreError::Backend("database offline".into()))
    }

    async fn sweep(&self, _: Duration) -> Result<usize, SessionStoreError> {
        Err(SessionStoreError::Backend("database offline".into()))
    }

    async fn count(&self) -> Result<usize, SessionStoreError> {
        Err(SessionStoreError::Backend("database offline".into()))
    }
}
