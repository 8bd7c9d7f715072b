//! Execution stage - runs planned decisions concurrently.
//!
//! Every decision is dispatched in its own task under a timeout, so a slow,
//! failing or panicking handler only ever produces a failed response for its
//! own decision. Responses come back in decision order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::domain::capability::{
    CapabilityError, CapabilityRegistry, INJECTED_CONTEXT, INJECTED_USER_ID,
};
use crate::domain::flow::{AgentDecision, AgentResponse};
use crate::domain::session::Session;
use crate::ports::{cache_key, ResultCache};

/// Context messages injected into capability arguments.
pub const INJECTED_CONTEXT_MESSAGES: usize = 10;

/// Values injected into every capability call, overriding planner arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationContext {
    pub user_id: String,
    pub context: Value,
}

impl InvocationContext {
    pub fn new(user_id: impl Into<String>, context: Value) -> Self {
        Self {
            user_id: user_id.into(),
            context,
        }
    }

    pub fn from_session(session: &Session) -> Self {
        Self::new(
            session.user_id().as_str(),
            session.context().snapshot(INJECTED_CONTEXT_MESSAGES),
        )
    }

    fn inject(&self, mut args: Map<String, Value>) -> Map<String, Value> {
        args.insert(
            INJECTED_USER_ID.to_string(),
            Value::String(self.user_id.clone()),
        );
        args.insert(INJECTED_CONTEXT.to_string(), self.context.clone());
        args
    }
}

/// Result of a single capability invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub result: Result<Value, CapabilityError>,
    pub elapsed_ms: u64,
    pub cached: bool,
}

#[derive(Clone)]
pub struct ExecutionStage {
    registry: Arc<CapabilityRegistry>,
    cache: Option<Arc<dyn ResultCache>>,
    timeout: Duration,
}

impl ExecutionStage {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            cache: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Owning agent of a capability.
    pub fn agent_of(&self, capability: &str) -> Option<&str> {
        self.registry.agent_of(capability)
    }

    /// Runs all decisions concurrently. The output has one response per
    /// decision, in the same order.
    pub async fn execute(
        &self,
        decisions: &[AgentDecision],
        context: &InvocationContext,
    ) -> Vec<AgentResponse> {
        let calls = decisions.iter().map(|decision| async move {
            let invocation = self
                .invoke(&decision.capability, decision.parameters.clone(), context)
                .await;
            to_response(&decision.agent, &decision.capability, invocation)
        });
        join_all(calls).await
    }

    /// Invokes one capability in an isolated task, consulting the result
    /// cache for capabilities that declare a TTL. Cached results are scoped
    /// to the requesting user.
    pub async fn invoke(
        &self,
        capability: &str,
        parameters: Map<String, Value>,
        context: &InvocationContext,
    ) -> Invocation {
        let started = Instant::now();
        let elapsed_ms = |started: Instant| started.elapsed().as_millis() as u64;

        let ttl = self
            .registry
            .get_by_name(capability)
            .and_then(|c| c.cache_ttl());
        let key = ttl.map(|_| cache_key(capability, &context.user_id, &parameters));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(value) = cache.get(key).await {
                debug!(capability = %capability, "Capability result served from cache");
                return Invocation {
                    result: Ok(value),
                    elapsed_ms: elapsed_ms(started),
                    cached: true,
                };
            }
        }

        let registry = self.registry.clone();
        let name = capability.to_string();
        let args = context.inject(parameters);
        let timeout = self.timeout;
        let task = tokio::spawn(async move {
            registry
                .execute_with_timeout(&name, args, Some(timeout))
                .await
        });

        let result = match task.await {
            Ok(result) => result,
            Err(join_error) => {
                error!(
                    capability = %capability,
                    error = %join_error,
                    "Capability task did not complete"
                );
                self.registry.record_failure(capability);
                Err(CapabilityError::Execution {
                    capability: capability.to_string(),
                    message: "capability handler crashed".to_string(),
                })
            }
        };

        if let (Ok(value), Some(cache), Some(key), Some(ttl)) = (&result, &self.cache, key, ttl) {
            cache.put(key, value.clone(), ttl).await;
        }

        Invocation {
            result,
            elapsed_ms: elapsed_ms(started),
            cached: false,
        }
    }
}

fn to_response(agent: &str, capability: &str, invocation: Invocation) -> AgentResponse {
    match invocation.result {
        Ok(value) => AgentResponse::succeeded(agent, capability, value, invocation.elapsed_ms),
        Err(e) => AgentResponse::failed(agent, capability, e.message(), invocation.elapsed_ms),
    }
}
