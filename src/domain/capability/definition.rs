//! Capability - a named, parameterized action an agent can perform.
//!
//! A capability pairs metadata (name, description, parameter schemas, usage
//! examples) with an async handler. Capabilities are immutable once built;
//! the registry owns them after registration.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use super::parameter::{parameters_json_schema, ParameterSchema};

/// Argument key the execution stage injects with the requesting user's id.
pub const INJECTED_USER_ID: &str = "user_id";

/// Argument key the execution stage injects with the session context snapshot.
pub const INJECTED_CONTEXT: &str = "context";

/// Failure reported by a capability handler.
///
/// The message is surfaced to synthesis verbatim, so keep it human readable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::new(format!("Invalid arguments: {}", err))
    }
}

/// Validated arguments handed to a capability handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityArgs {
    values: Map<String, Value>,
}

impl CapabilityArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Raw argument lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// String argument, erroring if absent or not a string.
    pub fn str(&self, name: &str) -> Result<&str, HandlerError> {
        self.values
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::new(format!("Argument '{}' must be a string", name)))
    }

    /// Numeric argument, erroring if absent or not a number.
    pub fn number(&self, name: &str) -> Result<f64, HandlerError> {
        self.values
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| HandlerError::new(format!("Argument '{}' must be a number", name)))
    }

    /// Boolean argument, erroring if absent or not a boolean.
    pub fn bool(&self, name: &str) -> Result<bool, HandlerError> {
        self.values
            .get(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| HandlerError::new(format!("Argument '{}' must be a boolean", name)))
    }

    /// Deserializes the whole argument map into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_value(Value::Object(self.values.clone()))?)
    }

    /// Id of the user the execution stage ran this on behalf of.
    pub fn user_id(&self) -> Option<&str> {
        self.values.get(INJECTED_USER_ID).and_then(Value::as_str)
    }

    /// Session context snapshot injected by the execution stage.
    pub fn context(&self) -> Option<&Value> {
        self.values.get(INJECTED_CONTEXT)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }
}

/// Async handler backing a capability.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn handle(&self, args: CapabilityArgs) -> Result<Value, HandlerError>;
}

/// Adapts an async closure into a [`CapabilityHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> CapabilityHandler for FnHandler<F>
where
    F: Fn(CapabilityArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn handle(&self, args: CapabilityArgs) -> Result<Value, HandlerError> {
        (self.0)(args).await
    }
}

/// Wraps an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn CapabilityHandler>
where
    F: Fn(CapabilityArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A named action with declared parameters and an async handler.
#[derive(Clone)]
pub struct Capability {
    name: String,
    description: String,
    parameters: Vec<ParameterSchema>,
    examples: Vec<String>,
    internal: bool,
    cache_ttl: Option<Duration>,
    handler: Arc<dyn CapabilityHandler>,
}

impl Capability {
    /// Creates a public capability with no parameters.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn CapabilityHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            examples: Vec::new(),
            internal: false,
            cache_ttl: None,
            handler,
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterSchema) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Hides the capability from discovery and from the planner catalog.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Lets the execution stage reuse successful results for this long.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[ParameterSchema] {
        &self.parameters
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl
    }

    pub(crate) fn handler(&self) -> &Arc<dyn CapabilityHandler> {
        &self.handler
    }

    /// JSON Schema object for this capability's arguments.
    pub fn parameters_schema(&self) -> Value {
        parameters_json_schema(&self.parameters)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("internal", &self.internal)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}
