//! Capability Registry - the catalog of everything agents can do.
//!
//! Agents register groups of capabilities at startup. After that the registry
//! is shared read-only behind an `Arc`; only the per-capability execution
//! statistics change, and those are atomics.
//!
//! # Example
//!
//! ```
//! use maestro::domain::capability::{
//!     handler_fn, AgentGroup, Capability, CapabilityRegistry, HandlerError,
//! };
//! use serde_json::json;
//!
//! let mut registry = CapabilityRegistry::new();
//! let echo = Capability::new("echo", "Echo the input", handler_fn(|args| async move {
//!     Ok::<_, HandlerError>(json!(args.into_inner()))
//! }));
//! registry
//!     .register_group(AgentGroup::new("utility", "Utility helpers").with_capability(echo))
//!     .unwrap();
//!
//! assert_eq!(registry.agent_of("echo"), Some("utility"));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::Timestamp;

use super::definition::{Capability, CapabilityArgs};
use super::errors::CapabilityError;
use super::parameter::{validate_arguments, ParameterSchema};

/// A named agent bundling related capabilities.
#[derive(Debug, Clone)]
pub struct AgentGroup {
    name: String,
    description: String,
    capabilities: Vec<Capability>,
}

impl AgentGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }
}

/// Live execution counters for one capability.
#[derive(Debug, Default)]
struct CapabilityStats {
    execution_count: AtomicU64,
    failure_count: AtomicU64,
    /// Unix millis of the last execution; 0 means never.
    last_execution: AtomicI64,
}

impl CapabilityStats {
    fn record(&self, succeeded: bool) {
        self.execution_count.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        self.last_execution
            .store(Timestamp::now().as_unix_millis(), Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        let last = self.last_execution.load(Ordering::Relaxed);
        StatsSnapshot {
            execution_count: self.execution_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            last_execution: if last == 0 {
                None
            } else {
                Timestamp::from_unix_millis(last)
            },
        }
    }
}

/// Point-in-time copy of a capability's execution statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub execution_count: u64,
    pub failure_count: u64,
    pub last_execution: Option<Timestamp>,
}

/// Public view of a capability, as shown to planners and discovery clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSchema>,
    pub examples: Vec<String>,
    pub stats: StatsSnapshot,
}

/// Public capabilities of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub agent: String,
    pub description: String,
    pub capabilities: Vec<CapabilityInfo>,
}

#[derive(Debug)]
struct RegisteredCapability {
    agent: String,
    capability: Capability,
    stats: Arc<CapabilityStats>,
}

/// Registry of agent capabilities, keyed by globally unique name.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, RegisteredCapability>,
    /// Agent name -> capability names in registration order
    agent_capabilities: BTreeMap<String, Vec<String>>,
    agent_descriptions: HashMap<String, String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a single capability under an agent.
    pub fn register(
        &mut self,
        agent: impl Into<String>,
        capability: Capability,
    ) -> Result<(), CapabilityError> {
        let agent = agent.into();
        if self.capabilities.contains_key(capability.name()) {
            return Err(CapabilityError::DuplicateName(capability.name().to_string()));
        }

        let name = capability.name().to_string();
        tracing::debug!(agent = %agent, capability = %name, "Registering capability");

        self.agent_descriptions.entry(agent.clone()).or_default();
        self.agent_capabilities
            .entry(agent.clone())
            .or_default()
            .push(name.clone());
        self.capabilities.insert(
            name,
            RegisteredCapability {
                agent,
                capability,
                stats: Arc::new(CapabilityStats::default()),
            },
        );
        Ok(())
    }

    /// Registers every capability of a group, or none of them.
    pub fn register_group(&mut self, group: AgentGroup) -> Result<(), CapabilityError> {
        let mut seen: Vec<&str> = Vec::with_capacity(group.capabilities.len());
        for capability in &group.capabilities {
            let name = capability.name();
            if self.capabilities.contains_key(name) || seen.contains(&name) {
                return Err(CapabilityError::DuplicateName(name.to_string()));
            }
            seen.push(name);
        }

        let AgentGroup {
            name,
            description,
            capabilities,
        } = group;

        for capability in capabilities {
            self.register(name.clone(), capability)?;
        }
        self.agent_capabilities.entry(name.clone()).or_default();
        self.agent_descriptions.insert(name, description);
        Ok(())
    }

    /// Looks up a capability by name, including internal ones.
    pub fn get_by_name(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name).map(|r| &r.capability)
    }

    /// Name of the agent that owns a capability.
    pub fn agent_of(&self, name: &str) -> Option<&str> {
        self.capabilities.get(name).map(|r| r.agent.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Total registered capabilities, internal included.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Public capabilities grouped by agent, agents sorted by name and
    /// capabilities in registration order. Agents with nothing public are omitted.
    pub fn list_public(&self) -> Vec<AgentCapabilities> {
        self.agent_capabilities
            .iter()
            .filter_map(|(agent, names)| {
                let capabilities: Vec<CapabilityInfo> = names
                    .iter()
                    .filter_map(|name| self.capabilities.get(name))
                    .filter(|r| !r.capability.is_internal())
                    .map(|r| CapabilityInfo {
                        name: r.capability.name().to_string(),
                        description: r.capability.description().to_string(),
                        parameters: r.capability.parameters().to_vec(),
                        examples: r.capability.examples().to_vec(),
                        stats: r.stats.snapshot(),
                    })
                    .collect();

                if capabilities.is_empty() {
                    None
                } else {
                    Some(AgentCapabilities {
                        agent: agent.clone(),
                        description: self
                            .agent_descriptions
                            .get(agent)
                            .cloned()
                            .unwrap_or_default(),
                        capabilities,
                    })
                }
            })
            .collect()
    }

    /// Number of capabilities visible through discovery.
    pub fn public_count(&self) -> usize {
        self.capabilities
            .values()
            .filter(|r| !r.capability.is_internal())
            .count()
    }

    /// Execution statistics for a capability.
    pub fn stats(&self, name: &str) -> Option<StatsSnapshot> {
        self.capabilities.get(name).map(|r| r.stats.snapshot())
    }

    /// Counts a failed execution that never reached [`Self::execute`]'s bookkeeping,
    /// such as a handler panic.
    pub fn record_failure(&self, name: &str) {
        if let Some(r) = self.capabilities.get(name) {
            r.stats.record(false);
        }
    }

    /// Validates arguments (filling defaults) and runs the handler.
    pub async fn execute(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<Value, CapabilityError> {
        self.execute_with_timeout(name, args, None).await
    }

    /// Like [`Self::execute`], failing with `TimedOut` if the handler runs past `timeout`.
    pub async fn execute_with_timeout(
        &self,
        name: &str,
        mut args: Map<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, CapabilityError> {
        let registered = self
            .capabilities
            .get(name)
            .ok_or_else(|| CapabilityError::NotFound(name.to_string()))?;

        validate_arguments(registered.capability.parameters(), &mut args).map_err(|source| {
            CapabilityError::InvalidParameters {
                capability: name.to_string(),
                source,
            }
        })?;

        let handler = registered.capability.handler().clone();
        let call = handler.handle(CapabilityArgs::new(args));

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result.map_err(|e| CapabilityError::Execution {
                    capability: name.to_string(),
                    message: e.message().to_string(),
                }),
                Err(_) => Err(CapabilityError::TimedOut {
                    capability: name.to_string(),
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => call.await.map_err(|e| CapabilityError::Execution {
                capability: name.to_string(),
                message: e.message().to_string(),
            }),
        };

        registered.stats.record(outcome.is_ok());
        if let Err(e) = &outcome {
            tracing::warn!(capability = %name, error = %e, "Capability execution failed");
        }
        outcome
    }
}
