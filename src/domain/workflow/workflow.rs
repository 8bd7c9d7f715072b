//! Workflow aggregate - an explicit, caller-ordered chain of capability calls.
//!
//! Steps run strictly in the order given; the engine never reorders them.
//! A step may only start once every id in its `dependencies` is present in
//! the workflow's results.
//!
//! # State machine
//!
//! ```text
//! Active ──► Completed
//!   │  ▲
//!   │  └── resume ──┐
//!   ├── pause ──► Paused
//!   └──► Failed
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::flow::AgentResponse;
use crate::domain::foundation::{StateMachine, Timestamp, WorkflowId};

use super::errors::WorkflowError;

/// Lifecycle of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Active,
    Paused,
    Completed,
    Failed,
}

impl StateMachine for WorkflowStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        use WorkflowStatus::*;
        match self {
            Active => vec![Paused, Completed, Failed],
            Paused => vec![Active],
            Completed | Failed => vec![],
        }
    }
}

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl StateMachine for StepStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        use StepStatus::*;
        match self {
            Pending => vec![Running, Failed],
            Running => vec![Completed, Failed],
            Completed | Failed => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StepResult {
    step_id: String,
    value: Value,
}

/// Outputs of completed steps, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowResults {
    entries: Vec<StepResult>,
}

impl WorkflowResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a step's output, replacing any earlier output for the same id.
    pub fn insert(&mut self, step_id: impl Into<String>, value: Value) {
        let step_id = step_id.into();
        self.entries.retain(|e| e.step_id != step_id);
        self.entries.push(StepResult { step_id, value });
    }

    /// Output of the step with this id.
    pub fn get(&self, step_id: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|e| e.step_id == step_id)
            .map(|e| &e.value)
    }

    /// Resolves a key as a step id, or else as a top-level field of a
    /// completed step's object output (most recent step first).
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.get(key).or_else(|| {
            self.entries
                .iter()
                .rev()
                .find_map(|e| e.value.as_object().and_then(|obj| obj.get(key)))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|e| (e.step_id.as_str(), &e.value))
    }

    /// Step id → output as a JSON object.
    pub fn to_map(&self) -> Map<String, Value> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// One capability invocation inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    id: String,
    name: String,
    #[serde(default)]
    agent: String,
    capability: String,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_parameters: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    execution_time_ms: Option<u64>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, capability: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            agent: String::new(),
            capability: capability.into(),
            parameters: Map::new(),
            dependencies: Vec::new(),
            status: StepStatus::Pending,
            resolved_parameters: None,
            result: None,
            error: None,
            execution_time_ms: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// Parameters as declared, placeholders unresolved.
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Parameters after placeholder resolution, once the step has started.
    pub fn resolved_parameters(&self) -> Option<&Map<String, Value>> {
        self.resolved_parameters.as_ref()
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn set_agent(&mut self, agent: impl Into<String>) {
        self.agent = agent.into();
    }

    /// Converts a step that ran into an execution outcome.
    pub fn to_response(&self) -> Option<AgentResponse> {
        let elapsed = self.execution_time_ms.unwrap_or(0);
        match self.status {
            StepStatus::Completed => Some(AgentResponse::succeeded(
                &self.agent,
                &self.capability,
                self.result.clone().unwrap_or(Value::Null),
                elapsed,
            )),
            StepStatus::Failed => Some(AgentResponse::failed(
                &self.agent,
                &self.capability,
                self.error.clone().unwrap_or_default(),
                elapsed,
            )),
            StepStatus::Pending | StepStatus::Running => None,
        }
    }
}

/// A dependency-ordered chain of steps with shared results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,
    name: String,
    status: WorkflowStatus,
    steps: Vec<WorkflowStep>,
    current_step_index: usize,
    results: WorkflowResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<Timestamp>,
}

impl Workflow {
    /// Creates an active workflow.
    ///
    /// # Errors
    ///
    /// - `InvalidDefinition` if there are no steps or step ids repeat
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Result<Self, WorkflowError> {
        if steps.is_empty() {
            return Err(WorkflowError::InvalidDefinition(
                "workflow has no steps".to_string(),
            ));
        }
        for (i, step) in steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "step {} has an empty id",
                    i
                )));
            }
            if steps[..i].iter().any(|s| s.id == step.id) {
                return Err(WorkflowError::InvalidDefinition(format!(
                    "duplicate step id: {}",
                    step.id
                )));
            }
        }

        Ok(Self {
            id: WorkflowId::new(),
            name: name.into(),
            status: WorkflowStatus::Active,
            steps,
            current_step_index: 0,
            results: WorkflowResults::new(),
            error: None,
            created_at: Timestamp::now(),
            completed_at: None,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn current_step(&self) -> Option<&WorkflowStep> {
        self.steps.get(self.current_step_index)
    }

    pub fn results(&self) -> &WorkflowResults {
        &self.results
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn completed_at(&self) -> Option<&Timestamp> {
        self.completed_at.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }

    /// Outcomes of every step that has run, in step order.
    pub fn responses(&self) -> Vec<AgentResponse> {
        self.steps.iter().filter_map(|s| s.to_response()).collect()
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [WorkflowStep] {
        &mut self.steps
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// First dependency of the current step that has no result yet.
    pub fn unmet_dependency(&self) -> Option<&str> {
        let step = self.current_step()?;
        step.dependencies
            .iter()
            .find(|d| !self.results.contains(d))
            .map(String::as_str)
    }

    /// Marks the current step running with its resolved parameters.
    pub fn begin_current_step(
        &mut self,
        resolved: Map<String, Value>,
    ) -> Result<&WorkflowStep, WorkflowError> {
        self.ensure_active()?;
        let index = self.current_step_index;
        let step = self.steps.get_mut(index).ok_or_else(|| {
            WorkflowError::InvalidDefinition(format!("no step at index {}", index))
        })?;
        step.status = step.status.transition_to(StepStatus::Running)?;
        step.resolved_parameters = Some(resolved);
        Ok(step)
    }

    /// Stores the running step's output and advances to the next step.
    pub fn complete_current_step(
        &mut self,
        value: Value,
        execution_time_ms: u64,
    ) -> Result<(), WorkflowError> {
        self.ensure_active()?;
        let index = self.current_step_index;
        let step = self.steps.get_mut(index).ok_or_else(|| {
            WorkflowError::InvalidDefinition(format!("no step at index {}", index))
        })?;
        step.status = step.status.transition_to(StepStatus::Completed)?;
        step.result = Some(value.clone());
        step.execution_time_ms = Some(execution_time_ms);
        let step_id = step.id.clone();

        self.results.insert(step_id, value);
        self.current_step_index += 1;
        Ok(())
    }

    /// Fails the current step and the whole workflow. Earlier results are kept.
    pub fn fail_current_step(
        &mut self,
        cause: &WorkflowError,
        execution_time_ms: Option<u64>,
    ) -> Result<(), WorkflowError> {
        self.ensure_active()?;
        let index = self.current_step_index;
        if let Some(step) = self.steps.get_mut(index) {
            step.status = step.status.transition_to(StepStatus::Failed)?;
            step.error = Some(match cause {
                WorkflowError::StepFailed { message, .. } => message.clone(),
                other => other.to_string(),
            });
            step.execution_time_ms = execution_time_ms;
        }
        self.status = self.status.transition_to(WorkflowStatus::Failed)?;
        self.error = Some(cause.to_string());
        self.completed_at = Some(Timestamp::now());
        Ok(())
    }

    /// Marks the workflow completed once every step has run.
    pub fn complete(&mut self) -> Result<(), WorkflowError> {
        if self.current_step_index < self.steps.len() {
            return Err(WorkflowError::InvalidDefinition(format!(
                "{} steps remain",
                self.steps.len() - self.current_step_index
            )));
        }
        self.status = self.status.transition_to(WorkflowStatus::Completed)?;
        self.completed_at = Some(Timestamp::now());
        Ok(())
    }

    /// Pauses between steps, keeping `current_step_index`.
    pub fn pause(&mut self) -> Result<(), WorkflowError> {
        self.status = self.status.transition_to(WorkflowStatus::Paused)?;
        Ok(())
    }

    /// Reactivates a paused workflow at the step where it stopped.
    pub fn resume(&mut self) -> Result<(), WorkflowError> {
        self.status = self.status.transition_to(WorkflowStatus::Active)?;
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), WorkflowError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition(
                crate::domain::foundation::ValidationError::invalid_format(
                    "workflow",
                    format!("Workflow {} is {:?}", self.id, self.status),
                ),
            ))
        }
    }
}
