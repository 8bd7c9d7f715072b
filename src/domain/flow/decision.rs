//! Planner decisions - what the decision stage asks the execution stage to run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::workflow::{Workflow, WorkflowError, WorkflowStep};

fn default_priority() -> u32 {
    1
}

/// A planner-produced instruction naming a capability and its arguments.
///
/// Decisions are untrusted until the decision stage has checked the
/// capability exists and the parameters satisfy its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    /// Rewritten to the registry's owning agent during validation.
    #[serde(default)]
    pub agent: String,
    pub capability: String,
    /// Text the decision was derived from.
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Recorded for audit; execution order follows the plan, not priority.
    #[serde(default = "default_priority")]
    pub priority: u32,
}

impl AgentDecision {
    pub fn new(
        agent: impl Into<String>,
        capability: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            agent: agent.into(),
            capability: capability.into(),
            prompt: String::new(),
            parameters,
            priority: default_priority(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

/// Structured planner output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionPlan {
    #[serde(default)]
    pub decisions: Vec<AgentDecision>,
    #[serde(default)]
    pub reasoning: String,
    /// Explicit multi-step chain, when the request needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<PlannedWorkflow>,
}

impl DecisionPlan {
    pub fn new(decisions: Vec<AgentDecision>, reasoning: impl Into<String>) -> Self {
        Self {
            decisions,
            reasoning: reasoning.into(),
            workflow: None,
        }
    }

    pub fn with_workflow(mut self, workflow: PlannedWorkflow) -> Self {
        self.workflow = Some(workflow);
        self
    }
}

/// A workflow as proposed by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedWorkflow {
    #[serde(default)]
    pub name: String,
    pub steps: Vec<PlannedStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub capability: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PlannedWorkflow {
    /// Builds an executable workflow, keeping the planner's step order.
    pub fn into_workflow(self) -> Result<Workflow, WorkflowError> {
        let name = if self.name.trim().is_empty() {
            "planned workflow".to_string()
        } else {
            self.name
        };
        let steps = self
            .steps
            .into_iter()
            .map(|planned| {
                let mut step = WorkflowStep::new(planned.id, planned.capability)
                    .with_parameters(planned.parameters);
                if !planned.name.is_empty() {
                    step = step.with_name(planned.name);
                }
                planned
                    .dependencies
                    .into_iter()
                    .fold(step, WorkflowStep::depends_on)
            })
            .collect();
        Workflow::new(name, steps)
    }
}
