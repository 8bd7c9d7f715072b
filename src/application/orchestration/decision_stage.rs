//! Decision stage - turns a user message into a validated plan.
//!
//! The planner's output is untrusted: decisions naming unknown or internal
//! capabilities, or carrying arguments that fail the declared schema, are
//! dropped. When planning fails outright or nothing valid remains, a single
//! deterministic fallback decision routes the message to the general query
//! capability so the flow can still produce an answer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::capability::{
    validate_arguments, validate_arguments_with, CapabilityRegistry,
};
use crate::domain::flow::{AgentDecision, DecisionPlan, PlannedWorkflow};
use crate::domain::session::Session;
use crate::domain::workflow::{contains_placeholder, Workflow};
use crate::ports::{generate_typed, ChatMessage, GenerationOptions, LlmAdapter};

use super::prompts::{decision_schema, decision_system_prompt, PLANNER_CONTEXT_MESSAGES};

/// Agent recorded on the fallback decision when the general capability is unregistered.
const DEFAULT_GENERAL_AGENT: &str = "general";

/// Validated result of planning.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    /// Decisions to execute in parallel.
    pub decisions: Vec<AgentDecision>,
    /// Explicit multi-step chain, executed instead of `decisions`.
    pub workflow: Option<Workflow>,
    pub reasoning: String,
    pub fallback_used: bool,
}

impl DecisionOutcome {
    fn fallback(decision: AgentDecision, cause: &str) -> Self {
        Self {
            decisions: vec![decision],
            workflow: None,
            reasoning: format!("fallback: {}", cause),
            fallback_used: true,
        }
    }
}

pub struct DecisionStage {
    registry: Arc<CapabilityRegistry>,
    llm: Arc<dyn LlmAdapter>,
    options: GenerationOptions,
    timeout: Duration,
    history_flows: usize,
    general_query: String,
}

impl DecisionStage {
    pub fn new(registry: Arc<CapabilityRegistry>, llm: Arc<dyn LlmAdapter>) -> Self {
        Self {
            registry,
            llm,
            options: GenerationOptions::new().with_temperature(0.2).with_max_tokens(1000),
            timeout: Duration::from_secs(30),
            history_flows: 3,
            general_query: "general_query".to_string(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_history_flows(mut self, n: usize) -> Self {
        self.history_flows = n;
        self
    }

    pub fn with_general_query(mut self, capability: impl Into<String>) -> Self {
        self.general_query = capability.into();
        self
    }

    /// Plans the capabilities to run for `text`. Never fails.
    pub async fn decide(&self, text: &str, session: &Session) -> DecisionOutcome {
        let catalog = self.registry.list_public();
        let system = decision_system_prompt(
            &catalog,
            session.recent_flows(self.history_flows),
            session.context().recent(PLANNER_CONTEXT_MESSAGES),
        );
        let conversation = vec![ChatMessage::system(system), ChatMessage::user(text)];
        let schema = decision_schema();

        let planned = tokio::time::timeout(
            self.timeout,
            generate_typed::<DecisionPlan>(self.llm.as_ref(), &conversation, &schema, &self.options),
        )
        .await;

        let plan = match planned {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                warn!(error = %e, "Planner call failed, using fallback decision");
                return DecisionOutcome::fallback(
                    self.fallback_decision(text),
                    &format!("planner failed: {}", e),
                );
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Planner call timed out, using fallback decision"
                );
                return DecisionOutcome::fallback(
                    self.fallback_decision(text),
                    &format!("planner timed out after {}ms", self.timeout.as_millis()),
                );
            }
        };

        self.validate_plan(plan, text)
    }

    fn validate_plan(&self, plan: DecisionPlan, text: &str) -> DecisionOutcome {
        let workflow = plan
            .workflow
            .and_then(|planned| self.validate_workflow(planned));

        let decisions: Vec<AgentDecision> = plan
            .decisions
            .into_iter()
            .filter_map(|d| self.validate_decision(d, text))
            .collect();

        if workflow.is_none() && decisions.is_empty() {
            return DecisionOutcome::fallback(
                self.fallback_decision(text),
                "planner produced no valid decisions",
            );
        }

        debug!(
            decisions = decisions.len(),
            workflow = workflow.is_some(),
            "Planner output validated"
        );
        DecisionOutcome {
            decisions,
            workflow,
            reasoning: plan.reasoning,
            fallback_used: false,
        }
    }

    fn validate_decision(&self, mut decision: AgentDecision, text: &str) -> Option<AgentDecision> {
        let capability = match self.registry.get_by_name(&decision.capability) {
            Some(c) if !c.is_internal() => c,
            _ => {
                warn!(
                    capability = %decision.capability,
                    "Dropping decision for unknown or internal capability"
                );
                return None;
            }
        };

        if let Err(e) = validate_arguments(capability.parameters(), &mut decision.parameters) {
            warn!(
                capability = %decision.capability,
                error = %e,
                "Dropping decision with invalid parameters"
            );
            return None;
        }

        if let Some(agent) = self.registry.agent_of(&decision.capability) {
            decision.agent = agent.to_string();
        }
        if decision.prompt.is_empty() {
            decision.prompt = text.to_string();
        }
        Some(decision)
    }

    fn validate_workflow(&self, planned: PlannedWorkflow) -> Option<Workflow> {
        for step in &planned.steps {
            let capability = match self.registry.get_by_name(&step.capability) {
                Some(c) if !c.is_internal() => c,
                _ => {
                    warn!(
                        step = %step.id,
                        capability = %step.capability,
                        "Dropping workflow with unknown or internal capability"
                    );
                    return None;
                }
            };
            let mut args = step.parameters.clone();
            if let Err(e) =
                validate_arguments_with(capability.parameters(), &mut args, contains_placeholder)
            {
                warn!(step = %step.id, error = %e, "Dropping workflow with invalid parameters");
                return None;
            }
        }

        match planned.into_workflow() {
            Ok(workflow) => Some(workflow),
            Err(e) => {
                warn!(error = %e, "Dropping malformed workflow");
                None
            }
        }
    }

    fn fallback_decision(&self, text: &str) -> AgentDecision {
        let agent = self
            .registry
            .agent_of(&self.general_query)
            .unwrap_or(DEFAULT_GENERAL_AGENT);
        let mut parameters = Map::new();
        parameters.insert("query".to_string(), Value::String(text.to_string()));
        AgentDecision::new(agent, self.general_query.clone(), parameters).with_prompt(text)
    }
}
