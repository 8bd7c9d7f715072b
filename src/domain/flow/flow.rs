//! Orchestration flow - the audit record of one Decision→Execution→Synthesis run.
//!
//! # Invariants
//!
//! - Stage statuses only move `Pending → Completed | Failed`
//! - `overall_status` is `Completed` iff all three stages completed
//! - Once finished, a flow rejects every further mutation

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{FlowId, StateMachine, Timestamp, ValidationError, WorkflowId};

use super::{AgentDecision, AgentResponse};

/// Status of a single pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl StateMachine for StageStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            StageStatus::Pending => vec![StageStatus::Completed, StageStatus::Failed],
            StageStatus::Completed | StageStatus::Failed => vec![],
        }
    }
}

/// Overall status of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl StateMachine for FlowStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            FlowStatus::Running => vec![FlowStatus::Completed, FlowStatus::Failed],
            FlowStatus::Completed | FlowStatus::Failed => vec![],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionStageRecord {
    pub status: StageStatus,
    pub decisions: Vec<AgentDecision>,
    pub reasoning: String,
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStageRecord {
    pub status: StageStatus,
    pub responses: Vec<AgentResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisStageRecord {
    pub status: StageStatus,
    pub response: Option<String>,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One message's complete trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationFlow {
    id: FlowId,
    original_input: String,
    timestamp: Timestamp,
    decision_stage: DecisionStageRecord,
    execution_stage: ExecutionStageRecord,
    synthesis_stage: SynthesisStageRecord,
    overall_status: FlowStatus,
    completed_at: Option<Timestamp>,
}

impl OrchestrationFlow {
    pub fn new(original_input: impl Into<String>) -> Self {
        Self {
            id: FlowId::new(),
            original_input: original_input.into(),
            timestamp: Timestamp::now(),
            decision_stage: DecisionStageRecord::default(),
            execution_stage: ExecutionStageRecord::default(),
            synthesis_stage: SynthesisStageRecord::default(),
            overall_status: FlowStatus::Running,
            completed_at: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &FlowId {
        &self.id
    }

    pub fn original_input(&self) -> &str {
        &self.original_input
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    pub fn decision_stage(&self) -> &DecisionStageRecord {
        &self.decision_stage
    }

    pub fn execution_stage(&self) -> &ExecutionStageRecord {
        &self.execution_stage
    }

    pub fn synthesis_stage(&self) -> &SynthesisStageRecord {
        &self.synthesis_stage
    }

    pub fn overall_status(&self) -> FlowStatus {
        self.overall_status
    }

    pub fn completed_at(&self) -> Option<&Timestamp> {
        self.completed_at.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.overall_status.is_terminal()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Records the decision list the execution stage will run.
    pub fn complete_decision(
        &mut self,
        decisions: Vec<AgentDecision>,
        reasoning: impl Into<String>,
        fallback_used: bool,
    ) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.decision_stage.status = self
            .decision_stage
            .status
            .transition_to(StageStatus::Completed)?;
        self.decision_stage.decisions = decisions;
        self.decision_stage.reasoning = reasoning.into();
        self.decision_stage.fallback_used = fallback_used;
        Ok(())
    }

    pub fn fail_decision(&mut self, error: impl Into<String>) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.decision_stage.status = self
            .decision_stage
            .status
            .transition_to(StageStatus::Failed)?;
        self.decision_stage.error = Some(error.into());
        Ok(())
    }

    /// Links the workflow that replaced plain parallel execution.
    pub fn attach_workflow(&mut self, workflow_id: WorkflowId) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.decision_stage.workflow_id = Some(workflow_id);
        Ok(())
    }

    /// Records execution results. The stage fails only when there was work
    /// to do and none of it succeeded.
    pub fn complete_execution(
        &mut self,
        responses: Vec<AgentResponse>,
    ) -> Result<(), ValidationError> {
        let all_failed = !responses.is_empty() && responses.iter().all(|r| !r.success);
        if all_failed {
            self.fail_execution(responses, "All capability invocations failed")
        } else {
            self.ensure_open()?;
            self.execution_stage.status = self
                .execution_stage
                .status
                .transition_to(StageStatus::Completed)?;
            self.execution_stage.responses = responses;
            Ok(())
        }
    }

    pub fn fail_execution(
        &mut self,
        responses: Vec<AgentResponse>,
        error: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.execution_stage.status = self
            .execution_stage
            .status
            .transition_to(StageStatus::Failed)?;
        self.execution_stage.responses = responses;
        self.execution_stage.error = Some(error.into());
        Ok(())
    }

    pub fn complete_synthesis(
        &mut self,
        response: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.synthesis_stage.status = self
            .synthesis_stage
            .status
            .transition_to(StageStatus::Completed)?;
        self.synthesis_stage.response = Some(response.into());
        self.synthesis_stage.reasoning = reasoning.into();
        Ok(())
    }

    /// Records a failed synthesis along with the text actually sent to the user.
    pub fn fail_synthesis(
        &mut self,
        delivered: impl Into<String>,
        error: impl Into<String>,
    ) -> Result<(), ValidationError> {
        self.ensure_open()?;
        self.synthesis_stage.status = self
            .synthesis_stage
            .status
            .transition_to(StageStatus::Failed)?;
        self.synthesis_stage.response = Some(delivered.into());
        self.synthesis_stage.error = Some(error.into());
        Ok(())
    }

    /// Seals the flow. Stages still pending are marked failed.
    pub fn finish(&mut self) -> Result<FlowStatus, ValidationError> {
        self.ensure_open()?;

        for status in [
            &mut self.decision_stage.status,
            &mut self.execution_stage.status,
            &mut self.synthesis_stage.status,
        ] {
            if *status == StageStatus::Pending {
                *status = StageStatus::Failed;
            }
        }

        let all_completed = [
            self.decision_stage.status,
            self.execution_stage.status,
            self.synthesis_stage.status,
        ]
        .iter()
        .all(|s| *s == StageStatus::Completed);

        let target = if all_completed {
            FlowStatus::Completed
        } else {
            FlowStatus::Failed
        };
        self.overall_status = self.overall_status.transition_to(target)?;
        self.completed_at = Some(Timestamp::now());
        Ok(self.overall_status)
    }

    /// One-line recap used as planner continuity context.
    pub fn summary(&self) -> String {
        let actions: Vec<String> = self
            .execution_stage
            .responses
            .iter()
            .map(|r| {
                format!(
                    "{}:{}",
                    r.capability,
                    if r.success { "ok" } else { "failed" }
                )
            })
            .collect();
        let reply = self.synthesis_stage.response.as_deref().unwrap_or("");

        format!(
            "user: {} | actions: [{}] | reply: {}",
            self.original_input,
            actions.join(", "),
            truncate(reply, 160)
        )
    }

    fn ensure_open(&self) -> Result<(), ValidationError> {
        if self.is_finished() {
            Err(ValidationError::invalid_format(
                "flow",
                format!("Flow {} is already finished", self.id),
            ))
        } else {
            Ok(())
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
