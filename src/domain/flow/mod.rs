//! Flow module - decisions, responses and the per-message audit record.

mod decision;
#[allow(clippy::module_inception)]
mod flow;
mod response;

pub use decision::{AgentDecision, DecisionPlan, PlannedStep, PlannedWorkflow};
pub use flow::{
    DecisionStageRecord, ExecutionStageRecord, FlowStatus, OrchestrationFlow, StageStatus,
    SynthesisStageRecord,
};
pub use response::{ActionRecord, AgentResponse};
