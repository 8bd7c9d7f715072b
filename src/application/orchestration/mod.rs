//! Orchestration pipeline.
//!
//! - [`DecisionStage`] - plans capabilities for a message
//! - [`ExecutionStage`] - runs planned capabilities concurrently
//! - [`SynthesisStage`] - writes the user-facing answer
//! - [`WorkflowEngine`] - runs explicit multi-step chains
//! - [`SessionManager`] - session loading, locking, compression and sweeping
//! - [`Orchestrator`] - ties the stages together per message

mod decision_stage;
mod execution_stage;
mod orchestrator;
mod prompts;
mod session_manager;
mod synthesis_stage;
mod workflow_engine;

pub use decision_stage::{DecisionOutcome, DecisionStage};
pub use execution_stage::{ExecutionStage, Invocation, InvocationContext, INJECTED_CONTEXT_MESSAGES};
pub use orchestrator::{
    HealthReport, Orchestrator, ProcessedMessage, SessionHistory, NOTHING_TO_RESUME_RESPONSE,
    UNIDENTIFIED_USER_RESPONSE,
};
pub use session_manager::{SessionManager, SweepReport};
pub use synthesis_stage::{
    sanitize_response, SynthesisOutcome, SynthesisStage, APOLOGY_RESPONSE, GRACEFUL_FALLBACK,
};
pub use workflow_engine::{PauseHandle, WorkflowEngine};
