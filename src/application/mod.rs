//! Application layer - the orchestration pipeline.
//!
//! This layer coordinates domain operations and ports. It owns no I/O of its
//! own: language models, session storage and caching arrive as port objects.

pub mod orchestration;

pub use orchestration::{
    DecisionOutcome, DecisionStage, ExecutionStage, HealthReport, InvocationContext, Orchestrator,
    PauseHandle, ProcessedMessage, SessionHistory, SessionManager, SynthesisOutcome,
    SynthesisStage, WorkflowEngine,
};
