//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, validation errors and the state machine
//! trait shared by flows, workflows and sessions.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{FlowId, MessageId, SessionId, UserId, WorkflowId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
