//! Orchestration HTTP adapter - REST API over the orchestrator.
//!
//! Provides endpoints for:
//! - Processing user messages
//! - Capability discovery
//! - Health reporting
//! - Pausing and resuming workflows
//! - Reading and clearing session history

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::OrchestrationAppState;
pub use routes::{orchestration_router, orchestration_routes};
