//! Domain layer containing orchestration types and pure logic.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, validation errors, state machines)
//! - `capability` - Capabilities, parameter schemas and the capability registry
//! - `flow` - Planner decisions, agent responses and the per-message flow record
//! - `workflow` - Dependency-ordered step chains and placeholder interpolation
//! - `session` - Per-user conversational memory and context compression

pub mod capability;
pub mod flow;
pub mod foundation;
pub mod session;
pub mod workflow;
