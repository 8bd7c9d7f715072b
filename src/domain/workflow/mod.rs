//! Workflow module - explicit multi-step capability chains.
//!
//! - [`Workflow`] / [`WorkflowStep`] - the aggregate and its steps
//! - [`WorkflowResults`] - outputs of completed steps
//! - [`resolve_parameters`] - pure `${stepId}` / `${stepId.field}` substitution

mod errors;
mod interpolation;
#[allow(clippy::module_inception)]
mod workflow;

pub use errors::{InterpolationError, WorkflowError};
pub use interpolation::{
    contains_placeholder, placeholder_paths, resolve_parameters, resolve_path, resolve_value,
};
pub use workflow::{StepStatus, Workflow, WorkflowResults, WorkflowStatus, WorkflowStep};
