//! Workflow error types.

use thiserror::Error;

use crate::domain::foundation::ValidationError;

/// Failure resolving a `${...}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterpolationError {
    #[error("Unresolved placeholder: ${{{0}}}")]
    Unresolved(String),
}

/// Errors that end or reject a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Step {step} has unmet dependency: {dependency}")]
    DependencyUnmet { step: String, dependency: String },

    #[error("Step {step} failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("Step {step} parameters could not be resolved: {source}")]
    Interpolation {
        step: String,
        #[source]
        source: InterpolationError,
    },

    #[error("Invalid workflow transition: {0}")]
    InvalidTransition(#[from] ValidationError),

    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),
}

impl WorkflowError {
    /// Id of the step that ended the workflow, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            WorkflowError::DependencyUnmet { step, .. }
            | WorkflowError::StepFailed { step, .. }
            | WorkflowError::Interpolation { step, .. } => Some(step),
            WorkflowError::InvalidTransition(_) | WorkflowError::InvalidDefinition(_) => None,
        }
    }
}
