//! Capability module - what agents can do and how to call it.
//!
//! - [`Capability`] - named action with parameter schemas and an async handler
//! - [`CapabilityRegistry`] - catalog keyed by unique capability name
//! - [`ParameterSchema`] - declared argument shape used for validation

mod definition;
mod errors;
mod parameter;
mod registry;

pub use definition::{
    handler_fn, Capability, CapabilityArgs, CapabilityHandler, FnHandler, HandlerError,
    INJECTED_CONTEXT, INJECTED_USER_ID,
};
pub use errors::CapabilityError;
pub use parameter::{
    parameters_json_schema, validate_arguments, validate_arguments_with, ParameterError,
    ParameterSchema, ParameterType,
};
pub use registry::{
    AgentCapabilities, AgentGroup, CapabilityInfo, CapabilityRegistry, StatsSnapshot,
};
