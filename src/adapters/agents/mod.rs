//! Built-in agent groups registered at boot.

mod general;

pub use general::{general_agent, GeneralQueryHandler, GENERAL_AGENT, GENERAL_QUERY};
