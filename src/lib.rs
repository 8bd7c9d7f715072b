//! Maestro - Multi-Agent Orchestration Engine
//!
//! Routes each user message through a Decision, Execution and Synthesis
//! pipeline over a registry of named capabilities, keeping per-user session
//! memory between messages.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
