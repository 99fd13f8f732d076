//! Command-line host for the orchestrator workflow client.
//!
//! Owns everything around the client: layered configuration, environment
//! variable expansion, pre-flight checks and rendering of the result map.

pub mod checks;
pub mod commands;
pub mod config;
pub mod interpolate;
pub mod report;
