//! Core types shared by the orchestrator-runner crates.
//!
//! This crate provides the `Result` alias used across the workspace and the
//! strongly-typed identifiers handed out by a remote orchestrator server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ExecutionHandle, ParseIdError, WorkflowId};
