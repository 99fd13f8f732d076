//! Host-side rendering of execution results.

use orchestrator_runner_client::{ClientError, ExecutionResult};
use rootcause::Report;
use std::collections::BTreeMap;

/// The execution finished or was submitted without waiting.
pub const EXIT_SUCCESS: u8 = 0;
/// The runner could not complete a request or the configuration is invalid.
pub const EXIT_ERROR: u8 = 1;
/// The execution ended canceled or failed.
pub const EXIT_EXECUTION_FAILED: u8 = 2;
/// The configuration is incomplete, or names a workflow the server lacks.
pub const EXIT_CONFIGURATION: u8 = 3;

/// Renders each map entry as a `KEY : value` line.
#[must_use]
pub fn render(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(key, value)| format!("{key} : {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Returns the process exit code for a finished or submitted execution.
#[must_use]
pub fn exit_code(result: &ExecutionResult) -> u8 {
    if result.is_failure() {
        EXIT_EXECUTION_FAILED
    } else {
        EXIT_SUCCESS
    }
}

/// Returns the process exit code for a client error.
#[must_use]
pub fn error_exit_code(error: &ClientError) -> u8 {
    if error.is_configuration_error() {
        EXIT_CONFIGURATION
    } else {
        EXIT_ERROR
    }
}

/// Renders a client error with everything attached to it.
#[must_use]
pub fn describe_error(err: &Report<ClientError>) -> String {
    err.to_string()
}
