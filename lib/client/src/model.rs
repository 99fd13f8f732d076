//! Workflow, execution state and result types.

use crate::codec::InputParameter;
use orchestrator_runner_core::ExecutionHandle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Output map key holding the final execution state.
pub const EXECUTION_STATE_KEY: &str = "ORCHESTRATOR_WORKFLOW_EXECUTION_STATE";
/// Output map key holding the serialized output parameters.
pub const EXECUTION_OUTPUT_KEY: &str = "ORCHESTRATOR_WORKFLOW_EXECUTION_OUTPUT";
/// Output map key holding the failure detail of canceled or failed runs.
pub const EXECUTION_EXCEPTION_KEY: &str = "ORCHESTRATOR_WORKFLOW_EXECUTION_EXCEPTION";

/// A workflow as listed by the server.
///
/// Names are not unique on the server; resolution takes the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    pub name: String,
    /// Empty when the server listed no `id` attribute.
    pub id: String,
}

/// The lifecycle phase of a remote execution.
///
/// `Submitted` -> `Running` -> one of `Completed`, `Canceled`, `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Accepted by the server, no state reported yet.
    Submitted,
    /// Any non-terminal server state.
    Running,
    Completed,
    Canceled,
    Failed,
}

impl ExecutionState {
    /// Classifies a raw server state string, ignoring case.
    #[must_use]
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Submitted;
        };
        if raw.eq_ignore_ascii_case("completed") {
            Self::Completed
        } else if raw.eq_ignore_ascii_case("canceled") {
            Self::Canceled
        } else if raw.eq_ignore_ascii_case("failed") {
            Self::Failed
        } else {
            Self::Running
        }
    }

    /// Returns true if the execution will not change state again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }

    /// Returns true for terminal states that carry failure detail.
    #[must_use]
    pub fn has_failure_detail(&self) -> bool {
        matches!(self, Self::Canceled | Self::Failed)
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One observation of a remote execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStatus {
    raw_state: Option<String>,
    phase: ExecutionState,
}

impl ExecutionStatus {
    /// Creates a status from the raw state reported by the server.
    #[must_use]
    pub fn from_raw(raw_state: Option<String>) -> Self {
        let phase = ExecutionState::classify(raw_state.as_deref());
        Self { raw_state, phase }
    }

    /// Returns the state exactly as the server spelled it.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.raw_state.as_deref()
    }

    #[must_use]
    pub fn phase(&self) -> ExecutionState {
        self.phase
    }

    /// Returns true once the execution reached a terminal state.
    #[must_use]
    pub fn completed(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// A request to run one workflow by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub workflow_name: String,
    pub inputs: Vec<InputParameter>,
    /// Block until the execution reaches a terminal state.
    pub wait_for_completion: bool,
}

impl ExecutionRequest {
    /// Creates a submit-only request with no inputs.
    #[must_use]
    pub fn new(workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            inputs: Vec::new(),
            wait_for_completion: false,
        }
    }

    /// Adds an input parameter.
    #[must_use]
    pub fn with_input(mut self, input: InputParameter) -> Self {
        self.inputs.push(input);
        self
    }

    /// Sets all input parameters at once.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Vec<InputParameter>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Makes the request wait for the execution to finish.
    #[must_use]
    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.wait_for_completion = wait;
        self
    }
}

/// The normalized outcome of an execution.
///
/// A submit-only execution has a handle but no state or output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    handle: Option<ExecutionHandle>,
    state: Option<String>,
    output_parameters: Option<String>,
    exception: Option<String>,
}

impl ExecutionResult {
    /// Creates the result of a submission that was not waited on.
    #[must_use]
    pub fn submitted(handle: ExecutionHandle) -> Self {
        Self {
            handle: Some(handle),
            ..Self::default()
        }
    }

    /// Creates the result of a finished execution.
    ///
    /// The exception is dropped unless the state is canceled or failed.
    #[must_use]
    pub fn finished(
        state: Option<String>,
        output_parameters: Option<String>,
        exception: Option<String>,
    ) -> Self {
        let exception = exception
            .filter(|_| ExecutionState::classify(state.as_deref()).has_failure_detail());
        Self {
            handle: None,
            state,
            output_parameters,
            exception,
        }
    }

    /// Attaches the execution handle.
    #[must_use]
    pub fn with_handle(mut self, handle: ExecutionHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    #[must_use]
    pub fn handle(&self) -> Option<&ExecutionHandle> {
        self.handle.as_ref()
    }

    /// Returns the final state as the server spelled it.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Returns the output parameters as a serialized tagged-JSON array.
    #[must_use]
    pub fn output_parameters(&self) -> Option<&str> {
        self.output_parameters.as_deref()
    }

    #[must_use]
    pub fn exception(&self) -> Option<&str> {
        self.exception.as_deref()
    }

    #[must_use]
    pub fn phase(&self) -> ExecutionState {
        ExecutionState::classify(self.state())
    }

    /// Returns true if the execution ended canceled or failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.phase().has_failure_detail()
    }

    /// Flattens the result into the string map handed to hosts.
    ///
    /// Submit-only results produce an empty map.
    #[must_use]
    pub fn to_output_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let Some(state) = &self.state else {
            return map;
        };
        map.insert(EXECUTION_STATE_KEY.to_string(), state.clone());
        map.insert(
            EXECUTION_OUTPUT_KEY.to_string(),
            self.output_parameters.clone().unwrap_or_default(),
        );
        if self.is_failure() {
            map.insert(
                EXECUTION_EXCEPTION_KEY.to_string(),
                self.exception.clone().unwrap_or_default(),
            );
        }
        map
    }
}
