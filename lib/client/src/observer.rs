//! Progress events for long-running executions.
//!
//! The client reports every observed state before it waits again, so an
//! execution that runs for hours stays visible to whoever started it.

use orchestrator_runner_core::ExecutionHandle;
use tracing::info;

/// Events emitted while an execution is submitted and polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// The server accepted the submission.
    Submitted {
        workflow: String,
        handle: ExecutionHandle,
    },
    /// A poll returned a non-terminal state. Emitted before each wait.
    Polled {
        handle: ExecutionHandle,
        state: Option<String>,
    },
    /// A poll returned a terminal state.
    Finished {
        handle: ExecutionHandle,
        state: String,
    },
}

/// Receives execution events.
pub trait ExecutionObserver: Send + Sync {
    fn observe(&self, event: &ExecutionEvent);
}

/// Logs each event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ExecutionObserver for TracingObserver {
    fn observe(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::Submitted { workflow, handle } => {
                info!(workflow = %workflow, handle = %handle, "execution submitted");
            }
            ExecutionEvent::Polled { handle, state } => {
                info!(
                    handle = %handle,
                    state = state.as_deref().unwrap_or("unknown"),
                    "execution state"
                );
            }
            ExecutionEvent::Finished { handle, state } => {
                info!(handle = %handle, state = %state, "execution finished");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {
    fn observe(&self, _event: &ExecutionEvent) {}
}
