//! Polling a submitted execution until it reaches a terminal state.

use crate::error::ClientError;
use crate::model::ExecutionStatus;
use crate::observer::{ExecutionEvent, ExecutionObserver};
use orchestrator_runner_core::ExecutionHandle;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How often to poll and how long to wait overall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Seconds to sleep between polls.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Overall wait limit in seconds. `None` waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_interval_secs() -> u64 {
    10
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: None,
        }
    }
}

impl PollPolicy {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Polls `fetch` until it reports a terminal state.
///
/// Every non-terminal state is reported to `observer` before the next sleep.
/// Cancellation and the deadline are honored both while sleeping and while a
/// poll is in flight. A failed poll aborts the wait.
pub(crate) async fn wait_for_terminal<F, Fut>(
    handle: &ExecutionHandle,
    policy: &PollPolicy,
    observer: &dyn ExecutionObserver,
    cancel: &CancellationToken,
    mut fetch: F,
) -> Result<ExecutionStatus, Report<ClientError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ExecutionStatus, Report<ClientError>>>,
{
    let started = Instant::now();
    // A deadline past the clock's range is no deadline.
    let deadline = policy
        .timeout()
        .and_then(|timeout| started.checked_add(timeout));
    let cancelled = || ClientError::Cancelled {
        handle: handle.to_string(),
    };
    let expired = || ClientError::DeadlineExceeded {
        handle: handle.to_string(),
        waited: started.elapsed(),
    };

    loop {
        let status = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled().into()),
            () = until(deadline) => return Err(expired().into()),
            status = fetch() => status?,
        };

        if status.completed() {
            let state = status.state().unwrap_or_default().to_string();
            observer.observe(&ExecutionEvent::Finished {
                handle: handle.clone(),
                state,
            });
            return Ok(status);
        }

        observer.observe(&ExecutionEvent::Polled {
            handle: handle.clone(),
            state: status.state().map(str::to_string),
        });
        debug!(handle = %handle, interval = ?policy.interval(), "waiting before next poll");

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!(handle = %handle, "wait cancelled");
                return Err(cancelled().into());
            }
            () = until(deadline) => {
                warn!(handle = %handle, "wait deadline exceeded");
                return Err(expired().into());
            }
            () = tokio::time::sleep(policy.interval()) => {}
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
