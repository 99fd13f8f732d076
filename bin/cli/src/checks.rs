//! Configuration checks run before anything is executed.

use crate::config::RunnerConfig;
use crate::interpolate::{self, Lookup};
use orchestrator_runner_client::{ClientError, HttpTransport, RequiredField, WorkflowExecutionClient};
use rootcause::Report;
use std::fmt;
use tracing::debug;

/// A problem found in a runner configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// A required field is blank.
    Missing(RequiredField),
    /// The server URL does not parse as an absolute URL.
    InvalidServerUrl { reason: String },
    /// The password references an environment variable. Advisory only, the
    /// reference is expanded before any request.
    TemplatedPassword,
    /// The server has no workflow with the configured name.
    WorkflowNotFound { workflow: String },
}

impl ConfigIssue {
    /// Returns true for issues that do not stop a run.
    #[must_use]
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::TemplatedPassword)
    }
}

/// Returns true if any issue would make a run fail.
#[must_use]
pub fn has_blocking(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(|issue| !issue.is_advisory())
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "please enter the orchestrator {field}"),
            Self::InvalidServerUrl { reason } => write!(f, "server url is not a valid URL: {reason}"),
            Self::TemplatedPassword => {
                f.write_str("password references an environment variable, it is expanded at run time")
            }
            Self::WorkflowNotFound { workflow } => {
                write!(f, "workflow '{workflow}' doesn't exist in the server")
            }
        }
    }
}

/// Checks the configuration as written, without contacting the server.
///
/// Values that reference variables are only checked for presence.
#[must_use]
pub fn check_fields(config: &RunnerConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    match interpolate::fix_empty_and_trim(&config.server_url) {
        None => issues.push(ConfigIssue::Missing(RequiredField::ServerUrl)),
        Some(url) if !interpolate::is_templated(&url) => {
            if let Err(e) = url::Url::parse(&url) {
                issues.push(ConfigIssue::InvalidServerUrl {
                    reason: e.to_string(),
                });
            }
        }
        Some(_) => {}
    }

    if config.username.trim().is_empty() {
        issues.push(ConfigIssue::Missing(RequiredField::Username));
    }

    if config.password.trim().is_empty() {
        issues.push(ConfigIssue::Missing(RequiredField::Password));
    } else if interpolate::is_templated(&config.password) {
        issues.push(ConfigIssue::TemplatedPassword);
    }

    if config.workflow_name.trim().is_empty() {
        issues.push(ConfigIssue::Missing(RequiredField::WorkflowName));
    }

    issues
}

/// Runs every check, asking the server whether the workflow exists once the
/// fields themselves are sound. Advisory issues do not skip the server check.
///
/// # Errors
///
/// Returns the client error if the server cannot be queried.
pub async fn check<T: HttpTransport>(
    client: &WorkflowExecutionClient<T>,
    config: &RunnerConfig,
    lookup: &impl Lookup,
) -> Result<Vec<ConfigIssue>, Report<ClientError>> {
    let mut issues = check_fields(config);
    if has_blocking(&issues) || interpolate::is_templated(&config.workflow_name) {
        return Ok(issues);
    }

    let expanded = config.interpolated(lookup);
    debug!(workflow = %expanded.workflow_name, "checking workflow on server");
    if !client
        .workflow_exists(&expanded.endpoint(), &expanded.workflow_name)
        .await?
    {
        issues.push(ConfigIssue::WorkflowNotFound {
            workflow: expanded.workflow_name,
        });
    }
    Ok(issues)
}
