//! Error types for the client crate.
//!
//! Every fallible operation returns a rootcause `Report<ClientError>`.
//! Variants carry the endpoint, workflow or handle involved so a caller can
//! diagnose a failure from the message alone.

use std::fmt;
use std::time::Duration;

/// A required configuration field, in the order fields are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredField {
    /// The orchestrator base URL.
    ServerUrl,
    /// The account name.
    Username,
    /// The account password.
    Password,
    /// The workflow to execute.
    WorkflowName,
    /// The type of one input parameter.
    ParameterType,
}

impl RequiredField {
    /// Returns the human-readable field name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerUrl => "server url",
            Self::Username => "username",
            Self::Password => "password",
            Self::WorkflowName => "workflow name",
            Self::ParameterType => "input parameter type",
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Auth,
    Transport,
    Protocol,
    Cancelled,
    DeadlineExceeded,
}

/// Errors from workflow client operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// A required field is blank or malformed. Never retried.
    Validation { field: RequiredField, reason: String },
    /// No workflow on the server has the requested name.
    NotFound { workflow: String },
    /// Credential or token exchange failed.
    Auth { endpoint: String, reason: String },
    /// The request could not be sent or the server answered with an
    /// unexpected status.
    Transport {
        endpoint: String,
        status: Option<u16>,
        reason: String,
    },
    /// The server answered with JSON of an unexpected shape.
    Protocol { endpoint: String, reason: String },
    /// The caller cancelled the wait for an execution.
    Cancelled { handle: String },
    /// The configured wait deadline elapsed before a terminal state.
    DeadlineExceeded { handle: String, waited: Duration },
}

impl ClientError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
        }
    }

    /// Returns the HTTP status code when the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns true for mistakes in the caller's configuration rather than
    /// server or network faults.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::NotFound)
    }

    pub(crate) fn blank(field: RequiredField) -> Self {
        Self::Validation {
            field,
            reason: "cannot be empty".to_string(),
        }
    }

    pub(crate) fn protocol(endpoint: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, reason } => {
                write!(f, "orchestrator {field} {reason}")
            }
            Self::NotFound { workflow } => {
                write!(f, "workflow '{workflow}' doesn't exist in the server")
            }
            Self::Auth { endpoint, reason } => {
                write!(f, "authentication against '{endpoint}' failed: {reason}")
            }
            Self::Transport {
                endpoint, reason, ..
            } => {
                write!(f, "request to '{endpoint}' failed: {reason}")
            }
            Self::Protocol { endpoint, reason } => {
                write!(f, "unexpected response from '{endpoint}': {reason}")
            }
            Self::Cancelled { handle } => {
                write!(f, "wait for execution '{handle}' was cancelled")
            }
            Self::DeadlineExceeded { handle, waited } => {
                write!(
                    f,
                    "execution '{handle}' did not finish within {}s",
                    waited.as_secs()
                )
            }
        }
    }
}

impl std::error::Error for ClientError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_field() {
        let err = ClientError::blank(RequiredField::ServerUrl);
        assert_eq!(err.to_string(), "orchestrator server url cannot be empty");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.is_configuration_error());
    }

    #[test]
    fn not_found_is_a_configuration_error() {
        let err = ClientError::NotFound {
            workflow: "Deploy VM".to_string(),
        };
        assert!(err.to_string().contains("Deploy VM"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn transport_error_carries_status() {
        let err = ClientError::Transport {
            endpoint: "https://vro/vco/api/workflows".to_string(),
            status: Some(500),
            reason: "HTTP/1.1 500 Internal Server Error".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("500 Internal Server Error"));
        assert!(!err.is_configuration_error());
    }

    #[test]
    fn deadline_error_reports_wait() {
        let err = ClientError::DeadlineExceeded {
            handle: "https://host/exec/42".to_string(),
            waited: Duration::from_secs(60),
        };
        assert!(err.to_string().contains("60s"));
        assert_eq!(err.status(), None);
    }
}
