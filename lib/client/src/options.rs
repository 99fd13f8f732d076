//! Tunables for [`WorkflowExecutionClient`](crate::WorkflowExecutionClient).

use crate::auth::TokenReuse;
use crate::poll::PollPolicy;
use crate::transport::TlsPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client behavior that does not vary per execution.
///
/// Every field has a default, so hosts can embed this in their own
/// configuration and override only what they need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Certificate trust policy.
    #[serde(default)]
    pub tls: TlsPolicy,

    /// Poll interval and optional wait deadline.
    #[serde(default)]
    pub poll: PollPolicy,

    /// Bearer token reuse within one execution.
    #[serde(default)]
    pub token_reuse: TokenReuse,

    /// Per-request timeout in seconds. `None` leaves requests unbounded.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl ClientOptions {
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let options: ClientOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ClientOptions::default());
        assert_eq!(options.tls, TlsPolicy::AcceptInvalidCertificates);
        assert_eq!(options.token_reuse, TokenReuse::PerRequest);
        assert_eq!(options.request_timeout(), None);
    }

    #[test]
    fn partial_overrides() {
        let options: ClientOptions = serde_json::from_str(
            r#"{"tls": "verify", "poll": {"timeout_secs": 600}, "token_reuse": "per_execution"}"#,
        )
        .unwrap();
        assert_eq!(options.tls, TlsPolicy::Verify);
        assert_eq!(options.poll.interval_secs, 10);
        assert_eq!(options.poll.timeout_secs, Some(600));
        assert_eq!(options.token_reuse, TokenReuse::PerExecution);
    }
}
