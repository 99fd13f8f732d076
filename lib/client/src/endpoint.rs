//! Remote orchestrator server coordinates and the REST paths under them.

use crate::error::{ClientError, RequiredField};
use orchestrator_runner_core::WorkflowId;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// One remote orchestrator server and the credentials used against it.
///
/// A non-blank tenant selects bearer-token authentication; otherwise basic
/// credentials are sent with every request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    base_url: String,
    username: String,
    password: String,
    #[serde(default)]
    tenant: Option<String>,
}

impl ServerEndpoint {
    /// Creates an endpoint using basic authentication.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            tenant: None,
        }
    }

    /// Sets the tenant, switching to token authentication when non-blank.
    #[must_use]
    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the tenant if one is set and non-blank.
    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.tenant
            .as_deref()
            .filter(|tenant| !tenant.trim().is_empty())
    }

    /// Returns true if requests must carry a bearer token.
    #[must_use]
    pub fn uses_token_auth(&self) -> bool {
        self.tenant().is_some()
    }

    /// Checks that every field needed for an execution is present.
    ///
    /// Fields are checked in a fixed order (server url, username, password,
    /// workflow name) and the first blank one is reported.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` naming the first blank field.
    pub fn validate(&self, workflow_name: &str) -> Result<(), Report<ClientError>> {
        let fields = [
            (RequiredField::ServerUrl, self.base_url.as_str()),
            (RequiredField::Username, self.username.as_str()),
            (RequiredField::Password, self.password.as_str()),
            (RequiredField::WorkflowName, workflow_name),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ClientError::blank(*field).into());
        }
        Ok(())
    }

    /// `GET` target listing every workflow.
    pub fn workflows_url(&self) -> Result<String, Report<ClientError>> {
        self.api_url(&["vco", "api", "workflows"], false)
    }

    /// `GET` target describing one workflow, including its input parameters.
    pub fn workflow_url(&self, id: &WorkflowId) -> Result<String, Report<ClientError>> {
        self.api_url(&["vco", "api", "workflows", id.as_str()], false)
    }

    /// `POST` target that starts a new execution of a workflow.
    pub fn executions_url(&self, id: &WorkflowId) -> Result<String, Report<ClientError>> {
        self.api_url(
            &["vco", "api", "workflows", id.as_str(), "executions"],
            true,
        )
    }

    /// `POST` target that exchanges credentials for a bearer token.
    pub fn token_url(&self) -> Result<String, Report<ClientError>> {
        self.api_url(&["identity", "api", "tokens"], false)
    }

    /// Appends percent-encoded path segments to the base URL.
    fn api_url(&self, segments: &[&str], trailing_slash: bool) -> Result<String, Report<ClientError>> {
        let invalid = |reason: String| ClientError::Validation {
            field: RequiredField::ServerUrl,
            reason,
        };

        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ClientError::blank(RequiredField::ServerUrl).into());
        }
        let mut url = Url::parse(base.trim_end_matches('/'))
            .map_err(|e| invalid(format!("is not a valid URL: {e}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| invalid("cannot be used as a base URL".to_string()))?;
            path.pop_if_empty().extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        Ok(url.into())
    }
}

impl fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant", &self.tenant)
            .finish()
    }
}
