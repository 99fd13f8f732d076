//! Runner configuration.
//!
//! Loaded with the `config` crate from, in increasing precedence, an optional
//! TOML file, `ORCHESTRATOR__*` environment variables and command-line flags.

use crate::interpolate::{self, Lookup};
use orchestrator_runner_client::{
    ClientError, ClientOptions, ExecutionRequest, InputParameter, PollPolicy, ServerEndpoint,
    TlsPolicy, TokenReuse,
};
use rootcause::Report;
use serde::Deserialize;
use std::path::Path;

/// Environment variable prefix for configuration keys.
pub const ENV_PREFIX: &str = "ORCHESTRATOR";

/// Everything needed to run one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerConfig {
    /// Base URL of the orchestrator server.
    #[serde(default)]
    pub server_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Selects bearer-token authentication when set.
    #[serde(default)]
    pub tenant: Option<String>,

    #[serde(default)]
    pub workflow_name: String,

    /// Block until the execution reaches a terminal state.
    #[serde(default)]
    pub wait_for_completion: bool,

    #[serde(default)]
    pub input_parameters: Vec<ParameterConfig>,

    /// Seconds between polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Overall wait limit in seconds. Unset waits forever.
    #[serde(default)]
    pub wait_timeout_secs: Option<u64>,

    /// Accept self-signed server certificates.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,

    #[serde(default)]
    pub token_reuse: TokenReuse,
}

fn default_poll_interval_secs() -> u64 {
    PollPolicy::default().interval_secs
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            username: String::new(),
            password: String::new(),
            tenant: None,
            workflow_name: String::new(),
            wait_for_completion: false,
            input_parameters: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            wait_timeout_secs: None,
            accept_invalid_certs: default_accept_invalid_certs(),
            token_reuse: TokenReuse::default(),
        }
    }
}

/// One configured input parameter.
///
/// `name` may carry its type as `name@type`, in which case `type` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParameterConfig {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_tag: Option<String>,
    #[serde(default)]
    pub value: String,
}

/// Values given on the command line. Each one set here wins over file and
/// environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tenant: Option<String>,
    pub workflow_name: Option<String>,
    pub wait_for_completion: Option<bool>,
    pub poll_interval_secs: Option<u64>,
    pub wait_timeout_secs: Option<u64>,
    pub accept_invalid_certs: Option<bool>,
}

impl RunnerConfig {
    /// Loads configuration from the optional file, the environment and the
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value has the wrong
    /// type.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(
                config::File::from(file)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server_url", overrides.server_url.clone())?
            .set_override_option("username", overrides.username.clone())?
            .set_override_option("password", overrides.password.clone())?
            .set_override_option("tenant", overrides.tenant.clone())?
            .set_override_option("workflow_name", overrides.workflow_name.clone())?
            .set_override_option("wait_for_completion", overrides.wait_for_completion)?
            .set_override_option("poll_interval_secs", overrides.poll_interval_secs)?
            .set_override_option("wait_timeout_secs", overrides.wait_timeout_secs)?
            .set_override_option("accept_invalid_certs", overrides.accept_invalid_certs)?
            .build()?
            .try_deserialize()
    }

    /// Expands `${VAR}` and `$VAR` references in every string field.
    #[must_use]
    pub fn interpolated(&self, lookup: &impl Lookup) -> Self {
        let field = |value: &str| interpolate::expand_field(value, lookup).unwrap_or_default();
        Self {
            server_url: field(&self.server_url),
            username: field(&self.username),
            password: field(&self.password),
            tenant: self
                .tenant
                .as_deref()
                .and_then(|tenant| interpolate::expand_field(tenant, lookup)),
            workflow_name: field(&self.workflow_name),
            input_parameters: self
                .input_parameters
                .iter()
                .map(|parameter| ParameterConfig {
                    name: field(&parameter.name),
                    type_tag: parameter
                        .type_tag
                        .as_deref()
                        .and_then(|tag| interpolate::expand_field(tag, lookup)),
                    value: field(&parameter.value),
                })
                .collect(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint::new(&self.server_url, &self.username, &self.password)
            .with_tenant(self.tenant.clone())
    }

    /// Builds the execution request.
    ///
    /// # Errors
    ///
    /// Returns a validation error if an input parameter has no type.
    pub fn request(&self) -> Result<ExecutionRequest, Report<ClientError>> {
        let inputs = self
            .input_parameters
            .iter()
            .map(|p| InputParameter::resolve(&p.name, p.type_tag.as_deref(), p.value.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExecutionRequest::new(&self.workflow_name)
            .with_inputs(inputs)
            .wait_for_completion(self.wait_for_completion))
    }

    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            tls: if self.accept_invalid_certs {
                TlsPolicy::AcceptInvalidCertificates
            } else {
                TlsPolicy::Verify
            },
            poll: PollPolicy {
                interval_secs: self.poll_interval_secs,
                timeout_secs: self.wait_timeout_secs,
            },
            token_reuse: self.token_reuse,
            ..ClientOptions::default()
        }
    }
}
