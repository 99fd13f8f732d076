//! The workflow execution client.
//!
//! [`WorkflowExecutionClient::execute`] drives one execution end to end:
//! validate, resolve the workflow name, submit the encoded inputs, then
//! optionally poll the returned handle and fetch the final outcome.

use crate::auth::AuthProvider;
use crate::codec::{self, InputParameter, ParameterDescriptor};
use crate::endpoint::ServerEndpoint;
use crate::error::ClientError;
use crate::model::{ExecutionRequest, ExecutionResult, ExecutionStatus, WorkflowRef};
use crate::observer::{ExecutionEvent, ExecutionObserver};
use crate::options::ClientOptions;
use crate::poll;
use crate::transport::{HttpTransport, ReqwestTransport, UNAUTHORIZED};
use orchestrator_runner_core::{ExecutionHandle, WorkflowId};
use rootcause::Report;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const JSON: &str = "application/json";

/// Runs workflows on a remote orchestrator server.
///
/// The client holds no per-server state, so one instance can serve many
/// endpoints and concurrent executions.
pub struct WorkflowExecutionClient<T: HttpTransport> {
    transport: T,
    options: ClientOptions,
}

impl WorkflowExecutionClient<ReqwestTransport> {
    /// Creates a client backed by `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_options(options: ClientOptions) -> Result<Self, Report<ClientError>> {
        let transport = ReqwestTransport::new(options.tls, options.request_timeout())?;
        Ok(Self::new(transport, options))
    }
}

impl<T: HttpTransport> WorkflowExecutionClient<T> {
    /// Creates a client over the given transport.
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn session<'a>(&'a self, endpoint: &'a ServerEndpoint) -> Session<'a, T> {
        Session {
            transport: &self.transport,
            endpoint,
            auth: AuthProvider::new(self.options.token_reuse),
        }
    }

    /// Lists every workflow on the server.
    ///
    /// A response without links yields an empty list.
    #[instrument(skip(self, endpoint), fields(server = %endpoint.base_url()))]
    pub async fn list_workflows(
        &self,
        endpoint: &ServerEndpoint,
    ) -> Result<Vec<WorkflowRef>, Report<ClientError>> {
        self.session(endpoint).list_workflows().await
    }

    /// Returns the id of the first workflow named exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if no workflow has that name.
    #[instrument(skip(self, endpoint), fields(server = %endpoint.base_url()))]
    pub async fn resolve_workflow_id(
        &self,
        endpoint: &ServerEndpoint,
        name: &str,
    ) -> Result<WorkflowId, Report<ClientError>> {
        self.session(endpoint).resolve_workflow_id(name).await
    }

    /// Returns true if a workflow named exactly `name` exists.
    #[instrument(skip(self, endpoint), fields(server = %endpoint.base_url()))]
    pub async fn workflow_exists(
        &self,
        endpoint: &ServerEndpoint,
        name: &str,
    ) -> Result<bool, Report<ClientError>> {
        let workflows = self.session(endpoint).list_workflows().await?;
        Ok(workflows.iter().any(|workflow| workflow.name == name))
    }

    /// Returns the input parameters a workflow declares.
    #[instrument(skip(self, endpoint), fields(server = %endpoint.base_url()))]
    pub async fn fetch_input_parameters(
        &self,
        endpoint: &ServerEndpoint,
        id: &WorkflowId,
    ) -> Result<Vec<ParameterDescriptor>, Report<ClientError>> {
        self.session(endpoint).fetch_input_parameters(id).await
    }

    /// Starts an execution of a resolved workflow.
    #[instrument(skip(self, endpoint, inputs), fields(server = %endpoint.base_url()))]
    pub async fn submit(
        &self,
        endpoint: &ServerEndpoint,
        id: &WorkflowId,
        inputs: &[InputParameter],
    ) -> Result<ExecutionHandle, Report<ClientError>> {
        self.session(endpoint).submit(id, inputs).await
    }

    /// Reads the current state of an execution.
    #[instrument(skip(self, endpoint))]
    pub async fn fetch_status(
        &self,
        endpoint: &ServerEndpoint,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionStatus, Report<ClientError>> {
        self.session(endpoint).fetch_status(handle).await
    }

    /// Reads the state, outputs and failure detail of an execution.
    #[instrument(skip(self, endpoint))]
    pub async fn fetch_result(
        &self,
        endpoint: &ServerEndpoint,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionResult, Report<ClientError>> {
        self.session(endpoint).fetch_result(handle).await
    }

    /// Runs one workflow.
    ///
    /// Without `wait_for_completion` the result only carries the handle.
    /// Otherwise the handle is polled until a terminal state and the final
    /// outcome is fetched.
    ///
    /// # Errors
    ///
    /// - `Validation` naming the first blank field, before any request is made
    /// - `NotFound` if no workflow has the requested name
    /// - `Auth`, `Transport` or `Protocol` from any request
    /// - `Cancelled` or `DeadlineExceeded` while waiting
    #[instrument(
        skip(self, endpoint, request, observer, cancel),
        fields(server = %endpoint.base_url(), workflow = %request.workflow_name)
    )]
    pub async fn execute(
        &self,
        endpoint: &ServerEndpoint,
        request: &ExecutionRequest,
        observer: &dyn ExecutionObserver,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, Report<ClientError>> {
        endpoint.validate(&request.workflow_name)?;

        let session = self.session(endpoint);
        let id = session.resolve_workflow_id(&request.workflow_name).await?;
        let handle = session.submit(&id, &request.inputs).await?;
        observer.observe(&ExecutionEvent::Submitted {
            workflow: request.workflow_name.clone(),
            handle: handle.clone(),
        });

        if !request.wait_for_completion {
            return Ok(ExecutionResult::submitted(handle));
        }

        let (session, polled) = (&session, &handle);
        let status = poll::wait_for_terminal(&handle, &self.options.poll, observer, cancel, move || {
            session.fetch_status(polled)
        })
        .await?;

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(ClientError::Cancelled { handle: handle.to_string() }.into());
            }
            outcome = session.fetch_result(&handle) => outcome?,
        };

        // A final document without a state keeps the one the poll saw.
        let result = match outcome.state() {
            Some(_) => outcome,
            None => ExecutionResult::finished(
                status.state().map(str::to_string),
                outcome.output_parameters().map(str::to_string),
                outcome.exception().map(str::to_string),
            ),
        };
        Ok(result.with_handle(handle))
    }
}

/// Requests made on behalf of one operation against one endpoint.
///
/// Token caching lives here, so a cached token never outlives the operation.
struct Session<'a, T: HttpTransport> {
    transport: &'a T,
    endpoint: &'a ServerEndpoint,
    auth: AuthProvider,
}

impl<T: HttpTransport> Session<'_, T> {
    async fn headers(&self, content_type: bool) -> Result<Vec<(String, String)>, Report<ClientError>> {
        let authorization = self.auth.authorization(self.transport, self.endpoint).await?;
        let mut headers = vec![
            ("Accept".to_string(), JSON.to_string()),
            ("Authorization".to_string(), authorization),
        ];
        if content_type {
            headers.push(("Content-Type".to_string(), JSON.to_string()));
        }
        Ok(headers)
    }

    /// Returns true if a cached token was rejected and may be replaced.
    fn should_reauthenticate(&self, error: &Report<ClientError>) -> bool {
        self.auth.is_caching(self.endpoint) && error.current_context().status() == Some(UNAUTHORIZED)
    }

    async fn get(&self, url: &str) -> Result<String, Report<ClientError>> {
        match self.transport.get(url, self.headers(false).await?).await {
            Err(e) if self.should_reauthenticate(&e) => {
                debug!(endpoint = %url, "token rejected, re-authenticating");
                self.auth.invalidate().await;
                self.transport.get(url, self.headers(false).await?).await
            }
            other => other,
        }
    }

    async fn get_json(&self, url: &str) -> Result<JsonValue, Report<ClientError>> {
        let body = self.get(url).await?;
        let document = serde_json::from_str(&body)
            .map_err(|e| ClientError::protocol(url, format!("response is not valid JSON: {e}")))?;
        Ok(document)
    }

    async fn post_for_location(&self, url: &str, body: String) -> Result<String, Report<ClientError>> {
        match self
            .transport
            .post_for_location(url, self.headers(true).await?, body.clone())
            .await
        {
            Err(e) if self.should_reauthenticate(&e) => {
                debug!(endpoint = %url, "token rejected, re-authenticating");
                self.auth.invalidate().await;
                self.transport
                    .post_for_location(url, self.headers(true).await?, body)
                    .await
            }
            other => other,
        }
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRef>, Report<ClientError>> {
        let url = self.endpoint.workflows_url()?;
        let document = self.get_json(&url).await?;
        let workflows = parse_workflow_list(&url, document)?;
        debug!(count = workflows.len(), "listed workflows");
        Ok(workflows)
    }

    async fn resolve_workflow_id(&self, name: &str) -> Result<WorkflowId, Report<ClientError>> {
        let not_found = || ClientError::NotFound {
            workflow: name.to_string(),
        };
        let workflows = self.list_workflows().await?;
        let workflow = workflows
            .into_iter()
            .find(|workflow| workflow.name == name)
            .ok_or_else(not_found)?;
        // A listed workflow without an id cannot be submitted.
        let id = WorkflowId::parse(workflow.id).map_err(|_| not_found())?;
        debug!(workflow = %name, id = %id, "resolved workflow");
        Ok(id)
    }

    async fn fetch_input_parameters(
        &self,
        id: &WorkflowId,
    ) -> Result<Vec<ParameterDescriptor>, Report<ClientError>> {
        #[derive(Deserialize)]
        struct WorkflowDetail {
            #[serde(default, rename = "input-parameters")]
            input_parameters: Vec<ParameterDescriptor>,
        }

        let url = self.endpoint.workflow_url(id)?;
        let document = self.get_json(&url).await?;
        let detail: WorkflowDetail = serde_json::from_value(document).map_err(|e| {
            ClientError::protocol(&url, format!("unexpected workflow detail: {e}"))
        })?;
        Ok(detail.input_parameters)
    }

    async fn submit(
        &self,
        id: &WorkflowId,
        inputs: &[InputParameter],
    ) -> Result<ExecutionHandle, Report<ClientError>> {
        let url = self.endpoint.executions_url(id)?;
        let payload = codec::encode_inputs(inputs).to_string();
        debug!(endpoint = %url, payload = %payload, "submitting execution");

        let location = self.post_for_location(&url, payload).await?;
        let handle = ExecutionHandle::parse(location).map_err(|e| {
            ClientError::protocol(&url, format!("unusable Location header: {e}"))
        })?;
        info!(handle = %handle, "execution accepted");
        Ok(handle)
    }

    async fn fetch_status(
        &self,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionStatus, Report<ClientError>> {
        let document = self.get_json(handle.as_str()).await?;
        let state = codec::decode_state(handle.as_str(), &document)?;
        Ok(ExecutionStatus::from_raw(state))
    }

    async fn fetch_result(
        &self,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionResult, Report<ClientError>> {
        let document = self.get_json(handle.as_str()).await?;
        let result = codec::decode_execution_outcome(handle.as_str(), &document)?;
        Ok(result.with_handle(handle.clone()))
    }
}

#[derive(Deserialize)]
struct WorkflowList {
    #[serde(default)]
    link: Vec<WorkflowLink>,
}

#[derive(Deserialize)]
struct WorkflowLink {
    attributes: Option<Vec<LinkAttribute>>,
}

#[derive(Deserialize)]
struct LinkAttribute {
    name: String,
    #[serde(default)]
    value: JsonValue,
}

impl LinkAttribute {
    fn value_string(self) -> Option<String> {
        match self.value {
            JsonValue::Null => None,
            JsonValue::String(value) => Some(value),
            other => Some(other.to_string()),
        }
    }
}

/// Extracts the `name` and `id` attributes of every link that has attributes.
fn parse_workflow_list(url: &str, document: JsonValue) -> Result<Vec<WorkflowRef>, Report<ClientError>> {
    if !document.is_object() {
        return Err(ClientError::protocol(url, "workflow list is not a JSON object").into());
    }
    let list: WorkflowList = serde_json::from_value(document)
        .map_err(|e| ClientError::protocol(url, format!("unexpected workflow list: {e}")))?;

    let workflows = list
        .link
        .into_iter()
        .filter_map(|link| link.attributes)
        .map(|attributes| {
            let mut workflow = WorkflowRef::default();
            for attribute in attributes {
                match attribute.name.as_str() {
                    "name" => workflow.name = attribute.value_string().unwrap_or_default(),
                    "id" => workflow.id = attribute.value_string().unwrap_or_default(),
                    _ => {}
                }
            }
            workflow
        })
        .collect();
    Ok(workflows)
}
