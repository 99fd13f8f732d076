//! Subcommand implementations, independent of argument parsing and output.

use crate::config::RunnerConfig;
use orchestrator_runner_client::{
    ClientError, ExecutionObserver, ExecutionResult, HttpTransport, WorkflowExecutionClient,
    WorkflowRef,
};
use orchestrator_runner_core::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Executes the configured workflow.
pub async fn run<T: HttpTransport>(
    client: &WorkflowExecutionClient<T>,
    config: &RunnerConfig,
    observer: &dyn ExecutionObserver,
    cancel: &CancellationToken,
) -> Result<ExecutionResult, ClientError> {
    let request = config.request()?;
    info!(
        server = %config.server_url,
        workflow = %request.workflow_name,
        wait = request.wait_for_completion,
        "executing workflow"
    );
    client
        .execute(&config.endpoint(), &request, observer, cancel)
        .await
}

/// Lists the workflows on the configured server, sorted by name.
pub async fn workflows<T: HttpTransport>(
    client: &WorkflowExecutionClient<T>,
    config: &RunnerConfig,
) -> Result<Vec<WorkflowRef>, ClientError> {
    let mut workflows = client.list_workflows(&config.endpoint()).await?;
    workflows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(workflows)
}

/// Returns the `name@type` keys of the inputs a workflow declares.
pub async fn inputs<T: HttpTransport>(
    client: &WorkflowExecutionClient<T>,
    config: &RunnerConfig,
    workflow: &str,
) -> Result<Vec<String>, ClientError> {
    let endpoint = config.endpoint();
    let id = client.resolve_workflow_id(&endpoint, workflow).await?;
    let parameters = client.fetch_input_parameters(&endpoint, &id).await?;
    Ok(parameters
        .iter()
        .map(|parameter| parameter.selection_key())
        .collect())
}
