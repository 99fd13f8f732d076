use async_trait::async_trait;
use orchestrator_runner::checks::{self, ConfigIssue};
use orchestrator_runner::commands;
use orchestrator_runner::config::RunnerConfig;
use orchestrator_runner::report;
use orchestrator_runner_client::{
    ClientError, ClientOptions, HttpRequest, HttpResponse, HttpTransport, NoopObserver,
    RequiredField, WorkflowExecutionClient,
};
use rootcause::Report;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct ScriptedServer {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

#[async_trait]
impl HttpTransport for ScriptedServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Report<ClientError>> {
        self.requests.lock().unwrap().push(request);
        Ok(self.responses.lock().unwrap().pop_front().expect("scripted response"))
    }
}

fn client(responses: Vec<HttpResponse>) -> WorkflowExecutionClient<ScriptedServer> {
    let server = ScriptedServer {
        responses: Mutex::new(responses.into()),
        requests: Mutex::default(),
    };
    WorkflowExecutionClient::new(server, ClientOptions::default())
}

fn workflows() -> HttpResponse {
    HttpResponse::new(
        200,
        json!({"link": [
            {"attributes": [{"name": "name", "value": "Zeta"}, {"name": "id", "value": "z"}]},
            {"attributes": [{"name": "name", "value": "Deploy"}, {"name": "id", "value": "wf-1"}]}
        ]})
        .to_string(),
    )
}

fn config() -> RunnerConfig {
    RunnerConfig {
        server_url: "https://vro.local:8281".to_string(),
        username: "admin".to_string(),
        password: "pw".to_string(),
        workflow_name: "Deploy".to_string(),
        ..RunnerConfig::default()
    }
}

fn no_env() -> HashMap<String, String> {
    HashMap::new()
}

#[tokio::test]
async fn lists_workflows_sorted_by_name() {
    let client = client(vec![workflows()]);
    let listed = commands::workflows(&client, &config()).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["Deploy", "Zeta"]);
}

#[tokio::test]
async fn lists_input_selection_keys() {
    let detail = json!({"input-parameters": [
        {"name": "vmName", "type": "string"},
        {"name": "vm", "type": "VC:VirtualMachine"}
    ]});
    let client = client(vec![workflows(), HttpResponse::new(200, detail.to_string())]);

    let keys = commands::inputs(&client, &config(), "Deploy").await.unwrap();
    assert_eq!(keys, vec!["vmName@string", "vm@VC:VirtualMachine"]);
}

#[tokio::test]
async fn check_passes_when_workflow_exists() {
    let client = client(vec![workflows()]);
    let issues = checks::check(&client, &config(), &no_env()).await.unwrap();
    assert!(issues.is_empty());
}

#[tokio::test]
async fn check_reports_unknown_workflow() {
    let client = client(vec![workflows()]);
    let config = RunnerConfig {
        workflow_name: "Missing".to_string(),
        ..config()
    };
    let issues = checks::check(&client, &config, &no_env()).await.unwrap();
    assert_eq!(
        issues,
        vec![ConfigIssue::WorkflowNotFound {
            workflow: "Missing".to_string()
        }]
    );
}

#[tokio::test]
async fn check_skips_server_when_fields_are_invalid() {
    let client = client(Vec::new());
    let config = RunnerConfig {
        username: " ".to_string(),
        ..config()
    };
    let issues = checks::check(&client, &config, &no_env()).await.unwrap();
    assert_eq!(issues, vec![ConfigIssue::Missing(RequiredField::Username)]);
    assert!(checks::has_blocking(&issues));
    assert!(client.transport().requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn templated_password_is_expanded_for_the_server_check() {
    let client = client(vec![workflows()]);
    let config = RunnerConfig {
        password: "${SECRET}".to_string(),
        ..config()
    };
    let env: HashMap<String, String> = [("SECRET".to_string(), "pw".to_string())].into();

    let issues = checks::check(&client, &config, &env).await.unwrap();
    assert_eq!(issues, vec![ConfigIssue::TemplatedPassword]);
    assert!(!checks::has_blocking(&issues));

    let requests = client.transport().requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(
        requests[0]
            .headers
            .contains(&("Authorization".to_string(), "Basic YWRtaW46cHc=".to_string()))
    );
}

#[tokio::test]
async fn failed_run_maps_to_failure_exit_code() {
    let failed = json!({"state": "failed", "content-exception": "boom"}).to_string();
    let client = client(vec![
        workflows(),
        HttpResponse::new(202, "").with_location("https://host/exec/42"),
        HttpResponse::new(200, failed.clone()),
        HttpResponse::new(200, failed),
    ]);
    let config = RunnerConfig {
        wait_for_completion: true,
        ..config()
    };

    let result = commands::run(&client, &config, &NoopObserver, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report::exit_code(&result), report::EXIT_EXECUTION_FAILED);
    assert!(report::render(&result.to_output_map()).contains("EXCEPTION : boom"));
}
