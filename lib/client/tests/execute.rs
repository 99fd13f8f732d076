//! End-to-end execution scenarios against a scripted server.

use async_trait::async_trait;
use orchestrator_runner_client::{
    ClientError, ClientOptions, ErrorKind, ExecutionEvent, ExecutionObserver, ExecutionRequest,
    HttpRequest, HttpResponse, HttpTransport, InputParameter, Method, NoopObserver,
    ParameterType, PollPolicy, RequiredField, ServerEndpoint, TokenReuse,
    WorkflowExecutionClient, EXECUTION_EXCEPTION_KEY, EXECUTION_STATE_KEY,
};
use rootcause::Report;
use serde_json::{Value as JsonValue, json};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

const BASE: &str = "https://vro.example.com:8281";
const HANDLE: &str = "https://host/exec/42";

/// Replays canned responses in order and records every request.
#[derive(Default)]
struct ScriptedServer {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedServer {
    fn new(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::default(),
        }
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Report<ClientError>> {
        self.requests.lock().unwrap().push(request.clone());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request to {}", request.url));
        Ok(response)
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl ExecutionObserver for RecordingObserver {
    fn observe(&self, event: &ExecutionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn ok(body: JsonValue) -> HttpResponse {
    HttpResponse::new(200, body.to_string())
}

fn workflows(entries: &[(&str, &str)]) -> HttpResponse {
    let links: Vec<JsonValue> = entries
        .iter()
        .map(|(name, id)| {
            json!({"attributes": [
                {"name": "name", "value": name},
                {"name": "id", "value": id}
            ]})
        })
        .collect();
    ok(json!({ "link": links }))
}

fn accepted() -> HttpResponse {
    HttpResponse::new(202, "").with_location(HANDLE)
}

fn token(id: &str) -> HttpResponse {
    ok(json!({ "id": id }))
}

fn unauthorized() -> HttpResponse {
    let mut response = HttpResponse::new(401, "");
    response.status_line = "HTTP/1.1 401 Unauthorized".to_string();
    response
}

fn endpoint() -> ServerEndpoint {
    ServerEndpoint::new(BASE, "admin", "secret")
}

fn client(responses: Vec<HttpResponse>) -> WorkflowExecutionClient<ScriptedServer> {
    client_with(responses, ClientOptions::default())
}

fn client_with(
    responses: Vec<HttpResponse>,
    options: ClientOptions,
) -> WorkflowExecutionClient<ScriptedServer> {
    WorkflowExecutionClient::new(ScriptedServer::new(responses), options)
}

fn waiting(name: &str) -> ExecutionRequest {
    ExecutionRequest::new(name).wait_for_completion(true)
}

#[tokio::test(start_paused = true)]
async fn waits_until_completed_and_returns_outputs() {
    let completed = json!({"state": "completed", "output-parameters": [{"name": "x", "value": "1"}]});
    let client = client(vec![
        workflows(&[("Deploy", "wf-1")]),
        accepted(),
        ok(json!({"state": "running"})),
        ok(completed.clone()),
        ok(completed),
    ]);
    let observer = RecordingObserver::default();

    let result = client
        .execute(&endpoint(), &waiting("Deploy"), &observer, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.state(), Some("completed"));
    assert_eq!(result.output_parameters(), Some(r#"[{"name":"x","value":"1"}]"#));
    assert_eq!(result.exception(), None);
    assert_eq!(result.handle().map(|h| h.as_str()), Some(HANDLE));

    let server = client.transport();
    assert_eq!(
        server.urls(),
        vec![
            format!("{BASE}/vco/api/workflows"),
            format!("{BASE}/vco/api/workflows/wf-1/executions/"),
            HANDLE.to_string(),
            HANDLE.to_string(),
            HANDLE.to_string(),
        ]
    );

    let events = observer.events.lock().unwrap();
    assert!(matches!(events[0], ExecutionEvent::Submitted { ref workflow, .. } if workflow == "Deploy"));
    assert!(matches!(events[1], ExecutionEvent::Polled { ref state, .. } if state.as_deref() == Some("running")));
    assert!(matches!(events[2], ExecutionEvent::Finished { ref state, .. } if state == "completed"));
}

#[tokio::test(start_paused = true)]
async fn failed_execution_carries_exception() {
    let failed = json!({"state": "failed", "content-exception": "boom"});
    let client = client(vec![
        workflows(&[("Deploy", "wf-1")]),
        accepted(),
        ok(failed.clone()),
        ok(failed),
    ]);

    let result = client
        .execute(&endpoint(), &waiting("Deploy"), &NoopObserver, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.state(), Some("failed"));
    assert_eq!(result.exception(), Some("boom"));
    let map = result.to_output_map();
    assert_eq!(map.get(EXECUTION_STATE_KEY).map(String::as_str), Some("failed"));
    assert_eq!(map.get(EXECUTION_EXCEPTION_KEY).map(String::as_str), Some("boom"));
}

#[tokio::test]
async fn submit_only_returns_handle_without_state() {
    let client = client(vec![workflows(&[("Deploy", "wf-1")]), accepted()]);

    let result = client
        .execute(
            &endpoint(),
            &ExecutionRequest::new("Deploy"),
            &NoopObserver,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.state(), None);
    assert_eq!(result.handle().map(|h| h.as_str()), Some(HANDLE));
    assert!(result.to_output_map().is_empty());
    assert_eq!(client.transport().requests().len(), 2);
}

#[tokio::test]
async fn empty_inputs_submit_an_empty_object_with_basic_auth() {
    let client = client(vec![workflows(&[("Deploy", "wf-1")]), accepted()]);
    client
        .execute(
            &endpoint(),
            &ExecutionRequest::new("Deploy"),
            &NoopObserver,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let submit = &client.transport().requests()[1];
    assert_eq!(submit.method, Method::Post);
    assert_eq!(submit.body.as_deref(), Some("{}"));
    assert!(
        submit
            .headers
            .contains(&("Authorization".to_string(), "Basic YWRtaW46c2VjcmV0".to_string()))
    );
}

#[tokio::test]
async fn submits_encoded_inputs() {
    let client = client(vec![workflows(&[("Deploy", "wf-1")]), accepted()]);
    let request = ExecutionRequest::new("Deploy").with_inputs(vec![
        InputParameter::new("vmName", ParameterType::String, "web-01"),
        InputParameter::new("host", ParameterType::parse("VC:HostSystem"), "host-9"),
    ]);
    client
        .execute(&endpoint(), &request, &NoopObserver, &CancellationToken::new())
        .await
        .unwrap();

    let body: JsonValue =
        serde_json::from_str(client.transport().requests()[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(
        body,
        json!({"parameters": [
            {"name": "vmName", "type": "string", "value": {"string": {"value": "web-01"}}},
            {"name": "host", "type": "VC:HostSystem", "value": {"sdk-object": {"id": "host-9", "type": "VC:HostSystem"}}}
        ]})
    );
}

#[tokio::test]
async fn duplicate_names_resolve_to_first_match() {
    let client = client(vec![workflows(&[("A", "1"), ("A", "2")])]);
    let id = client.resolve_workflow_id(&endpoint(), "A").await.unwrap();
    assert_eq!(id.as_str(), "1");
}

#[tokio::test]
async fn unknown_workflow_is_not_found() {
    let client = client(vec![workflows(&[("A", "1")])]);
    let err = client
        .execute(&endpoint(), &waiting("Missing"), &NoopObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.current_context().kind(), ErrorKind::NotFound);
    assert!(err.current_context().is_configuration_error());
    assert_eq!(client.transport().requests().len(), 1);
}

#[tokio::test]
async fn workflow_exists_matches_exact_name() {
    let client = client(vec![
        workflows(&[("Deploy VM", "1")]),
        workflows(&[("Deploy VM", "1")]),
    ]);
    assert!(client.workflow_exists(&endpoint(), "Deploy VM").await.unwrap());
    assert!(!client.workflow_exists(&endpoint(), "deploy vm").await.unwrap());
}

#[tokio::test]
async fn rejected_submission_is_a_transport_error() {
    let mut rejected = HttpResponse::new(400, "bad");
    rejected.status_line = "HTTP/1.1 400 Bad Request".to_string();
    let client = client(vec![workflows(&[("Deploy", "wf-1")]), rejected]);

    let err = client
        .execute(&endpoint(), &waiting("Deploy"), &NoopObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.current_context().kind(), ErrorKind::Transport);
    assert_eq!(err.current_context().status(), Some(400));
    assert!(err.current_context().to_string().contains("400 Bad Request"));
}

#[tokio::test]
async fn validation_reports_server_url_first_without_any_request() {
    let client = client(Vec::new());
    let endpoint = ServerEndpoint::new("", "", "secret");

    let err = client
        .execute(&endpoint, &waiting("Deploy"), &NoopObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err.current_context(),
        ClientError::Validation {
            field: RequiredField::ServerUrl,
            ..
        }
    ));
    assert!(client.transport().requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_poll_aborts_with_transport_error() {
    let client = client(vec![
        workflows(&[("Deploy", "wf-1")]),
        accepted(),
        ok(json!({"state": "running"})),
        HttpResponse::new(503, ""),
    ]);

    let err = client
        .execute(&endpoint(), &waiting("Deploy"), &NoopObserver, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.current_context().kind(), ErrorKind::Transport);
    assert_eq!(err.current_context().status(), Some(503));
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_the_wait() {
    let options = ClientOptions {
        poll: PollPolicy {
            interval_secs: 10,
            timeout_secs: Some(15),
        },
        ..ClientOptions::default()
    };
    let client = client_with(
        vec![
            workflows(&[("Deploy", "wf-1")]),
            accepted(),
            ok(json!({"state": "running"})),
            ok(json!({"state": "running"})),
        ],
        options,
    );

    let err = client
        .execute(&endpoint(), &waiting("Deploy"), &NoopObserver, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.current_context().kind(), ErrorKind::DeadlineExceeded);
}

#[tokio::test]
async fn tenant_uses_a_fresh_bearer_token_per_request() {
    let endpoint = endpoint().with_tenant(Some("acme".to_string()));
    let client = client(vec![
        token("t1"),
        workflows(&[("Deploy", "wf-1")]),
        token("t2"),
        accepted(),
    ]);

    client
        .execute(
            &endpoint,
            &ExecutionRequest::new("Deploy"),
            &NoopObserver,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let requests = client.transport().requests();
    assert_eq!(requests[0].url, format!("{BASE}/identity/api/tokens"));
    let body: JsonValue = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({"username": "admin", "password": "secret", "tenant": "acme"}));
    assert!(
        requests[1]
            .headers
            .contains(&("Authorization".to_string(), "Bearer t1".to_string()))
    );
    assert!(
        requests[3]
            .headers
            .contains(&("Authorization".to_string(), "Bearer t2".to_string()))
    );
}

#[tokio::test]
async fn per_execution_token_is_reused_and_refreshed_once_on_401() {
    let endpoint = endpoint().with_tenant(Some("acme".to_string()));
    let options = ClientOptions {
        token_reuse: TokenReuse::PerExecution,
        ..ClientOptions::default()
    };
    let client = client_with(
        vec![
            token("t1"),
            workflows(&[("Deploy", "wf-1")]),
            unauthorized(),
            token("t2"),
            accepted(),
        ],
        options,
    );

    client
        .execute(
            &endpoint,
            &ExecutionRequest::new("Deploy"),
            &NoopObserver,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let requests = client.transport().requests();
    let token_requests = requests
        .iter()
        .filter(|r| r.url.ends_with("/identity/api/tokens"))
        .count();
    assert_eq!(token_requests, 2);
    assert!(
        requests[2]
            .headers
            .contains(&("Authorization".to_string(), "Bearer t1".to_string()))
    );
    assert!(
        requests[4]
            .headers
            .contains(&("Authorization".to_string(), "Bearer t2".to_string()))
    );
}

#[tokio::test]
async fn repeated_401_is_not_retried_again() {
    let endpoint = endpoint().with_tenant(Some("acme".to_string()));
    let options = ClientOptions {
        token_reuse: TokenReuse::PerExecution,
        ..ClientOptions::default()
    };
    let client = client_with(
        vec![token("t1"), unauthorized(), token("t2"), unauthorized()],
        options,
    );

    let err = client
        .execute(&endpoint, &waiting("Deploy"), &NoopObserver, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.current_context().status(), Some(401));
    assert_eq!(client.transport().requests().len(), 4);
}

#[tokio::test]
async fn fetches_declared_input_parameters() {
    let client = client(vec![ok(json!({
        "name": "Deploy",
        "input-parameters": [
            {"name": "vmName", "type": "string"},
            {"name": "host", "type": "VC:HostSystem"}
        ]
    }))]);
    let id = "wf-1".parse().unwrap();

    let parameters = client.fetch_input_parameters(&endpoint(), &id).await.unwrap();

    let keys: Vec<String> = parameters.iter().map(|p| p.selection_key()).collect();
    assert_eq!(keys, vec!["vmName@string", "host@VC:HostSystem"]);
    assert_eq!(
        client.transport().urls(),
        vec![format!("{BASE}/vco/api/workflows/wf-1")]
    );
}

#[tokio::test]
async fn workflow_without_inputs_declares_none() {
    let client = client(vec![ok(json!({"name": "Deploy"}))]);
    let id = "wf-1".parse().unwrap();
    assert!(client.fetch_input_parameters(&endpoint(), &id).await.unwrap().is_empty());
}
