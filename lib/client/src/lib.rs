//! Workflow execution client for remote orchestrator servers.
//!
//! This crate provides:
//! - [`WorkflowExecutionClient`]: list, resolve, submit, poll and fetch
//! - The tagged-value codec for input and output parameters
//! - Basic and tenant-scoped bearer authentication
//! - An [`HttpTransport`] seam with a `reqwest` implementation
//!
//! # Example
//!
//! ```no_run
//! use orchestrator_runner_client::{
//!     ClientOptions, ExecutionRequest, InputParameter, ParameterType, ServerEndpoint,
//!     TracingObserver, WorkflowExecutionClient,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), rootcause::Report<orchestrator_runner_client::ClientError>> {
//! let client = WorkflowExecutionClient::from_options(ClientOptions::default())?;
//! let endpoint = ServerEndpoint::new("https://vro.example.com:8281", "admin", "secret");
//! let request = ExecutionRequest::new("Deploy VM")
//!     .with_input(InputParameter::new("vmName", ParameterType::String, "web-01"))
//!     .wait_for_completion(true);
//!
//! let result = client
//!     .execute(&endpoint, &request, &TracingObserver, &CancellationToken::new())
//!     .await?;
//! println!("{:?}", result.state());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod model;
pub mod observer;
pub mod options;
pub mod poll;
pub mod transport;

pub use auth::{AuthProvider, TokenReuse};
pub use client::WorkflowExecutionClient;
pub use codec::{InputParameter, ParameterDescriptor, ParameterType};
pub use endpoint::ServerEndpoint;
pub use error::{ClientError, ErrorKind, RequiredField};
pub use model::{
    EXECUTION_EXCEPTION_KEY, EXECUTION_OUTPUT_KEY, EXECUTION_STATE_KEY, ExecutionRequest,
    ExecutionResult, ExecutionState, ExecutionStatus, WorkflowRef,
};
pub use observer::{ExecutionEvent, ExecutionObserver, NoopObserver, TracingObserver};
pub use options::ClientOptions;
pub use poll::PollPolicy;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, TlsPolicy};
