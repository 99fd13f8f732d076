//! `Authorization` header construction.
//!
//! Without a tenant the header carries basic credentials. With a tenant the
//! credentials are exchanged for a bearer token at the identity endpoint.

use crate::endpoint::ServerEndpoint;
use crate::error::ClientError;
use crate::transport::HttpTransport;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tokio::sync::Mutex;
use tracing::debug;

/// How bearer tokens are reused within one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenReuse {
    /// Exchange credentials before every authenticated request.
    #[default]
    PerRequest,
    /// Keep one token for the whole execution. A rejected token is dropped
    /// and replaced exactly once.
    PerExecution,
}

/// Produces `Authorization` header values for one server.
#[derive(Debug)]
pub struct AuthProvider {
    reuse: TokenReuse,
    cached: Mutex<Option<String>>,
}

impl AuthProvider {
    #[must_use]
    pub fn new(reuse: TokenReuse) -> Self {
        Self {
            reuse,
            cached: Mutex::new(None),
        }
    }

    /// Returns true if a rejected header may be fixed by re-authenticating.
    #[must_use]
    pub fn is_caching(&self, endpoint: &ServerEndpoint) -> bool {
        endpoint.uses_token_auth() && self.reuse == TokenReuse::PerExecution
    }

    /// Returns the header value for the next request.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Auth` if the token exchange fails or its response
    /// has no `id`.
    pub async fn authorization<T: HttpTransport + ?Sized>(
        &self,
        transport: &T,
        endpoint: &ServerEndpoint,
    ) -> Result<String, Report<ClientError>> {
        if !endpoint.uses_token_auth() {
            return Ok(basic_authorization(endpoint));
        }
        if !self.is_caching(endpoint) {
            return Ok(bearer(&fetch_token(transport, endpoint).await?));
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(bearer(token));
        }
        let token = fetch_token(transport, endpoint).await?;
        let header = bearer(&token);
        *cached = Some(token);
        Ok(header)
    }

    /// Drops any cached token so the next request re-authenticates.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

/// Returns `Basic base64(username:password)`.
#[must_use]
pub fn basic_authorization(endpoint: &ServerEndpoint) -> String {
    let credentials = format!("{}:{}", endpoint.username(), endpoint.password());
    format!("Basic {}", STANDARD.encode(credentials))
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

async fn fetch_token<T: HttpTransport + ?Sized>(
    transport: &T,
    endpoint: &ServerEndpoint,
) -> Result<String, Report<ClientError>> {
    let url = endpoint.token_url()?;
    let auth_failed = |reason: String| ClientError::Auth {
        endpoint: url.clone(),
        reason,
    };

    let body = json!({
        "username": endpoint.username(),
        "password": endpoint.password(),
        "tenant": endpoint.tenant().unwrap_or_default(),
    });
    let headers = vec![
        ("Accept".to_string(), "application/json".to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ];

    debug!(endpoint = %url, "requesting bearer token");
    let response = transport
        .post(&url, headers, body.to_string())
        .await
        .map_err(|e| auth_failed(e.current_context().to_string()))?;
    let document: JsonValue = serde_json::from_str(&response)
        .map_err(|e| auth_failed(format!("token response is not JSON: {e}")))?;

    match document.get("id").and_then(JsonValue::as_str) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(auth_failed("token response has no 'id'".to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::{HttpRequest, HttpResponse};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct TokenServer {
        responses: StdMutex<VecDeque<HttpResponse>>,
        requests: StdMutex<Vec<HttpRequest>>,
    }

    impl TokenServer {
        fn with(responses: Vec<HttpResponse>) -> Self {
            Self {
                responses: StdMutex::new(responses.into()),
                requests: StdMutex::default(),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for TokenServer {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Report<ClientError>> {
            self.requests.lock().unwrap().push(request);
            Ok(self.responses.lock().unwrap().pop_front().expect("scripted response"))
        }
    }

    fn tenant_endpoint() -> ServerEndpoint {
        ServerEndpoint::new("https://vra.local", "admin", "pw").with_tenant(Some("acme".to_string()))
    }

    #[tokio::test]
    async fn basic_auth_without_tenant() {
        let transport = TokenServer::default();
        let endpoint = ServerEndpoint::new("https://vro.local", "user", "pass");
        let header = AuthProvider::new(TokenReuse::PerRequest)
            .authorization(&transport, &endpoint)
            .await
            .unwrap();
        assert_eq!(header, "Basic dXNlcjpwYXNz");
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exchanges_credentials_for_bearer_token() {
        let transport = TokenServer::with(vec![HttpResponse::new(200, r#"{"id":"tok-1"}"#)]);
        let header = AuthProvider::new(TokenReuse::PerRequest)
            .authorization(&transport, &tenant_endpoint())
            .await
            .unwrap();
        assert_eq!(header, "Bearer tok-1");

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://vra.local/identity/api/tokens");
        let body: JsonValue = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"username": "admin", "password": "pw", "tenant": "acme"}));
    }

    #[tokio::test]
    async fn per_request_fetches_every_time() {
        let transport = TokenServer::with(vec![
            HttpResponse::new(200, r#"{"id":"a"}"#),
            HttpResponse::new(200, r#"{"id":"b"}"#),
        ]);
        let auth = AuthProvider::new(TokenReuse::PerRequest);
        let endpoint = tenant_endpoint();
        assert_eq!(auth.authorization(&transport, &endpoint).await.unwrap(), "Bearer a");
        assert_eq!(auth.authorization(&transport, &endpoint).await.unwrap(), "Bearer b");
    }

    #[tokio::test]
    async fn per_execution_caches_until_invalidated() {
        let transport = TokenServer::with(vec![
            HttpResponse::new(200, r#"{"id":"a"}"#),
            HttpResponse::new(200, r#"{"id":"b"}"#),
        ]);
        let auth = AuthProvider::new(TokenReuse::PerExecution);
        let endpoint = tenant_endpoint();
        assert!(auth.is_caching(&endpoint));
        assert_eq!(auth.authorization(&transport, &endpoint).await.unwrap(), "Bearer a");
        assert_eq!(auth.authorization(&transport, &endpoint).await.unwrap(), "Bearer a");
        auth.invalidate().await;
        assert_eq!(auth.authorization(&transport, &endpoint).await.unwrap(), "Bearer b");
        assert_eq!(transport.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_id_is_an_auth_error() {
        let transport = TokenServer::with(vec![HttpResponse::new(200, r#"{"token":"x"}"#)]);
        let err = AuthProvider::new(TokenReuse::PerRequest)
            .authorization(&transport, &tenant_endpoint())
            .await
            .unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_an_auth_error() {
        let transport = TokenServer::with(vec![HttpResponse::new(503, "")]);
        let err = AuthProvider::new(TokenReuse::PerRequest)
            .authorization(&transport, &tenant_endpoint())
            .await
            .unwrap_err();
        assert_eq!(err.current_context().kind(), ErrorKind::Auth);
        assert!(err.current_context().to_string().contains("identity/api/tokens"));
    }
}
