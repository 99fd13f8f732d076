//! HTTP transport seam.
//!
//! The client talks to the server only through [`HttpTransport`], so tests can
//! substitute a scripted transport. [`ReqwestTransport`] is the production
//! implementation.

use crate::error::ClientError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP status signalling an accepted execution submission.
pub const ACCEPTED: u16 = 202;
/// HTTP status signalling a rejected credential or token.
pub const UNAUTHORIZED: u16 = 401;

/// Certificate trust policy for outbound TLS connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsPolicy {
    /// Accept self-signed and otherwise untrusted certificates. On-premises
    /// servers commonly run behind an internal CA.
    #[default]
    AcceptInvalidCertificates,
    /// Verify certificates against the system roots.
    Verify,
}

impl TlsPolicy {
    #[must_use]
    pub fn accepts_invalid_certificates(&self) -> bool {
        matches!(self, Self::AcceptInvalidCertificates)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// A response as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// e.g. `HTTP/1.1 500 Internal Server Error`.
    pub status_line: String,
    pub body: String,
    /// Every `Location` header value, in order.
    pub locations: Vec<String>,
}

impl HttpResponse {
    /// Creates a response with a default status line.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_line: format!("HTTP/1.1 {status}"),
            body: body.into(),
            locations: Vec::new(),
        }
    }

    /// Adds a `Location` header value.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.locations.push(location.into());
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn unexpected(&self, url: &str) -> ClientError {
        ClientError::Transport {
            endpoint: url.to_string(),
            status: Some(self.status),
            reason: self.status_line.clone(),
        }
    }
}

/// Sends HTTP requests on behalf of the client.
///
/// Implementors only provide [`send`](Self::send). A response with any status
/// is `Ok`; only failures to get a response at all are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a request and returns whatever the server answered.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Report<ClientError>>;

    /// GETs a URL and returns the body of a 2xx response.
    async fn get(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
    ) -> Result<String, Report<ClientError>> {
        let response = self
            .send(HttpRequest {
                method: Method::Get,
                url: url.to_string(),
                headers,
                body: None,
            })
            .await?;
        if !response.is_success() {
            return Err(response.unexpected(url).into());
        }
        Ok(response.body)
    }

    /// POSTs a body and returns the body of a 2xx response.
    async fn post(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        body: String,
    ) -> Result<String, Report<ClientError>> {
        let response = self
            .send(HttpRequest {
                method: Method::Post,
                url: url.to_string(),
                headers,
                body: Some(body),
            })
            .await?;
        if !response.is_success() {
            return Err(response.unexpected(url).into());
        }
        Ok(response.body)
    }

    /// POSTs a body and returns the first `Location` header.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` unless the status is exactly 202 and
    /// a `Location` header is present.
    async fn post_for_location(
        &self,
        url: &str,
        headers: Vec<(String, String)>,
        body: String,
    ) -> Result<String, Report<ClientError>> {
        let response = self
            .send(HttpRequest {
                method: Method::Post,
                url: url.to_string(),
                headers,
                body: Some(body),
            })
            .await?;
        if response.status != ACCEPTED {
            return Err(response.unexpected(url).into());
        }
        response.locations.into_iter().next().ok_or_else(|| {
            ClientError::Transport {
                endpoint: url.to_string(),
                status: Some(response.status),
                reason: "accepted without a Location header".to_string(),
            }
            .into()
        })
    }
}

/// Transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport with the given trust policy and per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Transport` if the TLS backend fails to initialize.
    pub fn new(tls: TlsPolicy, timeout: Option<Duration>) -> Result<Self, Report<ClientError>> {
        let mut builder =
            reqwest::Client::builder().danger_accept_invalid_certs(tls.accepts_invalid_certificates());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ClientError::Transport {
            endpoint: String::new(),
            status: None,
            reason: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Report<ClientError>> {
        let failed = |e: reqwest::Error| ClientError::Transport {
            endpoint: request.url.clone(),
            status: e.status().map(|s| s.as_u16()),
            reason: e.to_string(),
        };

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(failed)?;
        let status = response.status();
        let status_line = format!("{:?} {status}", response.version());
        let locations = response
            .headers()
            .get_all(reqwest::header::LOCATION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();
        let body = response.text().await.map_err(failed)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_line,
            body,
            locations,
        })
    }
}
