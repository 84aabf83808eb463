//! FHIR REST transport.
//!
//! Issues one HTTP request per call and normalizes every outcome into a
//! [`FhirResponse`]. Nothing in here knows about bundles or scoring.

use crate::fhir::outcome::{codes, FhirResponse, OutcomeIssue, FHIR_JSON};
use crate::types::{Error, FhirConfig, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::time::Duration;

/// Query string pairs, in the order they are sent.
pub type QueryParams = Vec<(String, String)>;

// =============================================================================
// Endpoint
// =============================================================================

/// Where and how to reach a FHIR server. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    user_agent: String,
}

impl Endpoint {
    /// Build an endpoint. Trailing slashes on `base_url` are dropped and an
    /// empty token counts as no token.
    pub fn new(base_url: &str, auth_token: Option<String>, config: &FhirConfig) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.filter(|t| !t.is_empty()),
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve a relative path against the base URL with exactly one `/`
    /// between them.
    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// Join `base` and `path` with exactly one separating slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// =============================================================================
// Transport seam
// =============================================================================

/// Anything that can answer FHIR REST requests.
///
/// Implementations must never fail past this boundary: every failure comes
/// back as [`FhirResponse::Failure`].
#[async_trait]
pub trait FhirTransport: Send + Sync {
    /// Base URL requests are resolved against.
    fn base_url(&self) -> &str;

    async fn execute(&self, method: Method, path: &str, query: &[(String, String)]) -> FhirResponse;

    async fn get(&self, path: &str, query: &[(String, String)]) -> FhirResponse {
        self.execute(Method::GET, path, query).await
    }
}

// =============================================================================
// reqwest-backed client
// =============================================================================

/// Connected FHIR client. Owns one connection pool for its whole lifetime;
/// the pool is released on [`FhirClient::close`] or drop.
#[derive(Debug)]
pub struct FhirClient {
    endpoint: Endpoint,
    http: reqwest::Client,
    headers: HeaderMap,
}

impl FhirClient {
    /// Open the connection pool for `endpoint`.
    pub fn connect(endpoint: Endpoint) -> Result<Self> {
        let headers = build_headers(endpoint.auth_token())?;
        let http = reqwest::Client::builder()
            .timeout(endpoint.timeout)
            .connect_timeout(endpoint.connect_timeout)
            .user_agent(endpoint.user_agent.clone())
            .build()?;

        tracing::debug!(base_url = %endpoint.base_url, "FHIR client opened");
        Ok(Self {
            endpoint,
            http,
            headers,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Release the connection pool.
    pub fn close(self) {
        tracing::debug!(base_url = %self.endpoint.base_url, "FHIR client closed");
    }

    async fn send(&self, method: Method, url: &str, query: &[(String, String)]) -> FhirResponse {
        tracing::debug!("FHIR {} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .headers(self.headers.clone());
        if !query.is_empty() {
            request = request.query(query);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return FhirResponse::Failure(transport_failure(url, &e)),
        };

        if let Some(issue) = status_failure(response.status()) {
            tracing::debug!("FHIR {} -> {} ({})", url, response.status(), issue.code);
            return FhirResponse::Failure(issue);
        }

        match response.bytes().await {
            Ok(body) => decode_body(url, &body),
            Err(e) => FhirResponse::Failure(transport_failure(url, &e)),
        }
    }
}

#[async_trait]
impl FhirTransport for FhirClient {
    fn base_url(&self) -> &str {
        self.endpoint.base_url()
    }

    async fn execute(&self, method: Method, path: &str, query: &[(String, String)]) -> FhirResponse {
        let url = self.endpoint.url_for(path);
        self.send(method, &url, query).await
    }
}

fn build_headers(auth_token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(FHIR_JSON));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FHIR_JSON));
    if let Some(token) = auth_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            Error::validation("auth_token contains characters not allowed in a header")
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Map a non-success HTTP status to an issue. `None` means "read the body".
fn status_failure(status: StatusCode) -> Option<OutcomeIssue> {
    match status {
        StatusCode::NOT_FOUND => Some(OutcomeIssue::error(codes::NOT_FOUND, "Resource not found")),
        StatusCode::UNAUTHORIZED => {
            Some(OutcomeIssue::error(codes::SECURITY, "Authentication required"))
        }
        StatusCode::FORBIDDEN => Some(OutcomeIssue::error(codes::FORBIDDEN, "Access forbidden")),
        s if s.is_client_error() || s.is_server_error() => {
            Some(OutcomeIssue::error(codes::EXCEPTION, format!("HTTP error: {s}")))
        }
        _ => None,
    }
}

fn transport_failure(url: &str, err: &reqwest::Error) -> OutcomeIssue {
    if err.is_timeout() {
        tracing::warn!("Request timed out: {}", url);
        OutcomeIssue::error(codes::TIMEOUT, "Request timed out")
    } else {
        tracing::error!("HTTP error on {}: {}", url, err);
        OutcomeIssue::error(codes::EXCEPTION, format!("HTTP error: {err}"))
    }
}

fn decode_body(url: &str, body: &Bytes) -> FhirResponse {
    match serde_json::from_slice(body) {
        Ok(value) => FhirResponse::Success(value),
        Err(e) => {
            tracing::error!("Invalid JSON from {}: {}", url, e);
            FhirResponse::Failure(OutcomeIssue::error(codes::INVALID, format!("Invalid JSON: {e}")))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
