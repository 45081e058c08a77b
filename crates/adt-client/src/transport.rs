//! HTTP transport
//!
//! One pooled `reqwest` client per connection profile:
//! - TLS policy from the profile (self-signed certificates opt-in)
//! - Cookie storage for server-assigned session cookies
//! - Idle connection pooling
//!
//! Responses are read fully into a [`RawResponse`]; transport failures are
//! classified into [`AdtError`] values that carry no foreign error types.

use adt_core::session::USER_AGENT;
use adt_core::{AdtError, AdtResult, ConnectionProfile, ConnectivityKind, RequestHeaders};
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::Method;
use std::error::Error as StdError;
use std::time::Duration;

/// Idle connections kept per host
const POOL_MAX_IDLE_PER_HOST: usize = 10;

/// How long an idle pooled connection is kept
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Fully-read HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Body decoded as text
    pub body: String,
}

impl RawResponse {
    /// 200 or 304
    #[inline]
    #[must_use]
    pub fn is_ok_or_not_modified(&self) -> bool {
        self.status == 200 || self.status == 304
    }

    /// Any 2xx
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value as text, case-insensitive
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Classify a non-success response
    ///
    /// `context` names the operation or object for the message.
    #[must_use]
    pub fn into_error(self, context: &str) -> AdtError {
        classify_status(self.status, context, self.body)
    }
}

/// Map an HTTP status to the error taxonomy
#[must_use]
pub fn classify_status(status: u16, context: &str, body: String) -> AdtError {
    match status {
        401 => AdtError::Authentication(format!(
            "invalid credentials or expired session during {context}"
        )),
        403 => AdtError::Authorization(format!("insufficient permissions for {context}")),
        404 => AdtError::NotFound(context.to_string()),
        409 => AdtError::conflict(adt_core::ConflictKind::AlreadyExists, context, body),
        500..=599 => AdtError::Server { status, body },
        _ => AdtError::UnexpectedStatus {
            status,
            context: context.to_string(),
            body,
        },
    }
}

/// One outbound request
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: RequestHeaders,
    body: Option<String>,
    timeout: Option<Duration>,
}

impl OutboundRequest {
    /// Create request for an absolute URL
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>, headers: RequestHeaders) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers,
            body: None,
            timeout: None,
        }
    }

    /// Append a query parameter, encoded on send
    #[must_use]
    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// With body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// With explicitly empty body, sent as `Content-Length: 0`
    #[must_use]
    pub fn with_empty_body(mut self) -> Self {
        self.body = Some(String::new());
        self
    }

    /// With header
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// With per-request timeout overriding the client default
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Target URL without query
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Configured HTTP client for one profile
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    host: String,
}

impl Transport {
    /// Build transport from profile
    ///
    /// # Errors
    /// - `AdtError::Config` if the TLS backend cannot be initialized
    pub fn new(profile: &ConnectionProfile) -> AdtResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(profile.allow_self_signed())
            .timeout(profile.request_timeout())
            .connect_timeout(profile.connect_timeout())
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AdtError::Config(format!("failed to build HTTP client: {e}")))?;

        if profile.allow_self_signed() {
            tracing::warn!(
                "TLS certificate verification disabled for {}",
                profile.host()
            );
        }

        Ok(Self {
            http,
            host: profile.host().to_string(),
        })
    }

    /// Host this transport talks to, for diagnostics
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Send request and read the full response
    ///
    /// # Errors
    /// - `AdtError::Transport` when no response was received
    pub async fn send(&self, request: OutboundRequest) -> AdtResult<RawResponse> {
        let method = request.method.clone();
        let url = request.url.clone();
        self.execute(request).await.map_err(|e| {
            tracing::debug!("{} {} failed: {}", method, url, error_chain(&e));
            AdtError::Transport(format!("{method} {url}: {}", error_chain(&e)))
        })
    }

    /// Send request and classify a missing response as a connectivity failure
    ///
    /// # Errors
    /// - `AdtError::Connectivity` with the classified cause
    pub async fn probe(&self, request: OutboundRequest) -> AdtResult<RawResponse> {
        self.execute(request).await.map_err(|e| {
            let kind = classify_connectivity(&e);
            AdtError::connectivity(kind, self.host.clone(), error_chain(&e))
        })
    }

    async fn execute(&self, request: OutboundRequest) -> Result<RawResponse, reqwest::Error> {
        let mut builder = self.http.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        match request.body {
            // reqwest omits the header for a zero-length body
            Some(body) if body.is_empty() => builder = builder.header(CONTENT_LENGTH, "0"),
            Some(body) => builder = builder.body(body),
            None => {}
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Classify a failed request by its error chain
#[must_use]
pub fn classify_connectivity(error: &reqwest::Error) -> ConnectivityKind {
    let chain = error_chain(error).to_lowercase();
    classify_message(&chain, error.is_timeout())
}

fn classify_message(chain: &str, timed_out: bool) -> ConnectivityKind {
    if chain.contains("refused") {
        ConnectivityKind::Refused
    } else if timed_out || chain.contains("timed out") || chain.contains("timeout") {
        ConnectivityKind::TimedOut
    } else if chain.contains("dns error")
        || chain.contains("failed to lookup address")
        || chain.contains("no such host")
        || chain.contains("name or service not known")
    {
        ConnectivityKind::NameResolution
    } else if chain.contains("connection closed before message completed")
        || chain.contains("eof")
        || chain.contains("connection reset")
    {
        ConnectivityKind::ClosedImmediately
    } else {
        ConnectivityKind::Other
    }
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
