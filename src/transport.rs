//! The request/response primitive underneath the client.
//!
//! [`Client`](crate::Client) builds a [`TransportRequest`], hands it to a
//! [`Transport`] and classifies whatever comes back. [`ReqwestTransport`] is
//! the default; any implementation of the trait can be substituted, which is
//! also how tests inject failures that a mock server cannot produce.
//!
//! Cancellation is not part of the contract: the client stops an in-flight
//! call by dropping the future returned from [`Transport::send`].

use crate::{ApiError, Result};
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use url::Url;

/// A fully built request, ready to go on the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL, query string included.
    pub url: Url,
    /// All request headers, `Authorization` and `Content-Type` included.
    pub headers: HeaderMap,
    /// The serialized JSON body.
    pub body: Option<String>,
}

/// A response whose body has been read in full.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The raw response body.
    pub body: String,
}

impl TransportResponse {
    /// Returns `true` for 2xx statuses.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }
}

/// Why a transport could not produce a response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connectivity failure: connect, DNS, timeout or a broken body stream.
    ///
    /// Surfaces as [`ApiError::Network`] and is retryable.
    #[error("network failure: {0}")]
    Network(String),

    /// Anything else. Surfaces as [`ApiError::Unknown`].
    #[error("transport failure: {0}")]
    Other(String),
}

/// Sends one request and returns the complete response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the exchange.
    ///
    /// Non-2xx statuses are responses, not errors: only failures to obtain a
    /// response at all are reported as [`TransportError`].
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
///
/// Connection pooling, TLS and HTTP/2 are reqwest's business.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built (for example
    /// when no TLS backend is available).
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder().build().map_err(|e| {
            ApiError::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self::from_client(http_client))
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            timeout: None,
        }
    }

    /// Sets a per-request timeout. Timeouts surface as network failures.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, TransportError> {
        let mut builder = self
            .http_client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        TransportError::Network(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
