//! The API client: caching, retries, cancellation and session refresh.
//!
//! The [`Client`] type is the single entry point for network calls.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    cache::ResponseCache,
    request::{Request, RequestOptions},
    retry::RetryStrategy,
    session::SessionProvider,
    transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse},
    ApiError, Response, Result,
};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use url::Url;

/// Emits a tracing event only when `level` is within the client's verbosity.
macro_rules! client_event {
    ($client:expr, $level:expr, $($arg:tt)+) => {
        if $level <= $client.inner.log_level {
            tracing::event!($level, $($arg)+);
        }
    };
}

/// An HTTP/JSON API client with response caching, retries, cancellation and
/// transparent session refresh.
///
/// Create one per process and clone it freely: clones share the response
/// cache, the transport and the session provider.
///
/// # Examples
///
/// ```no_run
/// use resilient_client::{Client, RequestOptions};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct NewPost {
///     title: String,
/// }
///
/// #[derive(Deserialize)]
/// struct Post {
///     id: u64,
///     title: String,
/// }
///
/// # async fn example() -> Result<(), resilient_client::ApiError> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// // Cached GET: the second call does not touch the network.
/// let posts: Vec<Post> = client
///     .get_with("/posts", RequestOptions::new().cached().param("page", 1))
///     .await?;
/// println!("{} posts", posts.len());
///
/// let created: Post = client
///     .post("/posts", &NewPost { title: "Launch day".to_string() })
///     .await?;
/// println!("created {}: {}", created.id, created.title);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    session: Option<Arc<dyn SessionProvider>>,
    base_url: Url,
    default_headers: HeaderMap,
    retry_strategy: RetryStrategy,
    cache: ResponseCache,
    log_level: LevelFilter,
}

/// What a single transport attempt produced, before deciding between
/// returning, retrying and refreshing.
enum Outcome {
    Success {
        status: StatusCode,
        headers: HeaderMap,
        body: serde_json::Value,
    },
    Unauthorized(ApiError),
    Failure(ApiError),
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Executes a request and returns the parsed body with its metadata.
    ///
    /// This is the pipeline every verb goes through:
    ///
    /// 1. GET requests with `use_cache` are answered from the cache when
    ///    possible.
    /// 2. Each attempt builds the URL and headers, attaching the bearer token
    ///    when `use_auth` is set and a session exists.
    /// 3. Server and network errors are retried according to the retry
    ///    strategy; client errors and cancellations are returned at once.
    /// 4. A 401 on an authenticated request refreshes the session once and
    ///    replays the request once. If the refresh fails the session provider
    ///    is signed out and [`ApiError::SessionExpired`] is returned.
    ///
    /// # Errors
    ///
    /// Every failure is an [`ApiError`].
    pub async fn call<T>(&self, request: Request) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let start_time = Instant::now();
        let cache_key = request.cache_key();

        if let Some(key) = &cache_key {
            if let Some(value) = self.inner.cache.get(key) {
                client_event!(self, Level::DEBUG, key = %key, "Serving response from cache");
                let data = self.decode(value)?;
                return Ok(Response {
                    data,
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    latency: start_time.elapsed(),
                    attempts: 0,
                    from_cache: true,
                    refreshed: false,
                });
            }
        }

        let options = request.options();
        let cancel = options.cancel.clone().unwrap_or_default();
        let strategy = self
            .inner
            .retry_strategy
            .with_overrides(options.retries, options.retry_delay);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match self.attempt(&request, None, &cancel, attempt).await {
                Outcome::Success {
                    status,
                    headers,
                    body,
                } => {
                    return self.finish(
                        cache_key,
                        status,
                        headers,
                        body,
                        start_time,
                        attempt,
                        false,
                    );
                }
                Outcome::Unauthorized(error) => match &self.inner.session {
                    Some(session) if options.use_auth => {
                        return self
                            .refresh_and_replay(
                                &request, session, &cancel, cache_key, start_time, attempt,
                            )
                            .await;
                    }
                    _ => error,
                },
                Outcome::Failure(error) => error,
            };

            client_event!(
                self,
                Level::WARN,
                error = %error,
                attempt = attempt,
                method = %request.method(),
                path = %request.path(),
                "Request failed"
            );

            if !error.is_retryable() {
                return Err(error);
            }

            let Some(delay) = strategy.delay_for_attempt(attempt) else {
                return Err(error);
            };

            client_event!(
                self,
                Level::INFO,
                delay_ms = delay.as_millis() as u64,
                attempt = attempt,
                "Retrying request after delay"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Refreshes the session after a 401 and replays the request once.
    ///
    /// The replay's outcome is final: a second 401 is returned as a client
    /// error instead of starting another refresh.
    async fn refresh_and_replay<T>(
        &self,
        request: &Request,
        session: &Arc<dyn SessionProvider>,
        cancel: &CancellationToken,
        cache_key: Option<String>,
        start_time: Instant,
        attempts: usize,
    ) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        client_event!(
            self,
            Level::INFO,
            method = %request.method(),
            path = %request.path(),
            "Received 401, refreshing session"
        );

        let fresh = match session.refresh_session().await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                client_event!(
                    self,
                    Level::WARN,
                    "Session refresh returned no session, signing out"
                );
                session.sign_out().await;
                return Err(ApiError::SessionExpired);
            }
            Err(e) => {
                client_event!(self, Level::WARN, error = %e, "Session refresh failed, signing out");
                session.sign_out().await;
                return Err(ApiError::SessionExpired);
            }
        };

        let attempt = attempts + 1;
        match self
            .attempt(request, Some(&fresh.access_token), cancel, attempt)
            .await
        {
            Outcome::Success {
                status,
                headers,
                body,
            } => self.finish(cache_key, status, headers, body, start_time, attempt, true),
            Outcome::Unauthorized(error) | Outcome::Failure(error) => {
                client_event!(
                    self,
                    Level::WARN,
                    error = %error,
                    path = %request.path(),
                    "Replay after session refresh failed"
                );
                Err(error)
            }
        }
    }

    /// Executes a single transport attempt and classifies the result.
    async fn attempt(
        &self,
        request: &Request,
        token_override: Option<&str>,
        cancel: &CancellationToken,
        attempt: usize,
    ) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::Failure(ApiError::Cancelled);
        }

        let transport_request = match self.build_transport_request(request, token_override).await {
            Ok(transport_request) => transport_request,
            Err(e) => return Outcome::Failure(e),
        };

        client_event!(
            self,
            Level::DEBUG,
            method = %transport_request.method,
            url = %transport_request.url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Failure(ApiError::Cancelled),
            result = self.inner.transport.send(transport_request) => result,
        };

        match result {
            Ok(response) => self.classify_response(response, attempt),
            Err(TransportError::Network(detail)) => {
                client_event!(
                    self,
                    Level::WARN,
                    detail = %detail,
                    attempt = attempt,
                    "Network error"
                );
                Outcome::Failure(ApiError::Network)
            }
            Err(TransportError::Other(detail)) => {
                client_event!(
                    self,
                    Level::ERROR,
                    detail = %detail,
                    attempt = attempt,
                    "Transport failed"
                );
                Outcome::Failure(ApiError::Unknown)
            }
        }
    }

    /// Builds the URL, headers and body for one attempt.
    async fn build_transport_request(
        &self,
        request: &Request,
        token_override: Option<&str>,
    ) -> Result<TransportRequest> {
        let url = self.url_for(request)?;

        let mut headers = self.inner.default_headers.clone();
        for (name, value) in &request.options().headers {
            headers.insert(name.clone(), value.clone());
        }

        let body = match request.wire_body() {
            Some(body) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                Some(body.to_string())
            }
            None => None,
        };

        if request.options().use_auth {
            let token = match token_override {
                Some(token) => Some(token.to_string()),
                None => self.access_token().await,
            };

            // No session: send the request anonymously and let the server decide.
            if let Some(token) = token {
                let mut value = HeaderValue::try_from(format!("Bearer {}", token)).map_err(|e| {
                    ApiError::Configuration(format!("Invalid access token: {}", e))
                })?;
                value.set_sensitive(true);
                headers.insert(header::AUTHORIZATION, value);
            }
        }

        Ok(TransportRequest {
            method: request.method().clone(),
            url,
            headers,
            body,
        })
    }

    async fn access_token(&self) -> Option<String> {
        let session = self.inner.session.as_ref()?;
        session.session().await.map(|s| s.access_token)
    }

    /// Joins the base URL, the request path and the query string.
    fn url_for(&self, request: &Request) -> Result<Url> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let path = request.path();
        let joined = if path.is_empty() || path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };

        let mut url = Url::parse(&joined)?;
        if let Some(query) = request.query_string() {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, query),
                _ => query,
            };
            url.set_query(Some(&query));
        }
        Ok(url)
    }

    fn classify_response(&self, response: TransportResponse, attempt: usize) -> Outcome {
        let status = response.status;

        client_event!(
            self,
            Level::DEBUG,
            status = status.as_u16(),
            attempt = attempt,
            "Received HTTP response"
        );

        if response.is_ok() {
            // 204 carries no body by definition; do not try to parse one.
            if status == StatusCode::NO_CONTENT {
                return Outcome::Success {
                    status,
                    headers: response.headers,
                    body: serde_json::Value::Null,
                };
            }

            return match response.json() {
                Ok(body) => Outcome::Success {
                    status,
                    headers: response.headers,
                    body,
                },
                Err(e) => {
                    client_event!(
                        self,
                        Level::ERROR,
                        error = %e,
                        status = status.as_u16(),
                        "Failed to parse response body"
                    );
                    Outcome::Failure(ApiError::Unknown)
                }
            };
        }

        let (message, code) = error_details(&response);

        if status == StatusCode::UNAUTHORIZED {
            return Outcome::Unauthorized(ApiError::Client {
                status,
                message,
                code,
            });
        }

        if status.is_client_error() {
            client_event!(
                self,
                Level::ERROR,
                status = status.as_u16(),
                response = %response.body,
                "Client error (4xx)"
            );
            Outcome::Failure(ApiError::Client {
                status,
                message,
                code,
            })
        } else if status.is_server_error() {
            client_event!(
                self,
                Level::WARN,
                status = status.as_u16(),
                response = %response.body,
                "Server error (5xx)"
            );
            Outcome::Failure(ApiError::Server {
                status,
                message,
                code,
            })
        } else {
            client_event!(
                self,
                Level::ERROR,
                status = status.as_u16(),
                "Unexpected non-success status"
            );
            Outcome::Failure(ApiError::Unknown)
        }
    }

    /// Decodes a successful body and writes it to the cache when asked to.
    #[allow(clippy::too_many_arguments)]
    fn finish<T>(
        &self,
        cache_key: Option<String>,
        status: StatusCode,
        headers: HeaderMap,
        body: serde_json::Value,
        start_time: Instant,
        attempts: usize,
        refreshed: bool,
    ) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let data = match cache_key {
            Some(key) => {
                let data = self.decode(body.clone())?;
                client_event!(self, Level::DEBUG, key = %key, "Caching response");
                self.inner.cache.insert(key, body);
                data
            }
            None => self.decode(body)?,
        };

        let latency = start_time.elapsed();
        client_event!(
            self,
            Level::INFO,
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            attempts = attempts,
            "Request succeeded"
        );

        Ok(Response {
            data,
            status,
            headers,
            latency,
            attempts,
            from_cache: false,
            refreshed,
        })
    }

    fn decode<T>(&self, value: serde_json::Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(value).map_err(|e| {
            client_event!(self, Level::ERROR, error = %e, "Failed to deserialize response");
            ApiError::Unknown
        })
    }

    async fn send_with<B, T>(
        &self,
        method: Method,
        path: String,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = Request::new(method, path);
        if let Some(body) = body {
            request = request.with_body(body)?;
        }
        let response = self.call(request.with_options(options)).await?;
        Ok(response.data)
    }

    /// Makes a GET request with default options.
    pub async fn get<T>(&self, path: impl Into<String>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.get_with(path, RequestOptions::default()).await
    }

    /// Makes a GET request with the given options.
    pub async fn get_with<T>(&self, path: impl Into<String>, options: RequestOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_with::<(), T>(Method::GET, path.into(), None, options)
            .await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<B, T>(&self, path: impl Into<String>, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_with(path, Some(body), RequestOptions::default())
            .await
    }

    /// Makes a POST request with an optional JSON body and the given options.
    pub async fn post_with<B, T>(
        &self,
        path: impl Into<String>,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with(Method::POST, path.into(), body, options)
            .await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<B, T>(&self, path: impl Into<String>, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.put_with(path, Some(body), RequestOptions::default())
            .await
    }

    /// Makes a PUT request with an optional JSON body and the given options.
    pub async fn put_with<B, T>(
        &self,
        path: impl Into<String>,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with(Method::PUT, path.into(), body, options)
            .await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<B, T>(&self, path: impl Into<String>, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.patch_with(path, Some(body), RequestOptions::default())
            .await
    }

    /// Makes a PATCH request with an optional JSON body and the given options.
    pub async fn patch_with<B, T>(
        &self,
        path: impl Into<String>,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with(Method::PATCH, path.into(), body, options)
            .await
    }

    /// Makes a DELETE request with default options.
    pub async fn delete<T>(&self, path: impl Into<String>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.delete_with(path, RequestOptions::default()).await
    }

    /// Makes a DELETE request with the given options.
    pub async fn delete_with<T>(
        &self,
        path: impl Into<String>,
        options: RequestOptions,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_with::<(), T>(Method::DELETE, path.into(), None, options)
            .await
    }

    /// Removes every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        client_event!(self, Level::DEBUG, "Response cache cleared");
    }

    /// Returns the number of cached responses.
    pub fn cache_size(&self) -> usize {
        self.inner.cache.len()
    }

    /// Returns a fresh cancellation token to pass through
    /// [`RequestOptions::cancel_token`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use resilient_client::{ApiError, Client, RequestOptions};
    ///
    /// # async fn example(client: Client) {
    /// let token = client.create_cancel_token();
    /// let options = RequestOptions::new().cancel_token(token.clone());
    ///
    /// token.cancel();
    /// let result = client.get_with::<serde_json::Value>("/reports", options).await;
    /// assert!(matches!(result, Err(ApiError::Cancelled)));
    /// # }
    /// ```
    pub fn create_cancel_token(&self) -> CancellationToken {
        CancellationToken::new()
    }
}

/// Extracts the server's `message` (or `error`) and `code` from an error body.
fn error_details(response: &TransportResponse) -> (String, Option<String>) {
    let body = response.json().ok();
    let field = |name: &str| body.as_ref().and_then(|b| string_field(b, name));

    let message = field("message")
        .or_else(|| field("error"))
        .unwrap_or_else(|| match response.status.canonical_reason() {
            Some(reason) => reason.to_string(),
            None => format!("Request failed with status {}", response.status.as_u16()),
        });

    (message, field("code"))
}

fn string_field(body: &serde_json::Value, name: &str) -> Option<String> {
    match body.get(name)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use resilient_client::{ClientBuilder, RetryStrategy};
/// use std::time::Duration;
/// use tracing::level_filters::LevelFilter;
///
/// # fn example() -> Result<(), resilient_client::ApiError> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com/v1")?
///     .timeout(Duration::from_secs(30))
///     .retry_strategy(RetryStrategy::Linear {
///         delay: Duration::from_millis(500),
///         max_retries: 1,
///     })
///     .default_header("User-Agent", "dashboard/1.0")?
///     .log_level(LevelFilter::DEBUG)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_strategy: RetryStrategy,
    timeout: Option<Duration>,
    session: Option<Arc<dyn SessionProvider>>,
    transport: Option<Arc<dyn Transport>>,
    log_level: LevelFilter,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            retry_strategy: RetryStrategy::default(),
            timeout: None,
            session: None,
            transport: None,
            log_level: LevelFilter::INFO,
        }
    }

    /// Sets the base URL every request path is appended to.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ApiError::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ApiError::Configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the retry strategy used when a call does not override it.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Sets the request timeout of the default transport.
    ///
    /// Ignored when a custom transport is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the session provider used for bearer tokens and refreshes.
    ///
    /// Without one, requests are sent without `Authorization` and a 401 is an
    /// ordinary client error.
    pub fn session_provider(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    /// Replaces the default reqwest transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Caps the verbosity of the client's own tracing events.
    ///
    /// This only affects diagnostics, never request behaviour.
    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the default
    /// transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| ApiError::Configuration("Base URL is required".to_string()))?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let mut transport = ReqwestTransport::new()?;
                if let Some(timeout) = self.timeout {
                    transport = transport.with_timeout(timeout);
                }
                Arc::new(transport)
            }
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                session: self.session,
                base_url,
                default_headers: self.default_headers,
                retry_strategy: self.retry_strategy,
                cache: ResponseCache::new(),
                log_level: self.log_level,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
