//! Request descriptors and per-call configuration.

use crate::{ApiError, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::fmt::Display;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::form_urlencoded;

/// Per-call configuration.
///
/// Every field is optional in spirit: [`RequestOptions::default`] attaches
/// the bearer token, skips the cache and uses the client's retry strategy.
///
/// # Examples
///
/// ```
/// use resilient_client::RequestOptions;
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .cached()
///     .retries(2)
///     .retry_delay(Duration::from_millis(250))
///     .param("status", "scheduled")
///     .param("page", 2);
///
/// assert!(options.use_cache);
/// assert_eq!(options.params.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Attach `Authorization: Bearer <token>` from the session provider.
    pub use_auth: bool,

    /// Consult and populate the response cache. Only GET requests use it.
    pub use_cache: bool,

    /// Additional attempts after the first one. `None` uses the client's
    /// retry strategy.
    pub retries: Option<usize>,

    /// Base delay between retries. `None` uses the client's retry strategy.
    pub retry_delay: Option<Duration>,

    /// Caller-supplied cancellation handle. When absent the client creates
    /// one that only it can see.
    pub cancel: Option<CancellationToken>,

    /// Query parameters, serialized in insertion order.
    pub params: Vec<(String, String)>,

    /// Extra headers for this request.
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            use_auth: true,
            use_cache: false,
            retries: None,
            retry_delay: None,
            cancel: None,
            params: Vec::new(),
            headers: HeaderMap::new(),
        }
    }
}

impl RequestOptions {
    /// Creates options with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the bearer token is attached.
    pub fn use_auth(mut self, use_auth: bool) -> Self {
        self.use_auth = use_auth;
        self
    }

    /// Sends the request without an `Authorization` header.
    pub fn without_auth(self) -> Self {
        self.use_auth(false)
    }

    /// Sets whether the response cache is used.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Serves the request from the response cache when possible.
    pub fn cached(self) -> Self {
        self.use_cache(true)
    }

    /// Sets the number of additional attempts after the first one.
    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Sets the base delay between retries.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Uses `token` to cancel the request.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Appends a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Appends several query parameters, keeping their order.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Display,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ApiError::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ApiError::Configuration(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// An immutable description of one logical request.
///
/// Built with [`Request::new`] and the consuming `with_*` methods, then
/// handed to [`Client::call`](crate::Client::call).
///
/// # Examples
///
/// ```
/// use resilient_client::{Request, RequestOptions};
/// use http::Method;
///
/// let request = Request::new(Method::POST, "/posts")
///     .with_body(&serde_json::json!({ "title": "Launch day" }))?
///     .with_options(RequestOptions::new().retries(1));
///
/// assert_eq!(request.path(), "/posts");
/// assert!(request.body().is_some());
/// # Ok::<(), resilient_client::ApiError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    body: Option<String>,
    options: RequestOptions,
}

impl Request {
    /// Creates a request with default options and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    /// Attaches a JSON body. GET requests never send one.
    ///
    /// The body is serialized once, here, so struct fields keep their
    /// declaration order on the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized to JSON.
    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let json = serde_json::to_string(body).map_err(|e| {
            ApiError::Configuration(format!("Failed to serialize request: {}", e))
        })?;
        self.body = Some(json);
        Ok(self)
    }

    /// Replaces the request options.
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path relative to the client's base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The serialized JSON body, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// The per-call options.
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// The body that goes on the wire: GET requests drop theirs.
    pub(crate) fn wire_body(&self) -> Option<&str> {
        if self.method == Method::GET {
            None
        } else {
            self.body.as_deref()
        }
    }

    /// The form-encoded query string without the leading `?`.
    pub(crate) fn query_string(&self) -> Option<String> {
        if self.options.params.is_empty() {
            return None;
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.options.params.iter())
            .finish();
        Some(query)
    }

    /// The cache key, for GET requests that asked for caching.
    pub(crate) fn cache_key(&self) -> Option<String> {
        if self.method != Method::GET || !self.options.use_cache {
            return None;
        }

        let mut key = format!("{} {}", self.method, self.path);
        if let Some(query) = self.query_string() {
            key.push('?');
            key.push_str(&query);
        }
        Some(key)
    }
}
