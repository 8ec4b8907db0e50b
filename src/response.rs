//! Successful call results with their metadata.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful call: the parsed body plus how it was obtained.
///
/// The verb helpers (`get`, `post`, ...) return only [`Response::data`];
/// [`Client::call`](crate::Client::call) returns the whole value.
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The parsed response body. A 204 decodes from JSON `null`.
    pub data: T,

    /// The HTTP status code. Cache hits report `200 OK`.
    pub status: StatusCode,

    /// The response headers. Empty for cache hits.
    pub headers: HeaderMap,

    /// Time from the start of the call until the body was parsed, including
    /// retry delays and any session refresh.
    pub latency: Duration,

    /// Number of transport calls made, including retries and the replay after
    /// a session refresh. `0` for cache hits.
    pub attempts: usize,

    /// Whether the value was served from the response cache.
    pub from_cache: bool,

    /// Whether a 401 triggered a session refresh and a replay.
    pub refreshed: bool,
}
