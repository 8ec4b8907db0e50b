//! The error type surfaced by every client call.
//!
//! [`ApiError`] is a closed set of outcomes: the rest of an application only
//! ever has to match on these variants. Raw transport errors never escape; the
//! client logs their details and maps them onto [`ApiError::Network`] or
//! [`ApiError::Unknown`].

use http::StatusCode;

/// Status reported for failures that never produced an HTTP response
/// (network, unknown and configuration errors).
pub const NETWORK_ERROR_STATUS: u16 = 0;

/// Status reported for cancelled requests ("client closed request").
pub const CANCELLED_STATUS: u16 = 499;

/// The main error type for API calls.
///
/// Every variant exposes a numeric [`status`](ApiError::status), a
/// human-readable [`message`](ApiError::message) and, when the server supplied
/// one, a machine-readable [`code`](ApiError::code).
///
/// # Examples
///
/// ```no_run
/// use resilient_client::{ApiError, Client};
///
/// # async fn example() -> Result<(), ApiError> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/projects").await {
///     Ok(projects) => println!("{projects}"),
///     Err(ApiError::SessionExpired) => eprintln!("please sign in again"),
///     Err(ApiError::Client { status, message, .. }) => {
///         eprintln!("request rejected ({status}): {message}");
///     }
///     Err(e) => eprintln!("{} (status {})", e.message(), e.status()),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The server rejected the request with a 4xx status.
    ///
    /// Client errors are never retried.
    #[error("{message}")]
    Client {
        /// The HTTP status code
        status: StatusCode,
        /// The server's `message`, or the status reason phrase
        message: String,
        /// The server's machine-readable error code, if any
        code: Option<String>,
    },

    /// A 401 could not be recovered because refreshing the session failed.
    ///
    /// The session provider has already been asked to sign out.
    #[error("Session expired")]
    SessionExpired,

    /// The server failed with a 5xx status after all retries were used.
    #[error("{message}")]
    Server {
        /// The HTTP status code
        status: StatusCode,
        /// The server's `message`, or the status reason phrase
        message: String,
        /// The server's machine-readable error code, if any
        code: Option<String>,
    },

    /// The transport could not complete the exchange (connection refused,
    /// DNS failure, timeout, broken body stream).
    #[error("Network error")]
    Network,

    /// The request was cancelled through its cancellation token.
    #[error("Request was cancelled")]
    Cancelled,

    /// A failure that fits no other variant, such as a success body that is
    /// not valid JSON.
    #[error("An unknown error occurred")]
    Unknown,

    /// The client or the request was configured incorrectly.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Returns `true` if the failure is transient and worth retrying.
    ///
    /// Only server errors and network errors qualify. Client errors,
    /// cancellations and expired sessions will not change on a retry.
    ///
    /// # Examples
    ///
    /// ```
    /// use resilient_client::ApiError;
    /// use http::StatusCode;
    ///
    /// let err = ApiError::Server {
    ///     status: StatusCode::BAD_GATEWAY,
    ///     message: "Bad Gateway".to_string(),
    ///     code: None,
    /// };
    /// assert!(err.is_retryable());
    /// assert!(!ApiError::Cancelled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Server { .. } | ApiError::Network)
    }

    /// Returns the HTTP status of the failure, or a sentinel.
    ///
    /// Failures without a response report [`NETWORK_ERROR_STATUS`];
    /// cancellations report [`CANCELLED_STATUS`].
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Client { status, .. } | ApiError::Server { status, .. } => status.as_u16(),
            ApiError::SessionExpired => StatusCode::UNAUTHORIZED.as_u16(),
            ApiError::Cancelled => CANCELLED_STATUS,
            ApiError::Network
            | ApiError::Unknown
            | ApiError::Configuration(_)
            | ApiError::InvalidUrl(_) => NETWORK_ERROR_STATUS,
        }
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns the server-supplied error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Client { code, .. } | ApiError::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_messages() {
        assert_eq!(ApiError::Cancelled.message(), "Request was cancelled");
        assert_eq!(ApiError::Network.message(), "Network error");
        assert_eq!(ApiError::Unknown.message(), "An unknown error occurred");
        assert_eq!(ApiError::SessionExpired.message(), "Session expired");
    }

    #[test]
    fn test_status_sentinels() {
        assert_eq!(ApiError::SessionExpired.status(), 401);
        assert_eq!(ApiError::Cancelled.status(), CANCELLED_STATUS);
        assert_eq!(ApiError::Network.status(), NETWORK_ERROR_STATUS);
        assert_eq!(ApiError::Unknown.status(), NETWORK_ERROR_STATUS);
    }

    #[test]
    fn test_server_message_and_code() {
        let err = ApiError::Client {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "Title is required".to_string(),
            code: Some("validation_failed".to_string()),
        };
        assert_eq!(err.status(), 422);
        assert_eq!(err.message(), "Title is required");
        assert_eq!(err.code(), Some("validation_failed"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classes() {
        let server = ApiError::Server {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "Service Unavailable".to_string(),
            code: None,
        };
        assert!(server.is_retryable());
        assert!(ApiError::Network.is_retryable());
        assert!(!ApiError::Unknown.is_retryable());
        assert!(!ApiError::SessionExpired.is_retryable());
        assert!(!ApiError::Configuration("x".to_string()).is_retryable());
    }
}
