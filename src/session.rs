//! The session collaborator the client consults for bearer tokens.
//!
//! The client never stores credentials itself. It asks a [`SessionProvider`]
//! for the current token on every attempt, asks it to refresh after a 401, and
//! asks it to sign out when the refresh fails.

use async_trait::async_trait;

/// An authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// The bearer token sent in the `Authorization` header.
    pub access_token: String,
}

impl Session {
    /// Creates a session from an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Error reported by a [`SessionProvider`] when a refresh fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Session refresh failed: {0}")]
pub struct SessionError(pub String);

impl SessionError {
    /// Creates an error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Supplies, refreshes and revokes the session used for authenticated calls.
///
/// Implementations decide where tokens live; the client only relies on this
/// contract.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use resilient_client::{Session, SessionError, SessionProvider};
/// use std::sync::Mutex;
///
/// struct StaticSession(Mutex<Option<String>>);
///
/// #[async_trait]
/// impl SessionProvider for StaticSession {
///     async fn session(&self) -> Option<Session> {
///         self.0.lock().unwrap().clone().map(Session::new)
///     }
///
///     async fn refresh_session(&self) -> Result<Option<Session>, SessionError> {
///         Err(SessionError::new("static sessions cannot be refreshed"))
///     }
///
///     async fn sign_out(&self) {
///         *self.0.lock().unwrap() = None;
///     }
/// }
/// ```
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the active session, or `None` when signed out.
    async fn session(&self) -> Option<Session>;

    /// Obtains a fresh session.
    ///
    /// Both `Err(_)` and `Ok(None)` count as a failed refresh.
    async fn refresh_session(&self) -> Result<Option<Session>, SessionError>;

    /// Ends the session after a refresh could not recover it.
    async fn sign_out(&self);
}
