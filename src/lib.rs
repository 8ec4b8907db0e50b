//! # resilient-client - the single chokepoint for API calls
//!
//! A JSON-over-HTTP client for dashboards and services that talk to one
//! remote API. Every call goes through the same pipeline: response caching,
//! retries for transient failures, cancellation, and transparent session
//! refresh when the server answers 401.
//!
//! ## Quick Start
//!
//! ```no_run
//! use resilient_client::{Client, RequestOptions};
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct Campaign {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), resilient_client::ApiError> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     let options = RequestOptions::new()
//!         .cached()
//!         .retries(2)
//!         .retry_delay(Duration::from_millis(250));
//!
//!     let campaigns: Vec<Campaign> = client.get_with("/campaigns", options).await?;
//!     for campaign in &campaigns {
//!         println!("{}: {}", campaign.id, campaign.name);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Every failure is an [`ApiError`]:
//!
//! - 4xx responses are [`ApiError::Client`] and are never retried.
//! - 5xx responses ([`ApiError::Server`]) and connectivity failures
//!   ([`ApiError::Network`]) are retried per the [`RetryStrategy`].
//! - A 401 on an authenticated call asks the [`SessionProvider`] to refresh
//!   once and replays the request once. A failed refresh signs the session
//!   out and returns [`ApiError::SessionExpired`].
//! - Cancelling the call's token yields [`ApiError::Cancelled`].
//! - Anything else is [`ApiError::Unknown`]; details go to the log, not to
//!   the caller.
//!
//! ## Logging
//!
//! The client emits `tracing` events. [`ClientBuilder::log_level`] caps
//! their verbosity without changing any behaviour.

mod cache;
mod client;
mod error;
pub mod request;
mod response;
pub mod retry;
pub mod session;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use error::{ApiError, Result, CANCELLED_STATUS, NETWORK_ERROR_STATUS};
pub use request::{Request, RequestOptions};
pub use response::Response;
pub use retry::RetryStrategy;
pub use session::{Session, SessionError, SessionProvider};
pub use tokio_util::sync::CancellationToken;
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
