//! Example demonstrating transparent session refresh.
//!
//! A local mock server rejects the stale token with 401 and accepts the
//! refreshed one. The client refreshes once, replays once and returns the
//! replay's result.
//!
//! Run with: `cargo run --example session_refresh`

use async_trait::async_trait;
use resilient_client::{ApiError, Client, Session, SessionError, SessionProvider};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory token store standing in for a real auth service.
struct MemorySession {
    token: Mutex<Option<String>>,
}

#[async_trait]
impl SessionProvider for MemorySession {
    async fn session(&self) -> Option<Session> {
        self.token.lock().unwrap().clone().map(Session::new)
    }

    async fn refresh_session(&self) -> Result<Option<Session>, SessionError> {
        println!("-> refreshing session");
        let fresh = "fresh-token".to_string();
        *self.token.lock().unwrap() = Some(fresh.clone());
        Ok(Some(Session::new(fresh)))
    }

    async fn sign_out(&self) {
        println!("-> signing out");
        *self.token.lock().unwrap() = None;
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter("resilient_client=info")
        .init();

    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedule"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/schedule"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"slot": "09:00"}])))
        .mount(&server)
        .await;

    let session = Arc::new(MemorySession {
        token: Mutex::new(Some("stale-token".to_string())),
    });

    let client = Client::builder()
        .base_url(server.uri())?
        .session_provider(session)
        .build()?;

    let schedule: serde_json::Value = client.get("/schedule").await?;
    println!("Schedule after refresh: {}", schedule);

    Ok(())
}
