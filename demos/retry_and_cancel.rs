//! Example demonstrating retries and cancellation.
//!
//! Run with: `cargo run --example retry_and_cancel`

use resilient_client::{ApiError, Client, RequestOptions, RetryStrategy};
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter("resilient_client=debug")
        .init();

    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/render"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/video"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())?
        .retry_strategy(RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            max_retries: 3,
            jitter: true,
        })
        .log_level(LevelFilter::DEBUG)
        .build()?;

    println!("=== Retries ===");
    match client.get::<serde_json::Value>("/render").await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Gave up: {} (status {})", e, e.status()),
    }
    println!();

    println!("=== Constant delay override ===");
    let options = RequestOptions::new()
        .retries(1)
        .retry_delay(Duration::from_millis(50));
    let err = client
        .get_with::<serde_json::Value>("/render", options)
        .await
        .unwrap_err();
    println!("Gave up: {}", err);
    println!();

    println!("=== Cancellation ===");
    let token = client.create_cancel_token();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    match client
        .get_with::<serde_json::Value>("/video", RequestOptions::new().cancel_token(token))
        .await
    {
        Err(ApiError::Cancelled) => println!("Video request cancelled"),
        other => println!("Unexpected: {:?}", other),
    }

    Ok(())
}
