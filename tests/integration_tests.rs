//! Integration tests using wiremock to simulate the remote API.

use resilient_client::{ApiError, Client, RequestOptions, RetryStrategy};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn client_for(mock_server: &MockServer) -> Client {
    Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .build()
        .unwrap()
}

async fn request_count(mock_server: &MockServer) -> usize {
    mock_server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn test_cached_get_hits_transport_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let first: TestData = client
        .get_with("/test", RequestOptions::new().cached())
        .await
        .unwrap();
    let second: TestData = client
        .get_with("/test", RequestOptions::new().cached())
        .await
        .unwrap();

    let expected = TestData {
        id: 1,
        name: "Test".to_string(),
    };
    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(request_count(&mock_server).await, 1);
    assert_eq!(client.cache_size(), 1);
}

#[tokio::test]
async fn test_cache_hit_reports_metadata() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = || {
        resilient_client::Request::new(http::Method::GET, "/test")
            .with_options(RequestOptions::new().cached())
    };

    let network = client.call::<TestData>(request()).await.unwrap();
    assert!(!network.from_cache);
    assert_eq!(network.attempts, 1);

    let cached = client.call::<TestData>(request()).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.attempts, 0);
    assert_eq!(cached.data, network.data);
}

#[tokio::test]
async fn test_uncached_get_always_hits_transport() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let _: TestData = client.get("/test").await.unwrap();
    let _: TestData = client.get("/test").await.unwrap();

    assert_eq!(client.cache_size(), 0);
}

#[tokio::test]
async fn test_cache_key_includes_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let _: serde_json::Value = client
        .get_with("/posts", RequestOptions::new().cached().param("page", 1))
        .await
        .unwrap();
    let _: serde_json::Value = client
        .get_with("/posts", RequestOptions::new().cached().param("page", 2))
        .await
        .unwrap();
    let _: serde_json::Value = client
        .get_with("/posts", RequestOptions::new().cached().param("page", 1))
        .await
        .unwrap();

    assert_eq!(client.cache_size(), 2);
}

#[tokio::test]
async fn test_non_get_never_touches_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7, "name": "x"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let body = json!({"name": "x"});

    for _ in 0..2 {
        let _: TestData = client
            .post_with("/items", Some(&body), RequestOptions::new().cached())
            .await
            .unwrap();
    }

    assert_eq!(client.cache_size(), 0);
}

#[tokio::test]
async fn test_clear_cache_forces_refetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let _: TestData = client.get_with("/test", RequestOptions::new().cached()).await.unwrap();
    assert_eq!(client.cache_size(), 1);

    client.clear_cache();
    assert_eq!(client.cache_size(), 0);

    let _: TestData = client.get_with("/test", RequestOptions::new().cached()).await.unwrap();
    assert_eq!(client.cache_size(), 1);
}

#[tokio::test]
async fn test_clones_share_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let clone = client.clone();

    let _: TestData = client.get_with("/test", RequestOptions::new().cached()).await.unwrap();
    let _: TestData = clone.get_with("/test", RequestOptions::new().cached()).await.unwrap();

    assert_eq!(clone.cache_size(), 1);
}

#[tokio::test]
async fn test_concurrent_cached_gets_are_not_coalesced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "name": "Test"}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let (first, second) = tokio::join!(
        client.get_with::<TestData>("/test", RequestOptions::new().cached()),
        client.get_with::<TestData>("/test", RequestOptions::new().cached()),
    );

    assert_eq!(first.unwrap().id, 1);
    assert_eq!(second.unwrap().id, 1);
    assert_eq!(request_count(&mock_server).await, 2);
    assert_eq!(client.cache_size(), 1);
}

#[tokio::test]
async fn test_failed_get_is_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let result = client
        .get_with::<TestData>("/test", RequestOptions::new().cached())
        .await;

    assert!(result.is_err());
    assert_eq!(client.cache_size(), 0);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Bad Request"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let result = client
        .get_with::<TestData>(
            "/test",
            RequestOptions::new().retries(3).retry_delay(Duration::from_millis(10)),
        )
        .await;

    match result {
        Err(err @ ApiError::Client { .. }) => {
            assert_eq!(err.status(), 400);
            assert_eq!(err.message(), "Bad Request");
        }
        _ => panic!("Expected Client error, got {:?}", result),
    }
    assert_eq!(request_count(&mock_server).await, 1);
}

#[tokio::test]
async fn test_not_found_carries_server_code() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts/42"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({"message": "Post not found", "code": "post_not_found"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let err = client
        .get_with::<TestData>("/posts/42", RequestOptions::new().retries(2))
        .await
        .unwrap_err();

    assert_eq!(err.status(), 404);
    assert_eq!(err.message(), "Post not found");
    assert_eq!(err.code(), Some("post_not_found"));
}

#[tokio::test]
async fn test_retry_on_5xx() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail with 500, third succeeds
    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(500).set_body_string("Server error")
            } else {
                ResponseTemplate::new(200).set_body_json(json!({"success": true}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let result: serde_json::Value = client
        .get_with(
            "/test",
            RequestOptions::new().retries(3).retry_delay(Duration::from_millis(10)),
        )
        .await
        .unwrap();

    assert_eq!(result, json!({"success": true}));
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"message": "Scheduler is down"})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let result = client
        .get_with::<TestData>(
            "/test",
            RequestOptions::new().retries(2).retry_delay(Duration::from_millis(10)),
        )
        .await;

    match result {
        Err(ApiError::Server { status, message, .. }) => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(message, "Scheduler is down");
        }
        _ => panic!("Expected Server error, got {:?}", result),
    }
    // retries: 2 means 3 total attempts (1 initial + 2 retries)
    assert_eq!(request_count(&mock_server).await, 3);
}

#[tokio::test]
async fn test_client_retry_strategy_applies_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            max_retries: 2,
            jitter: false,
        })
        .build()
        .unwrap();

    let err = client
        .put::<_, TestData>("/test", &json!({"name": "x"}))
        .await
        .unwrap_err();

    assert_eq!(err.status(), 502);
    assert_eq!(err.message(), "Bad Gateway");
    assert_eq!(request_count(&mock_server).await, 3);
}

#[tokio::test]
async fn test_no_retries_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let result = client.get::<TestData>("/test").await;
    assert!(matches!(result, Err(ApiError::Server { .. })));
}

#[tokio::test]
async fn test_post_sends_json_body_and_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "New Item"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": 3, "name": "New Item"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let created: TestData = client
        .post("/items", &json!({"name": "New Item"}))
        .await
        .unwrap();

    assert_eq!(
        created,
        TestData {
            id: 3,
            name: "New Item".to_string()
        }
    );
}

#[tokio::test]
async fn test_post_body_keeps_struct_field_order() {
    #[derive(Serialize)]
    struct NewBooking {
        venue: String,
        attendees: u32,
        approved: bool,
    }

    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let _: serde_json::Value = client
        .post(
            "/bookings",
            &NewBooking {
                venue: "Hall B".to_string(),
                attendees: 40,
                approved: false,
            },
        )
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(
        String::from_utf8_lossy(&requests[0].body),
        r#"{"venue":"Hall B","attendees":40,"approved":false}"#
    );
}

#[tokio::test]
async fn test_get_has_no_content_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let _: TestData = client.get("/test").await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("content-type").is_none());
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn test_no_content_resolves_to_null() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/items/3"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let value: serde_json::Value = client.delete("/items/3").await.unwrap();
    assert!(value.is_null());

    client.delete::<()>("/items/3").await.unwrap();

    let nothing: Option<TestData> = client.delete("/items/3").await.unwrap();
    assert!(nothing.is_none());
}

#[tokio::test]
async fn test_invalid_json_is_unknown_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("invalid json"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let err = client.get::<TestData>("/test").await.unwrap_err();
    assert_eq!(err, ApiError::Unknown);
    assert_eq!(err.message(), "An unknown error occurred");
}

#[tokio::test]
async fn test_shape_mismatch_is_unknown_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let err = client
        .get_with::<TestData>("/test", RequestOptions::new().cached())
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Unknown);
    assert_eq!(client.cache_size(), 0);
}

#[tokio::test]
async fn test_query_parameters_in_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "spring launch"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let _: Vec<TestData> = client
        .get_with(
            "/search",
            RequestOptions::new().param("q", "spring launch").param("limit", 10),
        )
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("q=spring+launch&limit=10"));
}

#[tokio::test]
async fn test_base_url_path_prefix() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(format!("{}/api/v1/", mock_server.uri()))
        .unwrap()
        .build()
        .unwrap();

    let _: TestData = client.get("/test").await.unwrap();
}

#[tokio::test]
async fn test_default_and_request_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .and(header("user-agent", "dashboard-test"))
        .and(header("x-workspace", "acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "Test"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .default_header("User-Agent", "dashboard-test")
        .unwrap()
        .build()
        .unwrap();

    let options = RequestOptions::new().with_header("X-Workspace", "acme").unwrap();
    let _: TestData = client.get_with("/test", options).await.unwrap();
}

#[tokio::test]
async fn test_all_http_methods() {
    let mock_server = MockServer::start().await;
    let response = json!({"id": 1, "name": "Test"});

    for verb in ["GET", "POST", "PUT", "PATCH"] {
        Mock::given(method(verb))
            .and(path("/test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("DELETE"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let body = TestData {
        id: 1,
        name: "Test".to_string(),
    };

    let _: TestData = client.get("/test").await.unwrap();
    let _: TestData = client.post("/test", &body).await.unwrap();
    let _: TestData = client.put("/test", &body).await.unwrap();
    let _: TestData = client.patch("/test", &body).await.unwrap();
    client.delete::<()>("/test").await.unwrap();
}

#[tokio::test]
async fn test_post_without_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/jobs/9/run"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"queued": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let result: serde_json::Value = client
        .post_with::<(), _>("/jobs/9/run", None, RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(result, json!({"queued": true}));
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("content-type").is_none());
}
