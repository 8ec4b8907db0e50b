//! Basic example demonstrating cached GETs, POSTs and error handling.
//!
//! This example shows how to:
//! - Create a client with basic configuration
//! - Serve repeated GETs from the response cache
//! - Make POST requests with a JSON body
//! - Inspect the typed error on failure
//!
//! Run with: `cargo run --example basic_call`

use resilient_client::{ApiError, Client, RequestOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter("resilient_client=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    println!("=== Cached GET ===");
    for _ in 0..2 {
        let post: Post = client
            .get_with("/posts/1", RequestOptions::new().cached())
            .await?;
        println!("Post {}: {}", post.id, post.title);
    }
    println!("Cache entries: {}", client.cache_size());
    println!();

    println!("=== POST ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let created: Post = client.post("/posts", &new_post).await?;
    println!("Created post ID: {}", created.id);
    println!();

    println!("=== Error handling ===");
    match client.get::<Post>("/posts/999999").await {
        Ok(post) => println!("Unexpected success: {:?}", post),
        Err(ApiError::Client { status, message, code }) => {
            println!("Client error {}: {} (code: {:?})", status, message, code);
        }
        Err(e) => println!("Other error: {} (status {})", e, e.status()),
    }

    client.clear_cache();
    println!("Cache entries after clear: {}", client.cache_size());

    Ok(())
}
