//! Example demonstrating request and response interceptors.
//!
//! This example shows how to:
//! - Inject headers with synchronous request interceptors
//! - Restrict an interceptor to some requests with `run_when`
//! - Observe and recover responses with response interceptors
//! - See which execution mode a request will use
//!
//! Run with: `cargo run --example header_injection`

use chainwire::{
    Chain, Client, Error, RequestConfig, RequestInterceptor, Response, ResponseInterceptor,
};
use http::{HeaderMap, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("chainwire=debug,header_injection=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .timeout(Duration::from_secs(10))
        .build()?;

    // Registered first, so it runs last and sees the other interceptor's header.
    client.interceptors().request().use_interceptor(
        RequestInterceptor::sync(|config: RequestConfig| {
            let trace = config.header("x-trace-id").unwrap_or("none").to_string();
            tracing::info!(trace_id = %trace, path = %config.path, "Sending request");
            Ok(config)
        })
        .synchronous(true),
    );

    client.interceptors().request().use_interceptor(
        RequestInterceptor::sync(|config: RequestConfig| {
            config.with_header("x-trace-id", "demo-1234")
        })
        .synchronous(true),
    );

    // Only consulted for writes.
    client.interceptors().request().use_interceptor(
        RequestInterceptor::sync(|config: RequestConfig| {
            config.with_header("idempotency-key", "demo-key")
        })
        .synchronous(true)
        .run_when(|config: &RequestConfig| config.method != Method::GET),
    );

    client.interceptors().response().use_interceptor(
        ResponseInterceptor::sync(|response| {
            tracing::info!(
                status = %response.status,
                latency_ms = response.latency.as_millis(),
                "Response received"
            );
            Ok(response)
        })
        // Turn a missing resource into an empty result.
        .on_rejected_sync(|error| match error.status() {
            Some(StatusCode::NOT_FOUND) => Ok(Response::new(
                Value::Null,
                String::new(),
                StatusCode::NOT_FOUND,
                HeaderMap::new(),
                Duration::ZERO,
                RequestConfig::default(),
            )),
            _ => Err(error),
        }),
    );

    println!("=== Execution Mode ===");
    let chain = Chain::assemble(
        &client.interceptors().request().snapshot(),
        &client.interceptors().response().snapshot(),
        &RequestConfig::new(Method::GET, "/posts/1"),
    );
    println!(
        "GET /posts/1 runs {} pre-send interceptors in {} mode (direct: {})",
        chain.pre_len(),
        chain.mode(),
        chain.mode().is_direct()
    );
    println!();

    println!("=== Intercepted GET ===");
    let response = client.get::<Post>("/posts/1").await?;
    println!("Title: {}", response.data.title);
    println!("Sent x-trace-id: {:?}", response.config.header("x-trace-id"));
    println!("Sent idempotency-key: {:?}", response.config.header("idempotency-key"));
    println!();

    println!("=== Recovered 404 ===");
    let response = client.get::<Option<Post>>("/posts/does-not-exist").await?;
    println!("Status: {}, data: {:?}", response.status, response.data);

    Ok(())
}
