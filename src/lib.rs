//! # Chainwire - HTTP requests through ordered interceptor chains
//!
//! Chainwire runs each HTTP request through a chain of pre-send and
//! post-receive interceptors wrapped around a single transport call. It is
//! built on top of `reqwest`, but the chain itself works with any transport.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chainwire::{Client, Error, RequestConfig, RequestInterceptor, ResponseInterceptor};
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     // Pure header injection: eligible for the synchronous fast path.
//!     client.interceptors().request().use_interceptor(
//!         RequestInterceptor::sync(|config: RequestConfig| {
//!             config.with_header("authorization", "Bearer token")
//!         })
//!         .synchronous(true),
//!     );
//!
//!     // Runs after every response, in registration order.
//!     client.interceptors().response().use_interceptor(
//!         ResponseInterceptor::sync(|response| {
//!             tracing::info!(status = %response.status, "response received");
//!             Ok(response)
//!         }),
//!     );
//!
//!     let user = client.get::<User>("/users/123").await?;
//!     println!("User: {}", user.data.name);
//!     Ok(())
//! }
//! ```
//!
//! ## Ordering
//!
//! Pre-send interceptors run in **reverse** registration order: the one
//! registered last sees the configuration first. Post-receive interceptors
//! run in registration order. Both lists are snapshotted when a request
//! starts, so registering or ejecting interceptors never affects requests
//! already in flight.
//!
//! ## Execution modes
//!
//! If every pre-send interceptor that is active for a request was declared
//! [`synchronous`](Interceptor::synchronous), the chain runs them inline
//! ([`ExecutionMode::Direct`]). Otherwise every step is chained as a
//! continuation ([`ExecutionMode::Suspended`]). Post-receive interceptors
//! always run as continuations of the transport call.
//!
//! ## Failure routing
//!
//! A failure is handed to the next step's failure handler; steps without one
//! pass it along unchanged, and a failure handler may recover into a value.
//! In the direct mode a failing pre-send handler additionally ends the
//! pre-send phase: the request is still dispatched, with the recovered
//! configuration or the one from before the failing step, unless the
//! failure handler itself fails.

mod chain;
mod client;
mod config;
mod error;
mod executor;
pub mod interceptor;
mod response;
pub mod transport;

pub use chain::{Chain, ExecutionMode};
pub use client::{
    Client, ClientBuilder, ClientInterceptors, DynTransport, RequestInterceptor,
    ResponseInterceptor,
};
pub use config::{default_status_policy, RequestConfig, StatusPolicy};
pub use error::{Error, Phase, Result, Stage};
pub use interceptor::{Interceptor, InterceptorId, InterceptorManager, Interceptors, Snapshot};
pub use response::Response;
pub use transport::{ReqwestTransport, Transport};
