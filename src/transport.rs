//! The transport boundary.
//!
//! The chain treats the transport as one opaque call from a resolved
//! configuration to a response or a failure. [`ReqwestTransport`] is the
//! HTTP implementation used by [`Client`](crate::Client); any closure
//! returning a future can stand in for it.

use crate::{config::RequestConfig, Error, Response, Result};
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::time::{Duration, Instant};

/// A single request/response exchange.
pub trait Transport<C, R, E>: Send + Sync {
    /// Sends the request described by `config`.
    ///
    /// Failures are reported through the returned future, never by panicking.
    fn dispatch(&self, config: C) -> BoxFuture<'static, std::result::Result<R, E>>;
}

impl<C, R, E, F, Fut> Transport<C, R, E> for F
where
    F: Fn(C) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
{
    fn dispatch(&self, config: C) -> BoxFuture<'static, std::result::Result<R, E>> {
        Box::pin(self(config))
    }
}

/// Transport backed by a `reqwest::Client`.
///
/// The response body is parsed as JSON when possible; any other body is kept
/// as a JSON string. Statuses rejected by the request's status policy become
/// [`Error::HttpError`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest::Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { http_client })
    }

    /// Wraps an existing `reqwest::Client`.
    pub fn from_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl Transport<RequestConfig, Response<Value>, Error> for ReqwestTransport {
    fn dispatch(&self, config: RequestConfig) -> BoxFuture<'static, Result<Response<Value>>> {
        let http_client = self.http_client.clone();
        Box::pin(send(http_client, config))
    }
}

async fn send(http_client: reqwest::Client, config: RequestConfig) -> Result<Response<Value>> {
    let url = config.url()?;

    tracing::debug!(
        method = %config.method,
        url = %url,
        "Executing HTTP request"
    );

    let mut request = http_client.request(config.method.clone(), url);

    for (name, value) in &config.headers {
        request = request.header(name, value);
    }

    if let Some(body) = &config.body {
        request = request.json(body);
    }

    let start_time = Instant::now();
    let response = request.send().await.map_err(classify)?;

    let status = response.status();
    let headers = response.headers().clone();

    if !config.accepts(status) {
        let raw_response = response.text().await.unwrap_or_default();

        if status.is_client_error() {
            tracing::error!(
                status = status.as_u16(),
                response = %raw_response,
                "Client error (4xx)"
            );
        } else if status.is_server_error() {
            tracing::warn!(
                status = status.as_u16(),
                response = %raw_response,
                "Server error (5xx)"
            );
        } else {
            tracing::warn!(status = status.as_u16(), "Status rejected by status policy");
        }

        return Err(Error::HttpError {
            status,
            raw_response,
            headers,
        });
    }

    let raw_body = response.text().await.map_err(classify)?;
    let latency = start_time.elapsed();

    tracing::info!(
        status = status.as_u16(),
        latency_ms = latency.as_millis(),
        "Received HTTP response"
    );

    let data = parse_body(&raw_body);
    Ok(Response::new(data, raw_body, status, headers, latency, config))
}

fn parse_body(raw_body: &str) -> Value {
    if raw_body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw_body).unwrap_or_else(|_| Value::String(raw_body.to_string()))
}

fn classify(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Network(error)
    }
}

/// Bounds every dispatch of the inner transport by the request's timeout.
pub(crate) struct WithTimeout<T: ?Sized> {
    pub(crate) inner: std::sync::Arc<T>,
}

impl<T> Transport<RequestConfig, Response<Value>, Error> for WithTimeout<T>
where
    T: Transport<RequestConfig, Response<Value>, Error> + ?Sized,
{
    fn dispatch(&self, config: RequestConfig) -> BoxFuture<'static, Result<Response<Value>>> {
        match config.timeout {
            Some(timeout) => {
                let pending = self.inner.dispatch(config);
                Box::pin(bounded(timeout, pending))
            }
            None => self.inner.dispatch(config),
        }
    }
}

async fn bounded(
    timeout: Duration,
    pending: BoxFuture<'static, Result<Response<Value>>>,
) -> Result<Response<Value>> {
    match tokio::time::timeout(timeout, pending).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis(), "Request timed out");
            Err(Error::Timeout)
        }
    }
}
