//! Response wrapper that preserves both parsed data and raw response details.
//!
//! Post-receive interceptors see a `Response<serde_json::Value>`; the typed
//! helpers on [`Client`](crate::Client) deserialize the final value into a
//! `Response<T>` once the whole chain has settled.

use crate::config::RequestConfig;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful HTTP response together with the request that produced it.
///
/// # Examples
///
/// ```no_run
/// use chainwire::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), chainwire::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let response = client.get::<User>("/users/123").await?;
///
/// println!("User: {}", response.data.name);
/// println!("Request took {:?}", response.latency);
/// println!("Sent with headers: {:?}", response.config.headers);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from sending the request until the body was read.
    pub latency: Duration,

    /// The configuration that was dispatched, after all pre-send interceptors ran.
    pub config: RequestConfig,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        config: RequestConfig,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            config,
        }
    }

    /// Maps the response data to a different type using the provided function.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chainwire::{RequestConfig, Response};
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     "42".to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     RequestConfig::default(),
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            config: self.config,
        }
    }

    /// Like [`map`](Self::map), for conversions that can fail.
    pub fn try_map<U, E, F>(self, f: F) -> Result<Response<U>, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        Ok(Response {
            data: f(self.data)?,
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            config: self.config,
        })
    }

    /// Returns a reference to a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use chainwire::{RequestConfig, Response};
    /// # use http::{HeaderMap, StatusCode, HeaderValue};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new(
    ///     (),
    ///     String::new(),
    ///     StatusCode::OK,
    ///     headers,
    ///     Duration::from_millis(100),
    ///     RequestConfig::default(),
    /// );
    ///
    /// assert_eq!(
    ///     response.header("content-type").unwrap(),
    ///     "application/json"
    /// );
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
