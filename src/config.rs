//! Resolved request configuration.
//!
//! A [`RequestConfig`] is the value pre-send interceptors transform and the
//! transport finally sends. Per-request values are merged over the client's
//! defaults before the interceptor chain is assembled.

use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Decides which response statuses count as success.
pub type StatusPolicy = fn(StatusCode) -> bool;

/// The default status policy: only 2xx responses succeed.
pub fn default_status_policy(status: StatusCode) -> bool {
    status.is_success()
}

/// Configuration for a single HTTP request.
///
/// # Examples
///
/// ```
/// use chainwire::RequestConfig;
/// use http::Method;
///
/// # fn example() -> Result<(), chainwire::Error> {
/// let config = RequestConfig::new(Method::GET, "/search")
///     .with_base_url("https://api.example.com")?
///     .with_header("accept", "application/json")?
///     .with_query_param("q", "rust");
///
/// assert_eq!(config.url()?.as_str(), "https://api.example.com/search?q=rust");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path, relative to the base URL.
    pub path: String,

    /// Base URL the path is resolved against.
    pub base_url: Option<Url>,

    /// Headers for this request.
    pub headers: HeaderMap,

    /// Query parameters for this request.
    pub query_params: HashMap<String, String>,

    /// JSON request body.
    pub body: Option<Value>,

    /// Upper bound on the transport call.
    pub timeout: Option<Duration>,

    /// Which statuses the transport treats as success.
    pub validate_status: Option<StatusPolicy>,
}

impl RequestConfig {
    /// Creates a new `RequestConfig` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            base_url: None,
            headers: HeaderMap::new(),
            query_params: HashMap::new(),
            body: None,
            timeout: None,
            validate_status: None,
        }
    }

    /// Sets the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a header to the request, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Adds multiple query parameters to the request.
    pub fn with_query_params(
        mut self,
        params: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.query_params.extend(params);
        self
    }

    /// Serializes `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized.
    pub fn with_body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let json =
            serde_json::to_value(body).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        self.body = Some(json);
        Ok(self)
    }

    /// Sets the timeout for the transport call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the status policy.
    pub fn with_validate_status(mut self, policy: StatusPolicy) -> Self {
        self.validate_status = Some(policy);
        self
    }

    /// Returns the value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Merges this configuration over `defaults`.
    ///
    /// Method, path and body always come from `self`. Headers and query
    /// parameters are combined, with entries from `self` replacing defaults
    /// of the same name. The remaining settings fall back to `defaults` when
    /// unset here.
    pub fn merged_with(self, defaults: &RequestConfig) -> Self {
        let mut headers = defaults.headers.clone();
        headers.extend(self.headers);

        let mut query_params = defaults.query_params.clone();
        query_params.extend(self.query_params);

        Self {
            method: self.method,
            path: self.path,
            base_url: self.base_url.or_else(|| defaults.base_url.clone()),
            headers,
            query_params,
            body: self.body,
            timeout: self.timeout.or(defaults.timeout),
            validate_status: self.validate_status.or(defaults.validate_status),
        }
    }

    /// Returns `true` if the status policy accepts `status`.
    pub fn accepts(&self, status: StatusCode) -> bool {
        self.validate_status.unwrap_or(default_status_policy)(status)
    }

    /// Resolves the full request URL.
    ///
    /// Without a base URL the path must itself be an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns an error if no valid URL can be formed.
    pub fn url(&self) -> Result<Url> {
        let mut url = match &self.base_url {
            Some(base) => {
                let mut url = base.clone();
                url.set_path(&self.path);
                url
            }
            None => Url::parse(&self.path).map_err(|_| {
                Error::ConfigurationError(format!(
                    "Base URL is required for relative path '{}'",
                    self.path
                ))
            })?,
        };

        if !self.query_params.is_empty() {
            let mut params: Vec<_> = self.query_params.iter().collect();
            params.sort();
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::new(Method::GET, "")
    }
}
