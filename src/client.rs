//! HTTP client that runs every request through its interceptor chain.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    chain::Chain,
    config::{RequestConfig, StatusPolicy},
    interceptor::{Interceptor, Interceptors},
    transport::{ReqwestTransport, Transport, WithTimeout},
    Error, Response, Result,
};
use futures::future::BoxFuture;
use http::{HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A pre-send interceptor over the resolved request configuration.
pub type RequestInterceptor = Interceptor<RequestConfig, Error>;

/// A post-receive interceptor over the untyped response.
pub type ResponseInterceptor = Interceptor<Response<Value>, Error>;

/// The registries of a [`Client`].
pub type ClientInterceptors = Interceptors<RequestConfig, Response<Value>, Error>;

/// A transport usable by a [`Client`].
pub type DynTransport = dyn Transport<RequestConfig, Response<Value>, Error>;

/// An HTTP client whose requests pass through ordered interceptors.
///
/// Clones share the same configuration and interceptor registries.
///
/// # Examples
///
/// ```no_run
/// use chainwire::{Client, RequestConfig, RequestInterceptor, Response};
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
/// client.interceptors().request().use_interceptor(
///     RequestInterceptor::sync(|config: RequestConfig| config.with_header("x-api-key", "secret"))
///         .synchronous(true),
/// );
///
/// let user: Response<User> = client.get("/users/123").await?;
/// println!("User: {}", user.data.name);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<WithTimeout<DynTransport>>,
    defaults: RequestConfig,
    interceptors: ClientInterceptors,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The client's pre-send and post-receive interceptor registries.
    pub fn interceptors(&self) -> &ClientInterceptors {
        &self.inner.interceptors
    }

    /// Runs one request through the full pipeline.
    ///
    /// The configuration is merged over the client defaults, both registries
    /// are snapshotted, and the assembled chain is executed. Registry changes
    /// made after this call returns do not affect the request.
    ///
    /// When every active pre-send interceptor is synchronous they run, and the
    /// transport is invoked, before this method returns; otherwise nothing
    /// runs until the returned future is polled.
    pub fn request(&self, config: RequestConfig) -> BoxFuture<'static, Result<Response<Value>>> {
        let config = config.merged_with(&self.inner.defaults);
        let interceptors = &self.inner.interceptors;
        let chain = Chain::assemble(
            &interceptors.request().snapshot(),
            &interceptors.response().snapshot(),
            &config,
        );

        tracing::debug!(
            method = %config.method,
            path = %config.path,
            mode = %chain.mode(),
            "Executing request pipeline"
        );

        chain.execute(config, Arc::clone(&self.inner.transport))
    }

    /// Makes a typed HTTP request.
    ///
    /// Serializes `body` into the configuration, runs the pipeline, and
    /// deserializes the final response data into `Res`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chainwire::{Client, RequestConfig};
    /// use http::Method;
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Serialize)]
    /// struct Request { query: String }
    ///
    /// #[derive(Deserialize)]
    /// struct ApiResponse { results: Vec<String> }
    ///
    /// # async fn example() -> Result<(), chainwire::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// let config = RequestConfig::new(Method::POST, "/search");
    /// let request = Request { query: "rust".to_string() };
    ///
    /// let response = client.call::<_, ApiResponse>(config, Some(&request)).await?;
    /// println!("Found {} results", response.data.results.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<Req, Res>(
        &self,
        config: RequestConfig,
        body: Option<&Req>,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let config = match body {
            Some(body) => config.with_body(body)?,
            None => config,
        };

        let response = self.request(config).await?;
        let raw_body = response.raw_body.clone();
        let status = response.status;

        response.try_map(|data| {
            serde_json::from_value::<Res>(data).map_err(|e| {
                tracing::error!(
                    error = %e,
                    raw_response = %raw_body,
                    "Failed to deserialize response"
                );
                Error::DeserializationFailed {
                    raw_response: raw_body,
                    serde_error: e.to_string(),
                    status,
                }
            })
        })
    }

    /// Makes a GET request to the specified path.
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let config = RequestConfig::new(Method::GET, path);
        self.call::<(), Res>(config, None).await
    }

    /// Makes a POST request to the specified path with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let config = RequestConfig::new(Method::POST, path);
        self.call(config, Some(body)).await
    }

    /// Makes a PUT request to the specified path with a JSON body.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let config = RequestConfig::new(Method::PUT, path);
        self.call(config, Some(body)).await
    }

    /// Makes a DELETE request to the specified path.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let config = RequestConfig::new(Method::DELETE, path);
        self.call::<(), Res>(config, None).await
    }

    /// Makes a PATCH request to the specified path with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let config = RequestConfig::new(Method::PATCH, path);
        self.call(config, Some(body)).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.inner.defaults)
            .field("interceptors", &self.inner.interceptors)
            .finish()
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use chainwire::ClientBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), chainwire::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(30))
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    defaults: RequestConfig,
    transport: Option<Arc<DynTransport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            defaults: RequestConfig::default(),
            transport: None,
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.defaults.headers.insert(name, value);
        Ok(self)
    }

    /// Sets the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = Some(timeout);
        self
    }

    /// Sets the default status policy. By default only 2xx responses succeed.
    pub fn validate_status(mut self, policy: StatusPolicy) -> Self {
        self.defaults.validate_status = Some(policy);
        self
    }

    /// Replaces the HTTP transport.
    pub fn transport<T>(mut self, transport: T) -> Self
    where
        T: Transport<RequestConfig, Response<Value>, Error> + 'static,
    {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided or if the HTTP client
    /// cannot be built.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?) as Arc<DynTransport>,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport: Arc::new(WithTimeout { inner: transport }),
                defaults: RequestConfig {
                    base_url: Some(base_url),
                    ..self.defaults
                },
                interceptors: ClientInterceptors::new(),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
