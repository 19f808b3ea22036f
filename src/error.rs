//! Error types for the request pipeline.
//!
//! Every failure that can reach a caller is an [`Error`]. Failures raised by
//! interceptors carry the [`Phase`] they were raised in, and any error can be
//! classified into the pipeline [`Stage`] that produced it.

use http::{HeaderMap, StatusCode};

/// The side of the transport call an interceptor runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Pre-send interceptors, transforming the request configuration.
    Request,
    /// Post-receive interceptors, transforming the response.
    Response,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Request => f.write_str("request"),
            Phase::Response => f.write_str("response"),
        }
    }
}

/// Where in the pipeline a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Raised by a pre-send handler.
    PreHandler,
    /// Raised by, or returned from, the transport call.
    Dispatch,
    /// Raised by a post-receive handler.
    PostHandler,
}

/// The main error type for pipelined HTTP calls.
///
/// # Examples
///
/// ```no_run
/// use chainwire::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("/endpoint").await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::Interceptor { phase, message }) => {
///         eprintln!("{} interceptor failed: {}", phase, message);
///     }
///     Err(Error::HttpError { status, raw_response, .. }) => {
///         eprintln!("HTTP error {}: {}", status, raw_response);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Failed to deserialize the response body into the expected type.
    ///
    /// The raw body is preserved so the failure can be debugged after the fact.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The server returned a status the request's status policy rejects.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// An interceptor failed, or explicitly rejected the value it was given.
    #[error("{phase} interceptor failed: {message}")]
    Interceptor {
        /// Which side of the transport call raised the failure
        phase: Phase,
        /// Human readable reason
        message: String,
    },

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Shorthand for an [`Error::Interceptor`] raised by a pre-send handler.
    ///
    /// ```
    /// use chainwire::{Error, Phase, Stage};
    ///
    /// let err = Error::request_interceptor("missing api key");
    /// assert_eq!(err.stage(), Some(Stage::PreHandler));
    /// assert!(matches!(err, Error::Interceptor { phase: Phase::Request, .. }));
    /// ```
    pub fn request_interceptor(message: impl Into<String>) -> Self {
        Error::Interceptor {
            phase: Phase::Request,
            message: message.into(),
        }
    }

    /// Shorthand for an [`Error::Interceptor`] raised by a post-receive handler.
    pub fn response_interceptor(message: impl Into<String>) -> Self {
        Error::Interceptor {
            phase: Phase::Response,
            message: message.into(),
        }
    }

    /// Classifies the error by the pipeline stage that produced it.
    ///
    /// Returns `None` for errors raised outside the pipeline itself, such as
    /// configuration errors or typed deserialization of the final value.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Interceptor {
                phase: Phase::Request,
                ..
            } => Some(Stage::PreHandler),
            Error::Interceptor {
                phase: Phase::Response,
                ..
            } => Some(Stage::PostHandler),
            Error::Network(_) | Error::Timeout | Error::HttpError { .. } => Some(Stage::Dispatch),
            Error::DeserializationFailed { .. }
            | Error::ConfigurationError(_)
            | Error::SerializationFailed(_)
            | Error::InvalidUrl(_) => None,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for pipelined HTTP calls.
pub type Result<T> = std::result::Result<T, Error>;
