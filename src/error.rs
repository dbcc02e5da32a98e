//! Error types for calls against the memory service.
//!
//! The request core only ever produces three outcomes besides success:
//! [`ApiError`] (the server answered with a terminal non-2xx status),
//! [`NetworkError`] (no HTTP response was obtained) and [`Error::Cancelled`].
//! Everything else in [`Error`] comes from client construction, argument
//! validation or typed decoding of a successful body.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The main error type for this crate.
///
/// # Examples
///
/// ```no_run
/// use aionis_client::{Client, Error, RequestOptions};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("http://localhost:3001")?
///     .build()?;
///
/// match client.recall(&json!({ "query_text": "deploy" }), RequestOptions::default()).await {
///     Ok(response) => println!("recalled: {}", response.data),
///     Err(Error::Api(err)) => {
///         eprintln!("{} {} ({})", err.status, err.code, err.message);
///     }
///     Err(Error::Network(err)) => eprintln!("no response: {}", err.message),
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The server answered with a non-2xx status that was either not
    /// retryable or still failing once the retry budget was spent.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// No HTTP response was obtained (DNS, connect, TLS, timeout, protocol
    /// failure) and the retry budget is exhausted.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The caller's cancellation token fired during a send or a backoff sleep.
    #[error("request {request_id} was cancelled")]
    Cancelled {
        /// The id the cancelled request was sent (or would have been sent) with.
        request_id: String,
    },

    /// A successful response body could not be decoded into the requested type.
    ///
    /// # Fields
    ///
    /// * `raw_response` - The response data rendered as text
    /// * `serde_error` - The error message from serde
    /// * `status` - The HTTP status code of the response
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The response data that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// The request payload could not be serialized to JSON, or a GET payload
    /// was not a JSON object.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Invalid client or per-call configuration, such as an unusable header.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A required call argument was missing or empty.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if this error belongs to the class the request core
    /// retries: 429, any 5xx, or a transport failure.
    ///
    /// By the time an error reaches the caller the retry budget has already
    /// been spent, so this is mostly useful for callers that layer their own
    /// retry loop on top.
    ///
    /// # Examples
    ///
    /// ```
    /// use aionis_client::{ApiError, Error};
    /// use http::StatusCode;
    ///
    /// let err = Error::Api(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "http_503", "down", "req-1"));
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::Api(ApiError::new(StatusCode::NOT_FOUND, "http_404", "missing", "req-2"));
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(err) => crate::classify::is_retryable_status(err.status),
            Error::Network(_) => true,
            Error::Cancelled { .. } => false,
            Error::DeserializationFailed { .. } => false,
            Error::SerializationFailed(_) => false,
            Error::ConfigurationError(_) => false,
            Error::InvalidArgument(_) => false,
            Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the HTTP status code if this error carries one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(err) => Some(err.status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the request id associated with the failed call, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Api(err) => Some(&err.request_id),
            Error::Network(err) => Some(&err.request_id),
            Error::Cancelled { request_id } => Some(request_id),
            _ => None,
        }
    }

    /// Returns the inner [`ApiError`] if this is an API failure.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// A terminal non-2xx response from the service.
///
/// `code` is the body's `error` field when the body is a JSON object that has
/// one, otherwise `http_<status>`. See [`crate::classify`] for the full rules.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("API error {status} [{code}]: {message}")]
pub struct ApiError {
    /// The HTTP status code.
    pub status: StatusCode,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Opaque structured details from the body, if any.
    pub details: Option<Value>,
    /// The response's `x-request-id`, or the id the request was sent with.
    pub request_id: String,
    /// Validation issues, kept verbatim when the body's `issues` was a list.
    pub issues: Option<Vec<Value>>,
}

impl ApiError {
    /// Creates an error with no details or issues.
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
            request_id: request_id.into(),
            issues: None,
        }
    }

    /// Attaches structured details.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns the issues that have the `{path, message}` shape.
    ///
    /// Entries of any other shape are skipped; they remain available through
    /// [`ApiError::issues`].
    pub fn validation_issues(&self) -> Vec<ValidationIssue> {
        self.issues
            .iter()
            .flatten()
            .filter_map(|issue| serde_json::from_value(issue.clone()).ok())
            .collect()
    }
}

/// A single request-validation problem reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path of the offending field.
    pub path: String,
    /// What was wrong with it.
    pub message: String,
}

/// No HTTP response was obtained after all attempts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct NetworkError {
    /// Description including the method, path and last transport error.
    pub message: String,
    /// The id the request was sent with.
    pub request_id: String,
    /// Whether the last attempt failed because the per-attempt timeout elapsed.
    pub timed_out: bool,
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
