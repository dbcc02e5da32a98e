//! Normalized success envelope.
//!
//! Every successful call yields a [`Response`] with `data`, a 2xx `status`
//! and the `request_id` the server echoed (or the one the request was sent
//! with), plus timing and retry information.

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// A successful response.
///
/// # Examples
///
/// ```no_run
/// use aionis_client::{Client, RequestOptions};
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize)]
/// struct WriteResult {
///     commit_id: String,
/// }
///
/// # async fn example() -> Result<(), aionis_client::Error> {
/// let client = Client::builder()
///     .base_url("http://localhost:3001")?
///     .build()?;
///
/// let response = client
///     .write(&json!({ "input_text": "hello" }), RequestOptions::default())
///     .await?
///     .decode::<WriteResult>()?;
///
/// println!("commit {} (request {})", response.data.commit_id, response.request_id);
/// println!("took {:?} over {} attempt(s)", response.latency, response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The response data. For untyped calls this is JSON when the server
    /// declared `application/json`, a string for other bodies, and `null`
    /// for an empty body.
    pub data: T,

    /// The HTTP status code; always in `200..300`.
    pub status: StatusCode,

    /// The response's `x-request-id`, or the id the request was sent with.
    pub request_id: String,

    /// The response headers.
    pub headers: HeaderMap,

    /// Total time from the first send to the successful response, including
    /// backoff sleeps.
    pub latency: Duration,

    /// Number of attempts made; `1` if the first attempt succeeded.
    pub attempts: u32,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        status: StatusCode,
        request_id: String,
        headers: HeaderMap,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            data,
            status,
            request_id,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type, preserving the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use aionis_client::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     StatusCode::OK,
    ///     "req-1".to_string(),
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// assert_eq!(string_response.request_id, "req-1");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            request_id: self.request_id,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl Response<Value> {
    /// Decodes the JSON data into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DeserializationFailed`] with the data rendered
    /// as text if it does not match `T`.
    pub fn decode<T: DeserializeOwned>(self) -> crate::Result<Response<T>> {
        let status = self.status;
        let data = serde_json::from_value::<T>(self.data.clone()).map_err(|e| {
            tracing::error!(
                error = %e,
                status = status.as_u16(),
                request_id = %self.request_id,
                "Failed to deserialize response"
            );
            crate::Error::DeserializationFailed {
                raw_response: match &self.data {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                },
                serde_error: e.to_string(),
                status,
            }
        })?;
        Ok(self.map(|_| data))
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
