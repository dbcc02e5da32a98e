//! Response body parsing and error classification.
//!
//! A non-2xx response is turned into an [`ApiError`] by reading the
//! conventional failure body `{error, message, details?, issues?}`; any
//! missing field falls back to a status-derived default.

use crate::error::ApiError;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

/// Returns `true` for statuses worth retrying blindly: 429 and every status
/// at or above 500.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500
}

/// Decodes a response body.
///
/// When `content-type` contains `application/json` the body is parsed as
/// JSON; a body that claims to be JSON but does not parse degrades to text.
/// Anything else is returned as a JSON string. An empty body is `null`.
pub fn parse_body(headers: &HeaderMap, raw: &[u8]) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }

    let is_json = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));

    if is_json {
        if let Ok(value) = serde_json::from_slice(raw) {
            return value;
        }
    }

    Value::String(String::from_utf8_lossy(raw).into_owned())
}

/// Builds the [`ApiError`] for a terminal (or about-to-be-retried) non-2xx
/// response.
///
/// # Examples
///
/// ```
/// use aionis_client::classify::classify_failure;
/// use http::StatusCode;
/// use serde_json::json;
///
/// let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, &json!("oops"), "req-1");
/// assert_eq!(err.code, "http_500");
/// assert_eq!(err.message, "request failed with status 500");
///
/// let body = json!({ "error": "invalid_request", "message": "bad scope" });
/// let err = classify_failure(StatusCode::BAD_REQUEST, &body, "req-2");
/// assert_eq!(err.code, "invalid_request");
/// assert_eq!(err.message, "bad scope");
/// ```
pub fn classify_failure(status: StatusCode, body: &Value, request_id: &str) -> ApiError {
    let mut err = ApiError::new(
        status,
        format!("http_{}", status.as_u16()),
        format!("request failed with status {}", status.as_u16()),
        request_id,
    );

    let Some(obj) = body.as_object() else {
        return err;
    };

    if let Some(code) = non_empty_text(obj.get("error")) {
        err.code = code;
    }
    if let Some(message) = non_empty_text(obj.get("message")) {
        err.message = message;
    }
    err.details = obj.get("details").filter(|d| !d.is_null()).cloned();
    if let Some(Value::Array(issues)) = obj.get("issues") {
        err.issues = Some(issues.clone());
    }

    err
}

fn non_empty_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
