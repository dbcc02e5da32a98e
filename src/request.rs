//! Per-call request assembly.
//!
//! A [`RequestContext`] is built once per call. Its body (or query string)
//! is serialized up front and re-sent unchanged on every retry.

use crate::options::{Credentials, RequestOptions, ResolvedCredentials};
use crate::{Error, Result};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Lower bound applied to every per-attempt timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const X_ADMIN_TOKEN: HeaderName = HeaderName::from_static("x-admin-token");

/// Everything needed to send one call, identical across attempts.
#[derive(Debug, Clone)]
pub(crate) struct RequestContext {
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
    headers: HeaderMap,
    request_id: String,
    timeout: Duration,
}

impl RequestContext {
    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Fully resolved URL, including the encoded query for GET.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Serialized JSON body; `None` for GET.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Final header map.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The id this call is sent with.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder-side inputs shared by every call of one client.
pub(crate) struct Defaults<'a> {
    pub base_url: &'a Url,
    pub headers: &'a HeaderMap,
    pub credentials: &'a Credentials,
    pub timeout: Duration,
}

/// Assembles the context for one call.
pub(crate) fn build_context(
    defaults: &Defaults<'_>,
    method: Method,
    segments: &[&str],
    payload: Option<Value>,
    options: &RequestOptions,
) -> Result<RequestContext> {
    let request_id = options
        .request_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut url = resolve_url(defaults.base_url, segments)?;
    let body = if method == Method::GET {
        if let Some(payload) = &payload {
            let pairs = encode_query(payload)?;
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }
        None
    } else {
        let payload = payload.unwrap_or_else(|| Value::Object(Default::default()));
        Some(serde_json::to_vec(&payload).map_err(|e| Error::SerializationFailed(e.to_string()))?)
    };

    let headers = assemble_headers(
        &method,
        &request_id,
        defaults.headers,
        &options.headers,
        defaults.credentials.resolve(options),
    )?;

    Ok(RequestContext {
        method,
        url,
        body,
        headers,
        request_id,
        timeout: options.timeout.unwrap_or(defaults.timeout).max(MIN_TIMEOUT),
    })
}

/// Joins path segments onto the base URL.
///
/// Each segment is percent-encoded as a single path segment, so identifiers
/// containing `/` or spaces cannot escape their position.
pub(crate) fn resolve_url(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::ConfigurationError(format!("base URL {} cannot have a path", base)))?;
        path.pop_if_empty();
        path.extend(segments.iter().filter(|s| !s.is_empty()));
    }
    Ok(url)
}

/// Splits a `/`-separated path into segments, dropping empty ones.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Layers headers in precedence order: base headers, client defaults,
/// per-call headers, then credentials for any header not already present.
pub(crate) fn assemble_headers(
    method: &Method,
    request_id: &str,
    defaults: &HeaderMap,
    per_call: &HeaderMap,
    credentials: ResolvedCredentials<'_>,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if *method != Method::GET {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers.insert(X_REQUEST_ID, header_value(request_id)?);

    overlay(&mut headers, defaults);
    overlay(&mut headers, per_call);

    if let Some(key) = credentials.api_key {
        inject(&mut headers, X_API_KEY, key)?;
    }
    if let Some(token) = credentials.auth_bearer {
        inject(&mut headers, AUTHORIZATION, &bearer(token))?;
    }
    if let Some(token) = credentials.admin_token {
        inject(&mut headers, X_ADMIN_TOKEN, token)?;
    }

    Ok(headers)
}

/// Renders a GET payload as query pairs.
///
/// Nulls are skipped, booleans render as `true`/`false`, arrays repeat the
/// key once per non-null element and nested objects render as compact JSON.
pub(crate) fn encode_query(payload: &Value) -> Result<Vec<(String, String)>> {
    let obj = match payload {
        Value::Null => return Ok(Vec::new()),
        Value::Object(obj) => obj,
        other => {
            return Err(Error::SerializationFailed(format!(
                "GET payload must be a JSON object, got {}",
                json_kind(other)
            )))
        }
    };

    let mut pairs = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        match value {
            Value::Array(items) => pairs.extend(
                items
                    .iter()
                    .filter_map(query_value)
                    .map(|v| (key.clone(), v)),
            ),
            scalar => pairs.extend(query_value(scalar).map(|v| (key.clone(), v))),
        }
    }
    Ok(pairs)
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::Bool(false) => Some("false".to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn overlay(target: &mut HeaderMap, source: &HeaderMap) {
    for name in source.keys() {
        target.remove(name);
        for value in source.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

fn inject(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<()> {
    // HeaderName is always lowercase, so this lookup is case-insensitive.
    if !headers.contains_key(&name) {
        headers.insert(name, header_value(value)?);
    }
    Ok(())
}

fn bearer(token: &str) -> String {
    let prefixed = token
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "));
    if prefixed {
        token.to_string()
    } else {
        format!("Bearer {}", token)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))
}
