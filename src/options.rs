//! Per-call request options and credentials.

use crate::retry::RetryOverride;
use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for a single call. Built fresh per call and never persisted.
///
/// Credential fields follow one rule: `None` falls back to the client's
/// default credential, while an explicit empty (or all-whitespace) value
/// means "send no such credential on this call".
///
/// # Examples
///
/// ```
/// use aionis_client::{RequestOptions, RetryOverride};
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .with_request_id("bench-42")
///     .with_timeout(Duration::from_secs(3))
///     .with_retry(RetryOverride::new().max_retries(0))
///     .with_header("x-tenant-id", "default")
///     .unwrap()
///     .with_api_key(""); // suppress the client's default key for this call
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Request id to send; a UUID is generated when absent.
    pub request_id: Option<String>,

    /// Per-attempt timeout; the client default applies when absent.
    pub timeout: Option<Duration>,

    /// Partial retry policy merged over the client's policy.
    pub retry: Option<RetryOverride>,

    /// Extra headers. These override client default headers and suppress
    /// credential injection for any header they name.
    pub headers: HeaderMap,

    /// `x-api-key` override.
    pub api_key: Option<String>,

    /// Bearer token override for `authorization`.
    pub auth_bearer: Option<String>,

    /// `x-admin-token` override.
    pub admin_token: Option<String>,

    /// Aborts an in-flight send or a pending backoff sleep when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    /// Empty options: every setting falls back to the client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry override.
    pub fn with_retry(mut self, retry: RetryOverride) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Overrides the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the bearer token.
    pub fn with_auth_bearer(mut self, token: impl Into<String>) -> Self {
        self.auth_bearer = Some(token.into());
        self
    }

    /// Overrides the admin token.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Default credentials owned by a client.
#[derive(Clone, Default)]
pub struct Credentials {
    /// Sent as `x-api-key`.
    pub api_key: Option<String>,
    /// Sent as `authorization: Bearer <token>`.
    pub auth_bearer: Option<String>,
    /// Sent as `x-admin-token`.
    pub admin_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(v: &Option<String>) -> &'static str {
            if v.is_some() {
                "<redacted>"
            } else {
                "<none>"
            }
        }
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("auth_bearer", &mask(&self.auth_bearer))
            .field("admin_token", &mask(&self.admin_token))
            .finish()
    }
}

impl Credentials {
    /// Resolves the credentials for one call against its options.
    pub(crate) fn resolve<'a>(&'a self, options: &'a RequestOptions) -> ResolvedCredentials<'a> {
        ResolvedCredentials {
            api_key: pick(options.api_key.as_deref(), self.api_key.as_deref()),
            auth_bearer: pick(options.auth_bearer.as_deref(), self.auth_bearer.as_deref()),
            admin_token: pick(options.admin_token.as_deref(), self.admin_token.as_deref()),
        }
    }
}

/// Credentials that will actually be considered for injection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ResolvedCredentials<'a> {
    pub api_key: Option<&'a str>,
    pub auth_bearer: Option<&'a str>,
    pub admin_token: Option<&'a str>,
}

fn pick<'a>(per_call: Option<&'a str>, default: Option<&'a str>) -> Option<&'a str> {
    per_call
        .or(default)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub(crate) fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}
