//! The client and its request-execution loop.
//!
//! [`Client`] owns an immutable configuration (base URL, default headers,
//! default credentials, default retry policy and timeout). Every call goes
//! through one attempt loop: send, classify, maybe back off, retry.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::classify::{classify_failure, is_retryable_status, parse_body};
use crate::options::{parse_header, Credentials, RequestOptions};
use crate::rate_limit::server_delay;
use crate::request::{build_context, split_path, Defaults, RequestContext};
use crate::retry::{RetryOverride, RetryPolicy};
use crate::{Error, NetworkError, Response, Result};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Base URL used by [`ClientBuilder::from_env`] when `AIONIS_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// A client for the memory service.
///
/// The client is cheap to clone and safe to share between tasks; clones share
/// one connection pool and one read-only configuration.
///
/// # Examples
///
/// ```no_run
/// use aionis_client::{Client, RequestOptions, RetryOverride};
/// use serde_json::json;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), aionis_client::Error> {
/// let client = Client::builder()
///     .base_url("http://localhost:3001")?
///     .timeout(Duration::from_secs(5))
///     .retry(RetryOverride::new().max_retries(3))
///     .api_key("sk_live_123")
///     .build()?;
///
/// let recalled = client
///     .recall_text(&json!({ "query_text": "release checklist" }), RequestOptions::default())
///     .await?;
/// println!("{} ({})", recalled.data, recalled.request_id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http_client: reqwest::Client,
    base_url: Url,
    default_headers: HeaderMap,
    credentials: Credentials,
    retry: RetryPolicy,
    timeout: Duration,
}

/// Outcome of one send that produced an HTTP response.
struct Received {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
    request_id: String,
}

impl Client {
    /// Creates a new `ClientBuilder`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The base URL every path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The client's default retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// The client's default per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Calls an arbitrary endpoint.
    ///
    /// For GET, `payload` is encoded as a query string; for every other
    /// method it is sent as a JSON body (`{}` when absent).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use aionis_client::{Client, RequestOptions};
    /// use http::Method;
    /// use serde_json::json;
    ///
    /// # async fn example() -> Result<(), aionis_client::Error> {
    /// let client = Client::builder().base_url("http://localhost:3001")?.build()?;
    ///
    /// let page = client
    ///     .call(Method::GET, "/v1/admin/control/tenants", Some(&json!({ "limit": 20 })), RequestOptions::default())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<P>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&P>,
        options: RequestOptions,
    ) -> Result<Response<Value>>
    where
        P: Serialize + ?Sized,
    {
        self.execute(method, &split_path(path), payload, options).await
    }

    /// Runs the attempt loop for one call.
    pub(crate) async fn execute<P>(
        &self,
        method: Method,
        segments: &[&str],
        payload: Option<&P>,
        options: RequestOptions,
    ) -> Result<Response<Value>>
    where
        P: Serialize + ?Sized,
    {
        let payload = payload
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::SerializationFailed(e.to_string()))?;

        let policy = self
            .inner
            .retry
            .merge(&options.retry.unwrap_or_default());
        let ctx = build_context(&self.defaults(), method, segments, payload, &options)?;
        let cancel = options.cancel.as_ref();
        let path = ctx.url().path().to_string();

        let start_time = Instant::now();
        let mut retries = 0u32;

        loop {
            let attempt = retries + 1;
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(cancelled(&ctx));
            }

            tracing::debug!(
                method = %ctx.method(),
                url = %ctx.url(),
                attempt = attempt,
                request_id = %ctx.request_id(),
                "Executing HTTP request"
            );

            let sent = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled(&ctx)),
                    result = self.send_once(&ctx) => result,
                },
                None => self.send_once(&ctx).await,
            };

            let can_retry = retries < policy.max_retries();

            let (delay, from_server) = match sent {
                Ok(received) if received.status.is_success() => {
                    tracing::info!(
                        status = received.status.as_u16(),
                        latency_ms = start_time.elapsed().as_millis(),
                        attempts = attempt,
                        "Received HTTP response"
                    );
                    return Ok(Response::new(
                        received.body,
                        received.status,
                        received.request_id,
                        received.headers,
                        start_time.elapsed(),
                        attempt,
                    ));
                }
                Ok(received) => {
                    let err =
                        classify_failure(received.status, &received.body, &received.request_id);

                    tracing::warn!(
                        error = %err,
                        attempt = attempt,
                        method = %ctx.method(),
                        path = %path,
                        "Request failed"
                    );

                    if !(can_retry && is_retryable_status(received.status)) {
                        if received.status.is_server_error() {
                            tracing::warn!(status = received.status.as_u16(), code = %err.code, "Server error (5xx)");
                        } else {
                            tracing::error!(status = received.status.as_u16(), code = %err.code, "Client error");
                        }
                        return Err(Error::Api(err));
                    }

                    match server_delay(&received.headers) {
                        Some(delay) => (delay, true),
                        None => (policy.delay_for_attempt(attempt), false),
                    }
                }
                Err(transport) => {
                    tracing::warn!(
                        error = %transport,
                        attempt = attempt,
                        method = %ctx.method(),
                        path = %path,
                        "Request failed"
                    );

                    if !can_retry {
                        return Err(Error::Network(NetworkError {
                            message: format!(
                                "network request failed for {} {}: {}",
                                ctx.method(),
                                path,
                                transport
                            ),
                            request_id: ctx.request_id().to_string(),
                            timed_out: transport.is_timeout(),
                        }));
                    }
                    (policy.delay_for_attempt(attempt), false)
                }
            };

            tracing::info!(
                delay_ms = delay.as_millis(),
                attempt = attempt,
                retry_after = from_server,
                "Retrying request after delay"
            );
            if !pause(delay, cancel).await {
                return Err(cancelled(&ctx));
            }
            retries += 1;
        }
    }

    /// Sends one attempt and reads the whole body.
    async fn send_once(&self, ctx: &RequestContext) -> std::result::Result<Received, reqwest::Error> {
        let mut request = self
            .inner
            .http_client
            .request(ctx.method().clone(), ctx.url().clone())
            .headers(ctx.headers().clone())
            .timeout(ctx.timeout());

        if let Some(body) = ctx.body() {
            request = request.body(body.to_vec());
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let raw = response.bytes().await?;

        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(ctx.request_id())
            .to_string();

        Ok(Received {
            status,
            body: parse_body(&headers, &raw),
            headers,
            request_id,
        })
    }

    fn defaults(&self) -> Defaults<'_> {
        Defaults {
            base_url: &self.inner.base_url,
            headers: &self.inner.default_headers,
            credentials: &self.inner.credentials,
            timeout: self.inner.timeout,
        }
    }
}

/// Sleeps for `delay`, returning `false` if `cancel` fired first.
async fn pause(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        },
        None => {
            tokio::time::sleep(delay).await;
            true
        }
    }
}

fn cancelled(ctx: &RequestContext) -> Error {
    tracing::info!(request_id = %ctx.request_id(), "Request cancelled");
    Error::Cancelled {
        request_id: ctx.request_id().to_string(),
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use aionis_client::{ClientBuilder, RetryOverride};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), aionis_client::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://memory.example.com")?
///     .timeout(Duration::from_secs(30))
///     .retry(RetryOverride::new().max_retries(4).base_delay(Duration::from_millis(100)))
///     .default_header("User-Agent", "bench-runner/1.0")?
///     .auth_bearer("token-abc")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    credentials: Credentials,
    retry: RetryPolicy,
    timeout: Duration,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            credentials: Credentials::default(),
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a builder from the environment.
    ///
    /// | variable          | fallback           | setting        |
    /// |-------------------|--------------------|----------------|
    /// | `AIONIS_BASE_URL` | `http://localhost:3001` | base URL  |
    /// | `API_KEY`         | `PERF_API_KEY`     | `x-api-key`    |
    /// | `AUTH_BEARER`     | `PERF_AUTH_BEARER` | bearer token   |
    /// | `ADMIN_TOKEN`     |                    | admin token    |
    ///
    /// Values are trimmed; empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `AIONIS_BASE_URL` is not a valid URL.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        let base_url = var(&["AIONIS_BASE_URL"]).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let builder = Self::new().base_url(base_url)?;
        Ok(builder.credentials(Credentials {
            api_key: var(&["API_KEY", "PERF_API_KEY"]),
            auth_bearer: var(&["AUTH_BEARER", "PERF_AUTH_BEARER"]),
            admin_token: var(&["ADMIN_TOKEN"]),
        }))
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
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Merges `retry` over the current policy (initially the default policy).
    pub fn retry(mut self, retry: RetryOverride) -> Self {
        self.retry = self.retry.merge(&retry);
        self
    }

    /// Replaces the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces all default credentials at once.
    ///
    /// Unset fields are simply not injected; blank values count as unset.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the default `x-api-key`.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.credentials.api_key = Some(api_key.into());
        self
    }

    /// Sets the default bearer token.
    pub fn auth_bearer(mut self, token: impl Into<String>) -> Self {
        self.credentials.auth_bearer = Some(token.into());
        self
    }

    /// Sets the default `x-admin-token`.
    pub fn admin_token(mut self, token: impl Into<String>) -> Self {
        self.credentials.admin_token = Some(token.into());
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided, if the base URL cannot
    /// carry a path, or if the HTTP client cannot be created.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "Base URL {} cannot have a path",
                base_url
            )));
        }

        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                default_headers: self.default_headers,
                credentials: self.credentials,
                retry: self.retry,
                timeout: self.timeout.max(crate::request::MIN_TIMEOUT),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
