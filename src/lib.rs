//! # aionis-client - a retrying HTTP client for the Aionis memory service
//!
//! `aionis-client` is an async client built on top of `reqwest`. Every call
//! goes through one attempt loop that handles request ids, credential
//! injection, per-attempt timeouts, bounded retries with jittered exponential
//! backoff, `Retry-After` pacing and cancellation, and normalizes the outcome
//! into a [`Response`] or a structured [`Error`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use aionis_client::{Client, RequestOptions, RetryOverride};
//! use serde::Deserialize;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct WriteResult {
//!     commit_id: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), aionis_client::Error> {
//!     let client = Client::builder()
//!         .base_url("http://localhost:3001")?
//!         .timeout(Duration::from_secs(5))
//!         .retry(RetryOverride::new().max_retries(3))
//!         .api_key("sk_live_123")
//!         .build()?;
//!
//!     let written = client
//!         .write(
//!             &json!({ "tenant_id": "default", "input_text": "deploy finished" }),
//!             RequestOptions::default(),
//!         )
//!         .await?
//!         .decode::<WriteResult>()?;
//!     println!("commit {} in {:?}", written.data.commit_id, written.latency);
//!
//!     let events = client
//!         .list_session_events("sess-1", Some(&json!({ "limit": 10 })), RequestOptions::default())
//!         .await?;
//!     println!("{}", events.data);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Bounded retries** - 429 and 5xx responses and transport failures are retried with capped, jittered exponential backoff
//! - **Server pacing** - a `Retry-After` header in seconds replaces the computed backoff
//! - **Per-call overrides** - request id, timeout, retry policy, headers and credentials can be changed for one call
//! - **Structured errors** - API failures carry status, code, message, details and the request id
//! - **Capability contracts** - helpers to recognize degraded-backend errors and read the advertised contract
//! - **Cancellation** - a `CancellationToken` aborts an in-flight send or a pending backoff
//! - **Automatic logging** - structured logging with `tracing`
//!
//! ## Error Handling
//!
//! ```no_run
//! use aionis_client::{capability, Client, Error, RequestOptions};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("http://localhost:3001")?.build()?;
//! match client.pack_export(&json!({ "scope": "default" }), RequestOptions::default()).await {
//!     Ok(response) => println!("exported: {}", response.data),
//!     Err(Error::Api(err)) => match err.capability_details() {
//!         Some(details) if err.code == capability::BACKEND_CAPABILITY_UNSUPPORTED => {
//!             eprintln!("{} unsupported by {:?}", details.capability, details.backend);
//!         }
//!         _ => eprintln!("{} (request {})", err, err.request_id),
//!     },
//!     Err(Error::Network(err)) if err.timed_out => eprintln!("timed out: {}", err.message),
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! The default policy makes up to 2 retries, starting at 200ms and capped at
//! 2s, with ±20% jitter. Overrides are merged field by field and clamped:
//!
//! ```no_run
//! use aionis_client::{Client, RequestOptions, RetryOverride};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), aionis_client::Error> {
//! # let client = Client::builder().base_url("http://localhost:3001")?.build()?;
//! let options = RequestOptions::new()
//!     .with_retry(RetryOverride::new().max_retries(0))
//!     .with_timeout(Duration::from_secs(2));
//! client.recall(&json!({ "query_embedding": [0.1, 0.2] }), options).await?;
//! # Ok(())
//! # }
//! ```

mod api;
pub mod capability;
pub mod classify;
mod client;
mod control;
mod error;
pub mod options;
pub mod rate_limit;
mod request;
mod response;
pub mod retry;

pub use api::HealthResponse;
pub use capability::{
    CapabilityContract, CapabilityContractSpec, CapabilityErrorDetails, FailureMode,
    ShadowDegradedMode, ShadowDualWriteFailureDetails,
};
pub use client::{Client, ClientBuilder, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use error::{ApiError, Error, NetworkError, Result, ValidationIssue};
pub use options::{Credentials, RequestOptions};
pub use response::Response;
pub use retry::{RetryOverride, RetryPolicy};
