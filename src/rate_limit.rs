//! Server-driven pacing.
//!
//! When a retryable response carries a `Retry-After` header, the server's
//! delay replaces the computed backoff for that retry.

use http::HeaderMap;
use std::time::Duration;

/// Parses the `Retry-After` header as a decimal number of seconds.
///
/// Only positive, finite values are honored. Zero, negative values, HTTP-date
/// values and anything else that does not parse as a number yield `None`,
/// meaning "no override".
///
/// # Examples
///
/// ```
/// use aionis_client::rate_limit::server_delay;
/// use http::HeaderMap;
/// use std::time::Duration;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("retry-after", "1.5".parse().unwrap());
/// assert_eq!(server_delay(&headers), Some(Duration::from_millis(1500)));
///
/// headers.insert("retry-after", "0".parse().unwrap());
/// assert_eq!(server_delay(&headers), None);
/// ```
pub fn server_delay(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = header.trim().parse::<f64>().ok()?;

    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }

    Duration::try_from_secs_f64(seconds).ok()
}
