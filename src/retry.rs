//! Retry policy and backoff computation.
//!
//! A [`RetryPolicy`] is always bounds-checked: out-of-range values are
//! clamped rather than rejected. Per-call tweaks are expressed as a
//! [`RetryOverride`] and merged over the client's base policy with
//! [`RetryPolicy::merge`].

use rand::Rng;
use std::time::Duration;

/// Upper bound for [`RetryPolicy::max_retries`].
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Smallest delay the policy will ever produce.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

const BASE_DELAY_LIMIT: Duration = Duration::from_secs(30);
const MAX_DELAY_LIMIT: Duration = Duration::from_secs(60);

/// Bounds-checked retry parameters.
///
/// | field          | bounds            | default |
/// |----------------|-------------------|---------|
/// | `max_retries`  | `0..=10`          | 2       |
/// | `base_delay`   | `1ms..=30s`       | 200ms   |
/// | `max_delay`    | `1ms..=60s`       | 2s      |
/// | `jitter_ratio` | `0.0..=1.0`       | 0.2     |
///
/// `base_delay <= max_delay` is not enforced; `max_delay` still caps every
/// computed delay.
///
/// # Examples
///
/// ```
/// use aionis_client::RetryPolicy;
/// use std::time::Duration;
///
/// // Out-of-range values are clamped, not rejected.
/// let policy = RetryPolicy::new(50, Duration::from_millis(100), Duration::from_secs(120), 3.0);
/// assert_eq!(policy.max_retries(), 10);
/// assert_eq!(policy.max_delay(), Duration::from_secs(60));
/// assert_eq!(policy.jitter_ratio(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy, clamping every field to its bounds.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration, jitter_ratio: f64) -> Self {
        Self {
            max_retries: max_retries.min(MAX_RETRIES_LIMIT),
            base_delay: base_delay.clamp(MIN_DELAY, BASE_DELAY_LIMIT),
            max_delay: max_delay.clamp(MIN_DELAY, MAX_DELAY_LIMIT),
            jitter_ratio: clamp_ratio(jitter_ratio),
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Maximum number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the first retry; doubles on every subsequent retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Cap applied to the exponential term before jitter.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Fraction of the capped delay used as symmetric jitter spread.
    pub fn jitter_ratio(&self) -> f64 {
        self.jitter_ratio
    }

    /// Produces a new policy taking each field from `over` when present, else
    /// from `self`, then clamping. `self` is left untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use aionis_client::{RetryOverride, RetryPolicy};
    ///
    /// let base = RetryPolicy::default();
    /// let merged = base.merge(&RetryOverride::new().max_retries(5).jitter_ratio(-1.0));
    ///
    /// assert_eq!(merged.max_retries(), 5);
    /// assert_eq!(merged.jitter_ratio(), 0.0);
    /// assert_eq!(merged.base_delay(), base.base_delay());
    /// ```
    pub fn merge(&self, over: &RetryOverride) -> Self {
        Self::new(
            over.max_retries.unwrap_or(self.max_retries),
            over.base_delay.unwrap_or(self.base_delay),
            over.max_delay.unwrap_or(self.max_delay),
            over.jitter_ratio.unwrap_or(self.jitter_ratio),
        )
    }

    /// Returns the backoff before the given retry.
    ///
    /// `attempt` is the 1-indexed retry number (1 = first retry). The
    /// exponential term `base_delay * 2^(attempt - 1)` is capped at
    /// `max_delay`, then shifted by a uniform offset in
    /// `[-capped * jitter_ratio, +capped * jitter_ratio]`. The result is never
    /// below [`MIN_DELAY`].
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_for_attempt_with(attempt, &mut rand::thread_rng())
    }

    /// Same as [`delay_for_attempt`](Self::delay_for_attempt) with a caller-supplied RNG.
    pub fn delay_for_attempt_with<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let exp = self.base_delay.saturating_mul(1u32 << exponent);
        let capped = exp.min(self.max_delay);

        let spread = capped.as_secs_f64() * self.jitter_ratio;
        if spread <= 0.0 {
            return capped.max(MIN_DELAY);
        }

        let offset = rng.gen_range(-spread..=spread);
        let jittered = (capped.as_secs_f64() + offset).max(MIN_DELAY.as_secs_f64());
        Duration::try_from_secs_f64(jittered).unwrap_or(MIN_DELAY)
    }
}

/// A partial [`RetryPolicy`]: any subset of the four fields.
///
/// Values are not validated here; clamping happens when the override is
/// merged.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryOverride {
    /// Overrides [`RetryPolicy::max_retries`].
    pub max_retries: Option<u32>,
    /// Overrides [`RetryPolicy::base_delay`].
    pub base_delay: Option<Duration>,
    /// Overrides [`RetryPolicy::max_delay`].
    pub max_delay: Option<Duration>,
    /// Overrides [`RetryPolicy::jitter_ratio`].
    pub jitter_ratio: Option<f64>,
}

impl RetryOverride {
    /// An override that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the base delay.
    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = Some(base_delay);
        self
    }

    /// Sets the delay cap.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Sets the jitter ratio.
    pub fn jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = Some(jitter_ratio);
        self
    }
}

impl From<RetryPolicy> for RetryOverride {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_retries: Some(policy.max_retries),
            base_delay: Some(policy.base_delay),
            max_delay: Some(policy.max_delay),
            jitter_ratio: Some(policy.jitter_ratio),
        }
    }
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        0.0
    } else {
        ratio.clamp(0.0, 1.0)
    }
}
