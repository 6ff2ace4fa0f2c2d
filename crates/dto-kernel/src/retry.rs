//! Exponential backoff with jitter for task retries.
//!
//! Given an attempt count `k >= 1` (the just-incremented failure count), the
//! next-run delay in seconds is
//!
//! ```text
//! delay = min(cap, base * 2^(k-1)) + uniform(0, jitter)
//! ```
//!
//! `base`, `cap`, `jitter` are configured seconds. Jitter is additive and
//! non-negative, so the returned instant is always strictly in the future
//! relative to `now` (zero jitter still advances by at least `base`).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;

/// Exponential-backoff retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_seconds: f64,
    cap_seconds: f64,
    jitter_seconds: f64,
}

impl RetryPolicy {
    /// Build a policy from the three positive configuration values.
    #[must_use]
    pub fn new(base_seconds: f64, cap_seconds: f64, jitter_seconds: f64) -> Self {
        Self {
            base_seconds,
            cap_seconds,
            jitter_seconds,
        }
    }

    /// Compute the delay in seconds for attempt count `attempts` (>= 1).
    fn delay_seconds(&self, attempts: u32) -> f64 {
        let exponent = attempts.saturating_sub(1);
        let backoff = self.base_seconds * 2f64.powi(exponent as i32);
        let backoff = backoff.min(self.cap_seconds);

        let jitter = if self.jitter_seconds > 0.0 {
            rand::thread_rng().gen_range(0.0..self.jitter_seconds)
        } else {
            0.0
        };

        backoff + jitter
    }

    /// Compute the next-run instant in UTC for the given attempt count.
    ///
    /// `attempts` is the number of failed attempts already recorded, after
    /// incrementing for the attempt that just failed.
    #[must_use]
    pub fn compute_next_run(&self, attempts: u32) -> DateTime<Utc> {
        let delay = self.delay_seconds(attempts.max(1));
        Utc::now() + ChronoDuration::milliseconds((delay * 1000.0) as i64)
    }
}

impl Default for RetryPolicy {
    /// Defaults matching the reference configuration (`RETRY_BASE_SECONDS=1.0`,
    /// `RETRY_MAX_SECONDS=60.0`, `RETRY_JITTER_SECONDS=0.25`).
    fn default() -> Self {
        Self::new(1.0, 60.0, 0.25)
    }
}
