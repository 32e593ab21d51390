//! Bounded exponential-backoff retry.
//!
//! [`RetryPolicy`] is a plain value: callers wrap any async operation with
//! [`RetryPolicy::run`], and the delay schedule can be inspected with
//! [`RetryPolicy::delay_for`] without running anything.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, warn};

/// How many times to attempt an operation and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
    /// Growth factor applied per failed attempt. Values below 1 behave as 1.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    /// 3 attempts, 2s initial delay doubling up to 10s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Wait after the `failed_attempt`-th failure (1-based).
    ///
    /// `initial_delay * multiplier^(failed_attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        // f64::max ignores NaN, so a NaN multiplier degrades to a constant delay.
        let multiplier = self.multiplier.max(1.0);
        let secs = self.initial_delay.as_secs_f64() * multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64()).max(0.0);
        Duration::try_from_secs_f64(capped)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// `op` receives the 1-based attempt number. Every error is retried; the
    /// last one is returned unchanged. Callers keep non-transient failures
    /// (bad templates, bad config) outside the closure.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(operation, attempt, max_attempts, "Starting attempt");

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(operation, attempts = attempt, error = %e, "All attempts failed");
                    return Err(e);
                }
            }
        }
    }
}
