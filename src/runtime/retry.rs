//! Bounded retry with exponential backoff and jitter.
//!
//! Wraps a fallible asynchronous operation: retries up to `max_attempts`
//! with `base_delay * 2^(attempt-1)` backoff capped at `max_delay`, each
//! delay jittered by ±50%. A `Critical`-severity error aborts immediately
//! without further attempts.

use crate::error::{Error, Result};
use crate::slog_debug;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry policy for collaborator calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff delay before retrying after `attempt` (1-based) failed.
    ///
    /// Exponential in the attempt number, capped at `max_delay`, with ±50%
    /// jitter. The jittered value is clamped so no delay ever exceeds
    /// `max_delay`, keeping the sequence non-decreasing in expectation.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);

        let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
        let jittered = base.mul_f64(jitter_factor);
        jittered.min(self.max_delay)
    }

    /// Execute `op`, retrying on failure per policy.
    ///
    /// Returns the first success, aborts immediately on a non-retryable
    /// (critical) error, and wraps the final failure in
    /// `RetriesExhausted` once attempts run out.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => {
                    slog_debug!(
                        "'{}' failed with critical severity, aborting retries: {}",
                        operation,
                        err
                    );
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    return Err(Error::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                Err(err) => {
                    let delay = self.delay_for_attempt(attempt);
                    slog_debug!(
                        "'{}' attempt {}/{} failed ({}), retrying in {:?}",
                        operation,
                        attempt,
                        self.max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250), Duration::from_secs(5))
    }
}
