//! Token-bucket rate limiter for generation calls.
//!
//! One shared bucket per executor instance. Tokens refill continuously at
//! `rate_per_sec` up to `capacity`; `acquire` waits out any deficit. The
//! bucket state is mutated under a std mutex that is never held across an
//! await, so read-modify-write stays atomic with respect to the runtime.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Rate limiter with burst allowance.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    pub fn new(capacity: f64, rate_per_sec: f64) -> Self {
        Self {
            capacity: capacity.max(1.0),
            rate_per_sec: rate_per_sec.max(f64::MIN_POSITIVE),
            state: Mutex::new(BucketState {
                tokens: capacity.max(1.0),
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Take one token if available, otherwise report how long until one
    /// refills.
    fn try_take(&self) -> std::result::Result<(), Duration> {
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(deficit / self.rate_per_sec))
        }
    }

    /// Acquire one token, sleeping until the bucket refills if necessary.
    pub async fn acquire(&self) {
        loop {
            match self.try_take() {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Acquire one token without waiting. Returns false when exhausted.
    pub fn try_acquire(&self) -> bool {
        self.try_take().is_ok()
    }

    /// Snapshot of currently available tokens.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().expect("token bucket poisoned");
        self.refill(&mut state);
        state.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(4.0, 2.0);
        assert_eq!(bucket.capacity(), 4.0);
        assert!(bucket.available() >= 4.0 - 1e-6);
    }

    #[tokio::test]
    async fn test_burst_then_exhaustion() {
        let bucket = TokenBucket::new(3.0, 0.001);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let bucket = TokenBucket::new(1.0, 10.0);
        bucket.acquire().await;
        // Bucket is empty; next acquire must wait ~100ms of (paused) time.
        let start = Instant::now();
        bucket.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(90), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_capacity() {
        let bucket = TokenBucket::new(2.0, 100.0);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(bucket.available() <= 2.0 + 1e-6);
    }
}
