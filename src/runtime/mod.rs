//! Cross-cutting reliability utilities.
//!
//! These are the pieces every execution path shares: the resource pool
//! bounding in-flight generation calls, the token-bucket rate limiter, the
//! per-operation circuit breaker, and the retry policy. They hold no
//! domain knowledge; the orchestration layer composes them.

pub mod breaker;
pub mod limiter;
pub mod pool;
pub mod retry;

pub use breaker::{BreakerState, CircuitBreaker};
pub use limiter::TokenBucket;
pub use pool::{ResourcePool, SlotGuard};
pub use retry::RetryPolicy;
