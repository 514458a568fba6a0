//! Circuit breaker keyed by operation name.
//!
//! Tracks consecutive failures per named operation. Once failures reach the
//! threshold the circuit opens and callers fail fast without invoking the
//! collaborator; after the recovery window the circuit half-opens to let one
//! probe through. A probe success closes the circuit, a probe failure
//! re-opens it.
//!
//! Entries are created lazily per operation name and live for the
//! orchestrator's lifetime. State mutation happens under a std mutex that
//! is never held across an await.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// State of one named circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow normally.
    Closed,
    /// Calls fail fast until the recovery window elapses.
    Open,
    /// One probe call is allowed through.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
struct BreakerEntry {
    failures: u32,
    last_failure: Option<Instant>,
    state: BreakerState,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            failures: 0,
            last_failure: None,
            state: BreakerState::Closed,
        }
    }
}

/// Per-operation failure tracker with fast-fail and recovery probing.
#[derive(Debug)]
pub struct CircuitBreaker {
    entries: Mutex<HashMap<String, BreakerEntry>>,
    threshold: u32,
    recovery: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            threshold: threshold.max(1),
            recovery,
        }
    }

    /// Check whether a call to `operation` may proceed.
    ///
    /// Returns `Err(CircuitOpen)` while the circuit is open and the
    /// recovery window has not elapsed. When the window has elapsed the
    /// circuit transitions to half-open and the call is allowed as a probe.
    pub fn check(&self, operation: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("breaker registry poisoned");
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);

        match entry.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed_ok = entry
                    .last_failure
                    .map(|t| t.elapsed() >= self.recovery)
                    .unwrap_or(true);
                if elapsed_ok {
                    entry.state = BreakerState::HalfOpen;
                    crate::slog_debug!("circuit '{}' half-open, allowing probe", operation);
                    Ok(())
                } else {
                    Err(Error::CircuitOpen {
                        operation: operation.to_string(),
                    })
                }
            }
        }
    }

    /// Record a successful call: half-open closes, failure count resets.
    pub fn record_success(&self, operation: &str) {
        let mut entries = self.entries.lock().expect("breaker registry poisoned");
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);
        if entry.state != BreakerState::Closed {
            crate::slog_info!("circuit '{}' closed after successful probe", operation);
        }
        entry.failures = 0;
        entry.last_failure = None;
        entry.state = BreakerState::Closed;
    }

    /// Record a failed call: half-open re-opens, closed opens at threshold.
    pub fn record_failure(&self, operation: &str) {
        let mut entries = self.entries.lock().expect("breaker registry poisoned");
        let entry = entries
            .entry(operation.to_string())
            .or_insert_with(BreakerEntry::new);
        entry.failures += 1;
        entry.last_failure = Some(Instant::now());
        if entry.state == BreakerState::HalfOpen || entry.failures >= self.threshold {
            if entry.state != BreakerState::Open {
                crate::slog_warn!(
                    "circuit '{}' opened after {} failures",
                    operation,
                    entry.failures
                );
            }
            entry.state = BreakerState::Open;
        }
    }

    /// Current state of a named circuit.
    pub fn state(&self, operation: &str) -> BreakerState {
        self.entries
            .lock()
            .expect("breaker registry poisoned")
            .get(operation)
            .map(|e| e.state)
            .unwrap_or(BreakerState::Closed)
    }

    /// Consecutive failure count for a named circuit.
    pub fn failure_count(&self, operation: &str) -> u32 {
        self.entries
            .lock()
            .expect("breaker registry poisoned")
            .get(operation)
            .map(|e| e.failures)
            .unwrap_or(0)
    }
}
