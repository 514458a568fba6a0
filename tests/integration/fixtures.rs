//! Test fixtures for integration tests.
//!
//! Provides mock collaborators with scripted behavior, concurrency
//! tracking, and a fast config so the suite never sleeps for real backoff
//! intervals.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use strata::config::OrchestratorConfig;
use strata::error::{Error, Result};
use strata::orchestration::Orchestrator;
use strata::provider::{Completion, GenerationClient};

/// Config with millisecond backoffs and an effectively unlimited rate
/// budget, so tests measure behavior rather than waiting.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry_max_attempts: 1,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 5,
        rate_per_sec: 100_000.0,
        burst: 100_000.0,
        ..OrchestratorConfig::default()
    }
}

pub fn ctx_with(
    config: OrchestratorConfig,
    generation: Arc<dyn GenerationClient>,
) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(config, generation))
}

/// Generation mock that records every prompt and tracks how many calls are
/// in flight at once. Calls whose prompt contains a configured marker fail
/// with a medium-severity LLM error.
pub struct TrackingGeneration {
    pub fail_markers: Vec<String>,
    pub delay: Duration,
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl TrackingGeneration {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(0))
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            fail_markers: Vec::new(),
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(markers: &[&str]) -> Self {
        Self {
            fail_markers: markers.iter().map(|m| m.to_string()).collect(),
            ..Self::new()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrency_seen(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for TrackingGeneration {
    async fn complete(&self, _system: &str, user: &str) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_markers.iter().any(|m| user.contains(m)) {
            return Err(Error::llm("simulated generation outage"));
        }
        Ok(Completion {
            text: format!("output for: {}", user.lines().next().unwrap_or_default()),
        })
    }
}

/// Generation mock that fails the first `failures` calls and succeeds
/// afterwards.
pub struct FlakyGeneration {
    failures: usize,
    pub calls: AtomicUsize,
}

impl FlakyGeneration {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GenerationClient for FlakyGeneration {
    async fn complete(&self, _system: &str, _user: &str) -> Result<Completion> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(Error::llm("transient failure"))
        } else {
            Ok(Completion {
                text: "recovered output".to_string(),
            })
        }
    }
}

/// A collaborator plan in the JSON shape the decomposer expects:
/// analysis, then implementation and testing depending on it.
pub fn three_step_plan() -> String {
    r#"[
        {"title": "Design data model", "description": "Entities and relations", "kind": "analysis", "depends_on": []},
        {"title": "Implement endpoints", "description": "import express\nfn create_user() {}", "kind": "implementation", "depends_on": [0]},
        {"title": "Write integration tests", "description": "Cover the happy path and auth failures", "kind": "testing", "depends_on": [0]}
    ]"#
    .to_string()
}
