//! Configuration for the orchestration engine.
//!
//! Every tunable the runtime components consume lives here so that tests
//! can construct an [`Orchestrator`](crate::orchestration::Orchestrator)
//! with explicit values and deployments can pin them in
//! `~/.strata/strata.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::{slog_debug, Error, Result};

fn default_pool_size() -> usize {
    4
}
fn default_max_concurrency() -> usize {
    4
}
fn default_rate_per_sec() -> f64 {
    2.0
}
fn default_burst() -> f64 {
    4.0
}
fn default_breaker_threshold() -> u32 {
    5
}
fn default_breaker_recovery_secs() -> u64 {
    30
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    250
}
fn default_retry_max_delay_ms() -> u64 {
    5_000
}
fn default_max_input_len() -> usize {
    8_000
}
fn default_confidence_threshold() -> f64 {
    0.6
}
fn default_max_classify_retries() -> u32 {
    2
}
fn default_min_subtasks() -> usize {
    2
}
fn default_max_subtasks() -> usize {
    8
}

/// Tuning knobs for the orchestration pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of slots in the resource pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Global cap on concurrent subtask executions within a phase.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Token-bucket refill rate for generation calls, tokens per second.
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: f64,
    /// Token-bucket capacity (burst allowance).
    #[serde(default = "default_burst")]
    pub burst: f64,
    /// Consecutive failures before a circuit opens.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    /// Seconds an open circuit waits before half-opening.
    #[serde(default = "default_breaker_recovery_secs")]
    pub breaker_recovery_secs: u64,
    /// Maximum retry attempts for a fallible operation.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    /// Base backoff delay in milliseconds (doubles per attempt).
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Upper bound on any single backoff delay in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Maximum accepted request length in characters.
    #[serde(default = "default_max_input_len")]
    pub max_input_len: usize,
    /// Classification confidence below this routes to general chat.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Bounded self-loop on the classifying state.
    #[serde(default = "default_max_classify_retries")]
    pub max_classify_retries: u32,
    /// Lower clamp on decomposition size.
    #[serde(default = "default_min_subtasks")]
    pub min_subtasks: usize,
    /// Upper clamp on decomposition size.
    #[serde(default = "default_max_subtasks")]
    pub max_subtasks: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            max_concurrency: default_max_concurrency(),
            rate_per_sec: default_rate_per_sec(),
            burst: default_burst(),
            breaker_threshold: default_breaker_threshold(),
            breaker_recovery_secs: default_breaker_recovery_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            max_input_len: default_max_input_len(),
            confidence_threshold: default_confidence_threshold(),
            max_classify_retries: default_max_classify_retries(),
            min_subtasks: default_min_subtasks(),
            max_subtasks: default_max_subtasks(),
        }
    }
}

impl OrchestratorConfig {
    pub fn strata_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| Error::Config("no home directory".to_string()))?
            .join(".strata"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::strata_dir()?.join("strata.toml"))
    }

    /// Load from `~/.strata/strata.toml`, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        slog_debug!("OrchestratorConfig::load path={}", path.display());
        if !path.exists() {
            slog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::strata_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        slog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}
