//! Orchestration layer: decompose, execute in phases, integrate.
//!
//! The [`Orchestrator`] is the explicit context object holding all shared
//! runtime state (pool, limiter, breaker, retry policy, collaborator
//! handles). It is constructed once per process or per test and passed by
//! `Arc` into every component, so there is no hidden global state and
//! tests stay hermetic.

pub mod decomposer;
pub mod executor;
pub mod extract;
pub mod integrator;

pub use decomposer::{Complexity, DecompositionStrategy, TaskDecomposer};
pub use executor::{ExecutionMetrics, ExecutionReport, ExecutorEvent, PhasedExecutor, SubtaskResult};
pub use extract::{DependencyExtractor, RegexExtractor};
pub use integrator::{
    ConflictResolution, IntegratedResult, IntegrationPath, IntegrationTier, NamingConflict,
    ResultIntegrator,
};

use crate::config::OrchestratorConfig;
use crate::provider::{ClassificationClient, ContextRetriever, GenerationClient};
use crate::runtime::{CircuitBreaker, RetryPolicy, ResourcePool, TokenBucket};
use std::sync::Arc;
use std::time::Duration;

/// Shared context for one orchestration engine instance.
///
/// Owns the reliability utilities and the collaborator handles. The
/// generation collaborator is mandatory; classification and retrieval are
/// optional and the routing layer falls back to deterministic behavior
/// when they are absent.
pub struct Orchestrator {
    pub config: OrchestratorConfig,
    pub pool: Arc<ResourcePool>,
    pub limiter: Arc<TokenBucket>,
    pub breaker: Arc<CircuitBreaker>,
    pub retry: RetryPolicy,
    pub generation: Arc<dyn GenerationClient>,
    pub classification: Option<Arc<dyn ClassificationClient>>,
    pub retrieval: Option<Arc<dyn ContextRetriever>>,
}

impl Orchestrator {
    /// Build a context from config plus the mandatory generation client.
    pub fn new(config: OrchestratorConfig, generation: Arc<dyn GenerationClient>) -> Self {
        let pool = Arc::new(ResourcePool::new(config.pool_size));
        let limiter = Arc::new(TokenBucket::new(config.burst, config.rate_per_sec));
        let breaker = Arc::new(CircuitBreaker::new(
            config.breaker_threshold,
            Duration::from_secs(config.breaker_recovery_secs),
        ));
        let retry = RetryPolicy::new(
            config.retry_max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        );
        Self {
            config,
            pool,
            limiter,
            breaker,
            retry,
            generation,
            classification: None,
            retrieval: None,
        }
    }

    pub fn with_classification(mut self, client: Arc<dyn ClassificationClient>) -> Self {
        self.classification = Some(client);
        self
    }

    pub fn with_retrieval(mut self, retriever: Arc<dyn ContextRetriever>) -> Self {
        self.retrieval = Some(retriever);
        self
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("pool_size", &self.pool.size())
            .field("breaker_threshold", &self.config.breaker_threshold)
            .field("has_classification", &self.classification.is_some())
            .field("has_retrieval", &self.retrieval.is_some())
            .finish()
    }
}
