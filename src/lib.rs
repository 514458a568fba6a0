pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod provider;
pub mod routing;
pub mod runtime;

pub use config::OrchestratorConfig;
pub use error::{Error, ErrorKind, Result, Severity};
pub use orchestration::{Orchestrator, PhasedExecutor, ResultIntegrator, TaskDecomposer};
pub use routing::{Category, FinalResponse, RequestContext, Router};

/// Wiring verification tests.
///
/// The context object is the seam every component hangs off; these tests
/// pin the config-to-runtime wiring so a refactor cannot silently detach a
/// tunable from the component that consumes it.
#[cfg(test)]
mod wiring_tests {
    use super::*;
    use crate::provider::{Completion, GenerationClient};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NullGeneration;

    #[async_trait]
    impl GenerationClient for NullGeneration {
        async fn complete(&self, _system: &str, _user: &str) -> Result<Completion> {
            Ok(Completion {
                text: String::new(),
            })
        }
    }

    #[test]
    fn test_context_wires_pool_size() {
        let config = OrchestratorConfig {
            pool_size: 7,
            ..Default::default()
        };
        let ctx = Orchestrator::new(config, Arc::new(NullGeneration));
        assert_eq!(ctx.pool.size(), 7);
        assert_eq!(ctx.pool.available(), 7);
    }

    #[test]
    fn test_context_wires_limiter_burst() {
        let config = OrchestratorConfig {
            burst: 9.0,
            rate_per_sec: 1.0,
            ..Default::default()
        };
        let ctx = Orchestrator::new(config, Arc::new(NullGeneration));
        assert_eq!(ctx.limiter.capacity(), 9.0);
    }

    #[test]
    fn test_context_wires_retry_attempts() {
        let config = OrchestratorConfig {
            retry_max_attempts: 6,
            ..Default::default()
        };
        let ctx = Orchestrator::new(config, Arc::new(NullGeneration));
        assert_eq!(ctx.retry.max_attempts(), 6);
    }

    #[test]
    fn test_two_contexts_are_isolated() {
        let a = Orchestrator::new(OrchestratorConfig::default(), Arc::new(NullGeneration));
        let b = Orchestrator::new(OrchestratorConfig::default(), Arc::new(NullGeneration));
        a.breaker.record_failure("op");
        assert_eq!(a.breaker.failure_count("op"), 1);
        // No hidden global registry: the second context is untouched.
        assert_eq!(b.breaker.failure_count("op"), 0);
    }
}
