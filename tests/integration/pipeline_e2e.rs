//! End-to-end routing pipeline tests with mocked collaborators.

use async_trait::async_trait;
use std::sync::Arc;

use strata::core::task::{Task, TaskStatus};
use strata::error::Result;
use strata::orchestration::{PhasedExecutor, ResultIntegrator, TaskDecomposer};
use strata::provider::{Completion, GenerationClient};
use strata::routing::state::{HistoryTurn, RequestContext};
use strata::routing::{fallback_classify, Category, Router};

use crate::fixtures::{ctx_with, fast_config, three_step_plan, TrackingGeneration};

/// Returns a structured plan for decomposition prompts and plain text for
/// everything else.
struct PlanAwareGeneration;

#[async_trait]
impl GenerationClient for PlanAwareGeneration {
    async fn complete(&self, _system: &str, user: &str) -> Result<Completion> {
        let text = if user.contains("Break this request") {
            three_step_plan()
        } else {
            // Echo the prompt so subtask descriptions (and their imports)
            // flow through into results.
            format!("result:\n{}", user)
        };
        Ok(Completion { text })
    }
}

#[test]
fn test_rest_api_scenario_classifies_as_code_generation() {
    let classification = fallback_classify(
        "Create a REST API for user management with JWT authentication",
        &RequestContext::default(),
    );
    assert_eq!(classification.category, Category::CodeGeneration);
    assert_eq!(classification.confidence, 0.7);
}

#[tokio::test]
async fn test_generation_route_end_to_end() {
    let ctx = ctx_with(fast_config(), Arc::new(PlanAwareGeneration));
    let router = Router::new(ctx);

    let response = router
        .route(
            "Create a REST API for user management with JWT authentication",
            RequestContext::default(),
        )
        .await;

    assert_eq!(response.workflow, "code_generation");
    assert!(!response.text.is_empty());
    // The implementation subtask declared an express import; the
    // integrator surfaces it as a resolved dependency.
    assert!(response.sources.contains(&"express".to_string()));
}

#[tokio::test]
async fn test_chat_route_end_to_end() {
    let ctx = ctx_with(fast_config(), Arc::new(TrackingGeneration::new()));
    let router = Router::new(ctx);

    let context = RequestContext {
        history: vec![HistoryTurn {
            role: "user".to_string(),
            content: "we talked about orchestration".to_string(),
        }],
        uploads: Vec::new(),
    };
    let response = router.route("What did I ask about earlier?", context).await;

    assert_eq!(response.workflow, "general_chat");
    assert!(response.text.starts_with("output for:"));
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn test_validation_failure_end_to_end() {
    let client = Arc::new(TrackingGeneration::new());
    let ctx = ctx_with(fast_config(), client.clone());
    let router = Router::new(ctx);

    let response = router.route("", RequestContext::default()).await;

    assert_eq!(response.workflow, "error");
    assert!(response.text.contains("empty"));
    // Nothing downstream ran.
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_decompose_then_integrate_round_trip() {
    let ctx = ctx_with(fast_config(), Arc::new(PlanAwareGeneration));
    let task = Task::new(
        "user api",
        "Create a REST API for user management with JWT authentication",
    );

    let subtasks = TaskDecomposer::new(Arc::clone(&ctx)).decompose(&task).await;
    assert!(subtasks.len() >= 2);

    let report = PhasedExecutor::new(Arc::clone(&ctx))
        .execute(&task, subtasks)
        .await
        .unwrap();
    assert_eq!(report.failed, 0);

    let integrated = ResultIntegrator::new(ctx)
        .integrate(&task, &report.results)
        .await;
    assert_eq!(integrated.status, TaskStatus::Completed);
    assert!((0.0..=1.0).contains(&integrated.quality_score));
    assert!(!integrated.solution.is_empty());
    assert!(!integrated.architecture_summary.is_empty());
}

#[tokio::test]
async fn test_malformed_context_never_fails_the_request() {
    let ctx = ctx_with(fast_config(), Arc::new(TrackingGeneration::new()));
    let router = Router::new(ctx);

    let (context, warning) = RequestContext::from_json("{broken json!");
    assert!(warning.is_some());

    let response = router.route("Tell me a joke", context).await;
    assert_eq!(response.workflow, "general_chat");
}
