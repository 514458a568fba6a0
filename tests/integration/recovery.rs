//! Retry, circuit-breaker, and partial-failure recovery behavior.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strata::core::task::{Subtask, SubtaskKind, Task, TaskStatus};
use strata::error::{Error, Result};
use strata::orchestration::{Orchestrator, PhasedExecutor};
use strata::provider::{Classification, ClassificationClient, Completion, GenerationClient};
use strata::routing::state::RequestContext;
use strata::routing::Router;
use strata::runtime::BreakerState;

use crate::fixtures::{ctx_with, fast_config, FlakyGeneration, TrackingGeneration};

fn sibling_set(task: &Task) -> Vec<Subtask> {
    vec![
        Subtask::new(task.id, "healthy-1", "first sibling", SubtaskKind::Implementation),
        Subtask::new(task.id, "doomed", "broken sibling", SubtaskKind::Implementation),
        Subtask::new(task.id, "healthy-2", "second sibling", SubtaskKind::Testing),
    ]
}

#[tokio::test]
async fn test_three_failures_exhaust_retries_but_spare_siblings() {
    let mut config = fast_config();
    config.retry_max_attempts = 3;

    let client = Arc::new(TrackingGeneration::failing_on(&["broken sibling"]));
    let ctx = ctx_with(config, client.clone());
    let task = Task::new("t", "d");

    let report = PhasedExecutor::new(ctx)
        .execute(&task, sibling_set(&task))
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.completed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.phases, 1);

    let doomed = report
        .results
        .iter()
        .find(|r| r.title == "doomed")
        .unwrap();
    assert_eq!(doomed.status, TaskStatus::Failed);
    assert!(doomed.error.as_deref().unwrap().contains("3 attempts"));

    // 2 successes plus 3 attempts for the failing sibling.
    assert_eq!(client.call_count(), 5);
}

#[tokio::test]
async fn test_transient_failure_recovers_within_retry_budget() {
    let mut config = fast_config();
    config.retry_max_attempts = 3;

    let client = Arc::new(FlakyGeneration::new(2));
    let ctx = ctx_with(config, client.clone());
    let task = Task::new("t", "d");
    let sub = Subtask::new(task.id, "flaky", "unstable work", SubtaskKind::Implementation);

    let report = PhasedExecutor::new(ctx)
        .execute(&task, vec![sub])
        .await
        .unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(report.results[0].result.as_deref(), Some("recovered output"));
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
}

struct CountingClassifier {
    calls: AtomicUsize,
}

#[async_trait]
impl ClassificationClient for CountingClassifier {
    async fn classify(&self, _input: &str, _context: &RequestContext) -> Result<Classification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::api("classifier offline"))
    }
}

#[tokio::test]
async fn test_open_classification_circuit_skips_collaborator() {
    let mut config = fast_config();
    config.breaker_threshold = 1;

    let classifier = Arc::new(CountingClassifier {
        calls: AtomicUsize::new(0),
    });
    let ctx = Arc::new(
        Orchestrator::new(config, Arc::new(TrackingGeneration::new()))
            .with_classification(classifier.clone()),
    );
    let router = Router::new(Arc::clone(&ctx));

    let first = router.route("Hello there", RequestContext::default()).await;
    assert_eq!(first.workflow, "general_chat");
    let calls_after_first = classifier.calls.load(Ordering::SeqCst);
    assert!(calls_after_first >= 1);
    assert_eq!(ctx.breaker.state("classification"), BreakerState::Open);

    // Circuit open: the second request never touches the collaborator and
    // the fallback still answers.
    let second = router.route("Hello again", RequestContext::default()).await;
    assert_eq!(second.workflow, "general_chat");
    assert_eq!(classifier.calls.load(Ordering::SeqCst), calls_after_first);
}

#[tokio::test]
async fn test_critical_error_is_not_retried() {
    struct CriticalGeneration {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationClient for CriticalGeneration {
        async fn complete(&self, _system: &str, _user: &str) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Llm {
                message: "invalid credentials".to_string(),
                severity: strata::error::Severity::Critical,
            })
        }
    }

    let mut config = fast_config();
    config.retry_max_attempts = 5;

    let client = Arc::new(CriticalGeneration {
        calls: AtomicUsize::new(0),
    });
    let ctx = ctx_with(config, client.clone());
    let task = Task::new("t", "d");
    let sub = Subtask::new(task.id, "gated", "secured work", SubtaskKind::Implementation);

    let report = PhasedExecutor::new(ctx)
        .execute(&task, vec![sub])
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    // One attempt, no retries.
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_dependency_degrades_but_does_not_skip() {
    let client = Arc::new(TrackingGeneration::failing_on(&["root work"]));
    let ctx = ctx_with(fast_config(), client.clone());
    let task = Task::new("t", "d");

    let root = Subtask::new(task.id, "root", "root work", SubtaskKind::Analysis);
    let dependent = Subtask::new(task.id, "leaf", "leaf work", SubtaskKind::Implementation)
        .with_dependencies(vec![root.id]);

    let report = PhasedExecutor::new(ctx)
        .execute(&task, vec![root, dependent])
        .await
        .unwrap();

    // The dependent ran (and succeeded) despite its failed prerequisite.
    assert_eq!(report.completed, 1);
    assert_eq!(report.failed, 1);
    let leaf = report.results.iter().find(|r| r.title == "leaf").unwrap();
    assert_eq!(leaf.status, TaskStatus::Completed);

    let prompts = client.prompts.lock().unwrap();
    let leaf_prompt = prompts.iter().find(|p| p.contains("leaf work")).unwrap();
    assert!(leaf_prompt.contains("prerequisite work failed"));
    assert!(leaf_prompt.contains("root"));
}
