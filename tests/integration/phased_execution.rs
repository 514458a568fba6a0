//! Phase layering and bounded-concurrency behavior of the executor.

use std::sync::Arc;
use std::time::Duration;

use strata::core::plan::ExecutionPlan;
use strata::core::task::{Subtask, SubtaskKind, Task};
use strata::orchestration::{ExecutorEvent, PhasedExecutor};
use tokio::sync::mpsc;

use crate::fixtures::{ctx_with, fast_config, TrackingGeneration};

fn diamond(task: &Task) -> Vec<Subtask> {
    let a = Subtask::new(task.id, "A", "root analysis", SubtaskKind::Analysis);
    let b = Subtask::new(task.id, "B", "left branch", SubtaskKind::Implementation)
        .with_dependencies(vec![a.id]);
    let c = Subtask::new(task.id, "C", "right branch", SubtaskKind::Implementation)
        .with_dependencies(vec![a.id]);
    vec![a, b, c]
}

#[tokio::test]
async fn test_diamond_layers_into_two_phases() {
    let task = Task::new("t", "d");
    let subtasks = diamond(&task);
    let a = subtasks[0].id;

    let plan = ExecutionPlan::build(&subtasks, 4).unwrap();
    assert_eq!(plan.phases.len(), 2);
    assert_eq!(plan.phases[0].subtasks, vec![a]);
    assert_eq!(plan.phases[1].len(), 2);
}

#[tokio::test]
async fn test_second_phase_runs_concurrently() {
    let client = Arc::new(TrackingGeneration::with_delay(Duration::from_millis(25)));
    let ctx = ctx_with(fast_config(), client.clone());
    let task = Task::new("t", "d");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = PhasedExecutor::new(ctx)
        .with_events(tx)
        .execute(&task, diamond(&task))
        .await
        .unwrap();

    assert_eq!(report.completed, 3);
    assert_eq!(report.phases, 2);
    // B and C overlapped; A ran alone.
    assert_eq!(client.max_concurrency_seen(), 2);

    let mut phase_events = 0;
    while let Ok(event) = rx.try_recv() {
        if let ExecutorEvent::PhaseCompleted { phase_index, .. } = event {
            assert!(phase_index < 2);
            phase_events += 1;
        }
    }
    assert_eq!(phase_events, 2);
}

#[tokio::test]
async fn test_pool_of_three_bounds_five_subtasks() {
    let mut config = fast_config();
    config.pool_size = 3;
    config.max_concurrency = 3;

    let client = Arc::new(TrackingGeneration::with_delay(Duration::from_millis(20)));
    let ctx = ctx_with(config, client.clone());
    let task = Task::new("t", "d");
    let subtasks: Vec<Subtask> = (0..5)
        .map(|i| {
            Subtask::new(
                task.id,
                &format!("independent-{}", i),
                "standalone work item",
                SubtaskKind::Implementation,
            )
        })
        .collect();

    let report = PhasedExecutor::new(Arc::clone(&ctx))
        .execute(&task, subtasks)
        .await
        .unwrap();

    // 5 completions, at most 3 in flight at any instant, no leaked slots.
    assert_eq!(report.total, 5);
    assert_eq!(report.completed, 5);
    assert!(client.max_concurrency_seen() <= 3);
    assert_eq!(ctx.pool.peak_in_use(), 3);
    assert_eq!(ctx.pool.available(), 3);
    assert_eq!(ctx.pool.in_use(), 0);
}

#[tokio::test]
async fn test_dependencies_complete_before_dependents_start() {
    let client = Arc::new(TrackingGeneration::with_delay(Duration::from_millis(10)));
    let ctx = ctx_with(fast_config(), client.clone());
    let task = Task::new("t", "d");

    let a = Subtask::new(task.id, "first", "stage one", SubtaskKind::Analysis);
    let b = Subtask::new(task.id, "second", "stage two", SubtaskKind::Implementation)
        .with_dependencies(vec![a.id]);
    let c = Subtask::new(task.id, "third", "stage three", SubtaskKind::Testing)
        .with_dependencies(vec![b.id]);

    let report = PhasedExecutor::new(ctx)
        .execute(&task, vec![a, b, c])
        .await
        .unwrap();

    assert_eq!(report.completed, 3);
    assert_eq!(report.phases, 3);
    // A strict chain can never overlap.
    assert_eq!(client.max_concurrency_seen(), 1);

    let prompts = client.prompts.lock().unwrap();
    let order: Vec<usize> = ["stage one", "stage two", "stage three"]
        .iter()
        .map(|needle| prompts.iter().position(|p| p.contains(needle)).unwrap())
        .collect();
    assert!(order[0] < order[1] && order[1] < order[2]);
}

#[tokio::test]
async fn test_report_metrics_are_consistent() {
    let client = Arc::new(TrackingGeneration::new());
    let ctx = ctx_with(fast_config(), client);
    let task = Task::new("t", "d");

    let report = PhasedExecutor::new(ctx)
        .execute(&task, diamond(&task))
        .await
        .unwrap();

    assert_eq!(report.completed + report.failed, report.total);
    assert!(report.error_rate >= 0.0 && report.error_rate <= 1.0);
    assert!(report.utilization > 0.0 && report.utilization <= 1.0);
    assert!(report.throughput > 0.0);
    assert!(report.execution_time > Duration::ZERO);
}
