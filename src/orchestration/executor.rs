//! Phased parallel execution of a subtask set.
//!
//! Subtasks are layered into phases by [`ExecutionPlan`]; phases run
//! strictly in order, and within a phase subtasks run concurrently up to
//! the phase cap via `buffer_unordered`. Every generation call goes through
//! the shared rate limiter, resource pool, circuit breaker, and retry
//! policy. A failed subtask never cancels its siblings; dependents in later
//! phases run with a degraded prompt noting the missing input.

use crate::core::plan::ExecutionPlan;
use crate::core::task::{Subtask, SubtaskId, SubtaskKind, Task, TaskStatus};
use crate::error::Result;
use crate::orchestration::Orchestrator;
use crate::{slog_debug, slog_info, slog_warn};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Running aggregate metrics, attached to every progress event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionMetrics {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    /// completed / (completed + failed), 1.0 before anything finished.
    pub success_rate: f64,
    /// Pool slots in use over pool size at snapshot time.
    pub utilization: f64,
    /// Finished subtasks per second of wall-clock time so far.
    pub throughput: f64,
}

/// Progress events emitted over the optional sink.
#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    SubtaskStarted {
        subtask_id: SubtaskId,
        title: String,
        metrics: ExecutionMetrics,
    },
    SubtaskCompleted {
        subtask_id: SubtaskId,
        title: String,
        metrics: ExecutionMetrics,
    },
    SubtaskFailed {
        subtask_id: SubtaskId,
        title: String,
        error: String,
        metrics: ExecutionMetrics,
    },
    PhaseCompleted {
        phase_index: usize,
        phase_size: usize,
        metrics: ExecutionMetrics,
    },
}

/// Outcome of one subtask.
#[derive(Debug, Clone)]
pub struct SubtaskResult {
    pub subtask_id: SubtaskId,
    pub title: String,
    pub kind: SubtaskKind,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl SubtaskResult {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Aggregate outcome of one execution run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub results: Vec<SubtaskResult>,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub phases: usize,
    pub execution_time: Duration,
    pub avg_task_time: Duration,
    /// Peak pool occupancy over pool size for the run.
    pub utilization: f64,
    pub throughput: f64,
    /// failed / total, 0.0 for an empty run.
    pub error_rate: f64,
}

struct MetricsTracker {
    completed: AtomicUsize,
    failed: AtomicUsize,
    total: usize,
    started: Instant,
}

impl MetricsTracker {
    fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            total,
            started: Instant::now(),
        }
    }

    fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self, ctx: &Orchestrator) -> ExecutionMetrics {
        let completed = self.completed.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let finished = completed + failed;
        let elapsed = self.started.elapsed().as_secs_f64();
        ExecutionMetrics {
            completed,
            failed,
            total: self.total,
            success_rate: if finished == 0 {
                1.0
            } else {
                completed as f64 / finished as f64
            },
            utilization: ctx.pool.utilization(),
            throughput: if elapsed > 0.0 {
                finished as f64 / elapsed
            } else {
                0.0
            },
        }
    }
}

/// Executes an [`ExecutionPlan`] phase by phase with bounded concurrency.
pub struct PhasedExecutor {
    ctx: Arc<Orchestrator>,
    events: Option<mpsc::UnboundedSender<ExecutorEvent>>,
}

impl PhasedExecutor {
    pub fn new(ctx: Arc<Orchestrator>) -> Self {
        Self { ctx, events: None }
    }

    /// Attach a progress sink. Send failures are ignored; a dropped
    /// receiver never stalls execution.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<ExecutorEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: ExecutorEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Execute the subtask set for `task`.
    ///
    /// Fails only on a structurally invalid subtask set (residual
    /// dependency cycle); individual subtask failures are recorded in the
    /// report, never propagated.
    pub async fn execute(&self, task: &Task, subtasks: Vec<Subtask>) -> Result<ExecutionReport> {
        let plan = ExecutionPlan::build(&subtasks, self.ctx.config.max_concurrency)?;
        let total = subtasks.len();
        let phase_count = plan.phases.len();
        slog_info!(
            "executing '{}': {} subtasks in {} phases",
            task.title,
            total,
            phase_count
        );

        let mut by_id: HashMap<SubtaskId, Subtask> =
            subtasks.into_iter().map(|s| (s.id, s)).collect();
        let tracker = MetricsTracker::new(total);
        // Titles of subtasks that failed in earlier phases, for degraded
        // prompts.
        let mut failed_titles: HashMap<SubtaskId, String> = HashMap::new();
        let mut results: Vec<SubtaskResult> = Vec::with_capacity(total);
        let run_start = Instant::now();

        for phase in &plan.phases {
            let futures = phase.subtasks.iter().filter_map(|id| {
                let sub = by_id.remove(id)?;
                let missing: Vec<String> = sub
                    .depends_on
                    .iter()
                    .filter_map(|dep| failed_titles.get(dep).cloned())
                    .collect();
                Some(self.run_subtask(sub, missing, &tracker))
            });

            let finished: Vec<Subtask> = stream::iter(futures)
                .buffer_unordered(phase.concurrency.max(1))
                .collect()
                .await;

            for sub in finished {
                if sub.status == TaskStatus::Failed {
                    failed_titles.insert(sub.id, sub.title.clone());
                }
                results.push(subtask_result(&sub));
            }

            self.emit(ExecutorEvent::PhaseCompleted {
                phase_index: phase.index,
                phase_size: phase.len(),
                metrics: tracker.snapshot(&self.ctx),
            });
            slog_debug!("phase {} complete ({} subtasks)", phase.index, phase.len());
        }

        let execution_time = run_start.elapsed();
        let completed = results.iter().filter(|r| r.is_completed()).count();
        let failed = total - completed;
        let task_time_sum: Duration = results.iter().map(|r| r.duration).sum();
        let secs = execution_time.as_secs_f64();

        Ok(ExecutionReport {
            completed,
            failed,
            total,
            phases: phase_count,
            execution_time,
            avg_task_time: if total > 0 {
                task_time_sum / total as u32
            } else {
                Duration::ZERO
            },
            utilization: if self.ctx.pool.size() > 0 {
                self.ctx.pool.peak_in_use() as f64 / self.ctx.pool.size() as f64
            } else {
                0.0
            },
            throughput: if secs > 0.0 { total as f64 / secs } else { 0.0 },
            error_rate: if total > 0 {
                failed as f64 / total as f64
            } else {
                0.0
            },
            results,
        })
    }

    /// Run one subtask through limiter, pool, breaker, and retry.
    async fn run_subtask(
        &self,
        mut sub: Subtask,
        missing_deps: Vec<String>,
        tracker: &MetricsTracker,
    ) -> Subtask {
        let started = Instant::now();
        sub.start();
        self.emit(ExecutorEvent::SubtaskStarted {
            subtask_id: sub.id,
            title: sub.title.clone(),
            metrics: tracker.snapshot(&self.ctx),
        });

        self.ctx.limiter.acquire().await;
        let _slot = self.ctx.pool.acquire().await;

        let operation = format!("subtask_execution_{}", sub.id.short());
        if let Err(err) = self.ctx.breaker.check(&operation) {
            slog_warn!("'{}' fast-failed: {}", sub.title, err);
            sub.fail(err.to_string());
            tracker.record_failure();
            self.emit(ExecutorEvent::SubtaskFailed {
                subtask_id: sub.id,
                title: sub.title.clone(),
                error: err.to_string(),
                metrics: tracker.snapshot(&self.ctx),
            });
            return sub;
        }

        let system = system_prompt_for(sub.kind);
        let user = user_prompt_for(&sub, &missing_deps);
        let generation = Arc::clone(&self.ctx.generation);
        let outcome = self
            .ctx
            .retry
            .execute(&operation, || {
                let generation = Arc::clone(&generation);
                let system = system.clone();
                let user = user.clone();
                async move { generation.complete(&system, &user).await }
            })
            .await;

        match outcome {
            Ok(completion) => {
                self.ctx.breaker.record_success(&operation);
                sub.complete(completion.text);
                tracker.record_success();
                self.emit(ExecutorEvent::SubtaskCompleted {
                    subtask_id: sub.id,
                    title: sub.title.clone(),
                    metrics: tracker.snapshot(&self.ctx),
                });
            }
            Err(err) => {
                self.ctx.breaker.record_failure(&operation);
                slog_warn!(
                    "'{}' failed after {:?}: {}",
                    sub.title,
                    started.elapsed(),
                    err
                );
                sub.fail(err.to_string());
                tracker.record_failure();
                self.emit(ExecutorEvent::SubtaskFailed {
                    subtask_id: sub.id,
                    title: sub.title.clone(),
                    error: err.to_string(),
                    metrics: tracker.snapshot(&self.ctx),
                });
            }
        }
        sub
    }
}

fn system_prompt_for(kind: SubtaskKind) -> String {
    let role = match kind {
        SubtaskKind::Analysis => "You analyze requirements and produce a concise technical analysis.",
        SubtaskKind::Implementation => "You write complete, working implementations.",
        SubtaskKind::Testing => "You write thorough tests covering main paths and failure modes.",
        SubtaskKind::Documentation => "You write clear technical documentation.",
        SubtaskKind::Review => "You review work for correctness and completeness.",
    };
    format!("{} Focus only on the assigned subtask.", role)
}

fn user_prompt_for(sub: &Subtask, missing_deps: &[String]) -> String {
    let mut prompt = format!("Subtask: {}\n\n{}", sub.title, sub.description);
    if !missing_deps.is_empty() {
        prompt.push_str(&format!(
            "\n\nNote: the following prerequisite work failed and its output is \
             unavailable: {}. Proceed with reasonable assumptions and state them.",
            missing_deps.join(", ")
        ));
    }
    prompt
}

fn subtask_result(sub: &Subtask) -> SubtaskResult {
    let duration = match (sub.started_at, sub.finished_at) {
        (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
        _ => Duration::ZERO,
    };
    SubtaskResult {
        subtask_id: sub.id,
        title: sub.title.clone(),
        kind: sub.kind,
        status: sub.status,
        result: sub.result.clone(),
        error: sub.error.clone(),
        duration,
    }
}
