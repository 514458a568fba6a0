//! Task and subtask data model for the orchestration pipeline.
//!
//! A `Task` is one orchestration run's unit of work, owned by the run that
//! created it. A `Subtask` is an atomic piece of that work with explicit
//! dependencies on sibling subtasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a subtask within a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtaskId(pub Uuid);

impl SubtaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for SubtaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubtaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Lifecycle status shared by tasks and subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What kind of work a subtask performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskKind {
    Analysis,
    Implementation,
    Testing,
    Documentation,
    Review,
}

impl SubtaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtaskKind::Analysis => "analysis",
            SubtaskKind::Implementation => "implementation",
            SubtaskKind::Testing => "testing",
            SubtaskKind::Documentation => "documentation",
            SubtaskKind::Review => "review",
        }
    }

    /// Parse a loose tag from collaborator output. Unknown tags become
    /// `Implementation` so a sloppy plan never aborts decomposition.
    pub fn parse_lossy(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "analysis" => SubtaskKind::Analysis,
            "testing" | "test" => SubtaskKind::Testing,
            "documentation" | "docs" => SubtaskKind::Documentation,
            "review" => SubtaskKind::Review,
            _ => SubtaskKind::Implementation,
        }
    }
}

impl std::fmt::Display for SubtaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One orchestration run's unit of work.
///
/// Owned by the run that created it; destroyed when the run's result is
/// returned. There is no cross-run persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    /// Free-text requirement strings extracted during decomposition.
    pub requirements: Vec<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            id: TaskId::new(),
            title: title.to_string(),
            description: description.to_string(),
            requirements: Vec::new(),
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn with_requirements(mut self, requirements: Vec<String>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// An atomic piece of a task, with dependencies on sibling subtasks.
///
/// The dependency relation restricted to one task's subtasks must form a
/// DAG; the decomposer deterministically drops edges that would close a
/// cycle before a plan is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub task_id: TaskId,
    pub title: String,
    pub description: String,
    pub kind: SubtaskKind,
    /// Sibling subtasks that must complete before this one starts.
    pub depends_on: Vec<SubtaskId>,
    pub status: TaskStatus,
    /// Progress percentage in [0, 100].
    pub progress: u8,
    /// Output text once completed.
    pub result: Option<String>,
    /// Failure description once failed.
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Subtask {
    pub fn new(task_id: TaskId, title: &str, description: &str, kind: SubtaskKind) -> Self {
        Self {
            id: SubtaskId::new(),
            task_id,
            title: title.to_string(),
            description: description.to_string(),
            kind,
            depends_on: Vec::new(),
            status: TaskStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<SubtaskId>) -> Self {
        self.depends_on = deps;
        self
    }

    /// Transition to InProgress and record the start time.
    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.progress = 50;
        self.started_at = Some(Utc::now());
    }

    /// Transition to Completed with the produced output.
    pub fn complete(&mut self, result: String) {
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    /// Transition to Failed with a failure description.
    pub fn fail(&mut self, error: String) {
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }

    /// Whether this subtask reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Rough complexity score in [0,1] from structural signals.
    ///
    /// Used to scale down per-phase concurrency for heavy phases.
    pub fn complexity_score(&self) -> f64 {
        let len_signal = (self.description.len() as f64 / 600.0).min(1.0);
        let dep_signal = (self.depends_on.len() as f64 / 4.0).min(1.0);
        let kind_signal = match self.kind {
            SubtaskKind::Implementation => 0.8,
            SubtaskKind::Analysis | SubtaskKind::Review => 0.5,
            SubtaskKind::Testing => 0.4,
            SubtaskKind::Documentation => 0.2,
        };
        (len_signal * 0.4 + dep_signal * 0.2 + kind_signal * 0.4).clamp(0.0, 1.0)
    }
}
