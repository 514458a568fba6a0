//! Core domain models for the orchestration engine.
//!
//! This module contains the fundamental data structures used throughout
//! the pipeline: tasks, subtasks, and the phased execution plan.

pub mod plan;
pub mod task;

pub use plan::{ExecutionPlan, Phase};
pub use task::{Priority, Subtask, SubtaskId, SubtaskKind, Task, TaskId, TaskStatus};
