//! Execution plan: topological layering of subtasks into phases.
//!
//! A phase is a set of subtasks whose dependencies are all satisfied by
//! earlier phases, so everything inside one phase may run concurrently.
//! The plan builder refuses cyclic input; deterministic cycle breaking is
//! the decomposer's responsibility, so a cycle here is a structural error
//! rather than something to silently execute around.

use crate::core::task::{Subtask, SubtaskId};
use crate::error::{Error, Result};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Complexity threshold above which a phase's concurrency allowance halves.
const HEAVY_PHASE_THRESHOLD: f64 = 0.66;

/// One layer of the execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    /// Zero-based position in the plan.
    pub index: usize,
    /// Subtasks eligible to run concurrently in this phase, in the order
    /// they were handed to the planner.
    pub subtasks: Vec<SubtaskId>,
    /// Concurrency cap for this phase.
    pub concurrency: usize,
}

impl Phase {
    pub fn len(&self) -> usize {
        self.subtasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }
}

/// Dependency-respecting layering of a task's subtasks.
///
/// Invariants: every subtask appears in exactly one phase, and every
/// dependency of a subtask lives in a strictly earlier phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub phases: Vec<Phase>,
}

impl ExecutionPlan {
    /// Build a plan from a subtask set.
    ///
    /// Dependencies referencing ids outside the set are ignored; they can
    /// never be satisfied and treating them as hard edges would wedge the
    /// whole plan. A dependency cycle inside the set is reported as a
    /// `Processing` error naming one participant.
    ///
    /// Per-phase concurrency = min(phase size, `max_concurrency`, a value
    /// scaled down when the phase's average complexity score is high).
    pub fn build(subtasks: &[Subtask], max_concurrency: usize) -> Result<Self> {
        if subtasks.is_empty() {
            return Ok(Self { phases: Vec::new() });
        }

        let known: HashSet<SubtaskId> = subtasks.iter().map(|s| s.id).collect();
        let by_id: HashMap<SubtaskId, &Subtask> = subtasks.iter().map(|s| (s.id, s)).collect();

        // Build the dependency graph: edge dep -> dependent.
        let mut graph: DiGraph<SubtaskId, ()> = DiGraph::new();
        let mut node_of: HashMap<SubtaskId, NodeIndex> = HashMap::new();
        for sub in subtasks {
            let idx = graph.add_node(sub.id);
            node_of.insert(sub.id, idx);
        }
        for sub in subtasks {
            for dep in &sub.depends_on {
                if known.contains(dep) {
                    graph.add_edge(node_of[dep], node_of[&sub.id], ());
                }
            }
        }

        if is_cyclic_directed(&graph) {
            let participant = subtasks
                .iter()
                .find(|s| s.depends_on.iter().any(|d| known.contains(d)))
                .map(|s| s.title.clone())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(Error::Processing(format!(
                "dependency cycle in subtask set near '{}'; plan must be regenerated",
                participant
            )));
        }

        // Kahn-style layering: each round takes every subtask whose
        // dependencies are already placed.
        let mut placed: HashSet<SubtaskId> = HashSet::new();
        let mut remaining: Vec<SubtaskId> = subtasks.iter().map(|s| s.id).collect();
        let mut phases = Vec::new();

        while !remaining.is_empty() {
            let frontier: Vec<SubtaskId> = remaining
                .iter()
                .copied()
                .filter(|id| {
                    by_id[id]
                        .depends_on
                        .iter()
                        .filter(|d| known.contains(d))
                        .all(|d| placed.contains(d))
                })
                .collect();

            // Unreachable after the acyclicity check, but never loop forever.
            if frontier.is_empty() {
                return Err(Error::Processing(
                    "subtask layering stalled on unmet dependencies".to_string(),
                ));
            }

            let concurrency = Self::phase_concurrency(&frontier, &by_id, max_concurrency);
            for id in &frontier {
                placed.insert(*id);
            }
            remaining.retain(|id| !placed.contains(id));
            phases.push(Phase {
                index: phases.len(),
                subtasks: frontier,
                concurrency,
            });
        }

        Ok(Self { phases })
    }

    fn phase_concurrency(
        frontier: &[SubtaskId],
        by_id: &HashMap<SubtaskId, &Subtask>,
        max_concurrency: usize,
    ) -> usize {
        let avg_complexity = frontier
            .iter()
            .map(|id| by_id[id].complexity_score())
            .sum::<f64>()
            / frontier.len() as f64;

        // Heavier phases get fewer concurrent slots.
        let scaled = if avg_complexity >= HEAVY_PHASE_THRESHOLD {
            (max_concurrency / 2).max(1)
        } else {
            max_concurrency.max(1)
        };

        frontier.len().min(scaled)
    }

    /// Index of the phase holding `id`, if any.
    pub fn phase_of(&self, id: &SubtaskId) -> Option<usize> {
        self.phases
            .iter()
            .find(|p| p.subtasks.contains(id))
            .map(|p| p.index)
    }

    /// Total number of subtasks across all phases.
    pub fn total_subtasks(&self) -> usize {
        self.phases.iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}
