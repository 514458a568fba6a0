//! Consolidation of completed subtask outputs into one integrated result.
//!
//! Four steps: analyze (extract dependencies and declared names, detect
//! naming conflicts, score quality), resolve (per-conflict strategy from
//! the generation collaborator), consolidate (enhanced via generation,
//! basic concatenation fallback), document (architecture summary with a
//! fixed-string fallback). Every collaborator failure degrades; integration
//! itself never fails.

use crate::core::task::{Task, TaskStatus};
use crate::orchestration::executor::SubtaskResult;
use crate::orchestration::extract::{DependencyExtractor, RegexExtractor};
use crate::orchestration::Orchestrator;
use crate::{slog_debug, slog_info, slog_warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// How hard the integration is expected to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationTier {
    Simple,
    Moderate,
    Complex,
}

impl IntegrationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationTier::Simple => "simple",
            IntegrationTier::Moderate => "moderate",
            IntegrationTier::Complex => "complex",
        }
    }

    /// Rough wall-clock estimate for a human doing this integration.
    pub fn estimated_duration(&self) -> Duration {
        match self {
            IntegrationTier::Simple => Duration::from_secs(5 * 60),
            IntegrationTier::Moderate => Duration::from_secs(15 * 60),
            IntegrationTier::Complex => Duration::from_secs(40 * 60),
        }
    }
}

/// Which consolidation path produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationPath {
    /// Generation collaborator produced a cohesive solution.
    Enhanced,
    /// Concatenation fallback after collaborator failure.
    Basic,
}

/// A name declared by two different subtasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConflict {
    pub name: String,
    pub first_subtask: String,
    pub second_subtask: String,
}

/// Resolution record for one naming conflict.
#[derive(Debug, Clone)]
pub struct ConflictResolution {
    pub conflict: NamingConflict,
    pub strategy: String,
    /// False when the collaborator was unavailable and the record is a
    /// manual-resolution placeholder.
    pub auto_resolved: bool,
}

/// Upfront analysis of the completed subtask outputs.
#[derive(Debug, Clone)]
pub struct IntegrationAnalysis {
    /// External dependency names in subtask completion order.
    pub dependencies: Vec<String>,
    pub conflicts: Vec<NamingConflict>,
    /// Mean structural quality over completed subtasks, in [0, 1].
    pub quality_score: f64,
    pub tier: IntegrationTier,
    pub estimated_duration: Duration,
}

/// Final consolidated artifact.
#[derive(Debug, Clone)]
pub struct IntegratedResult {
    pub solution: String,
    pub architecture_summary: String,
    pub resolved_dependencies: Vec<String>,
    pub conflicts: Vec<ConflictResolution>,
    pub quality_score: f64,
    pub path: IntegrationPath,
    pub status: TaskStatus,
}

/// Consolidates subtask outputs, resolving conflicts along the way.
pub struct ResultIntegrator {
    ctx: Arc<Orchestrator>,
    extractor: Box<dyn DependencyExtractor>,
}

impl ResultIntegrator {
    pub fn new(ctx: Arc<Orchestrator>) -> Self {
        Self {
            ctx,
            extractor: Box::new(RegexExtractor::new()),
        }
    }

    /// Swap in a different extraction implementation.
    pub fn with_extractor(mut self, extractor: Box<dyn DependencyExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Integrate the completed subtask outputs for `task`.
    ///
    /// Never fails; the collaborator-free worst case is a basic
    /// concatenation with placeholder conflict records.
    pub async fn integrate(&self, task: &Task, results: &[SubtaskResult]) -> IntegratedResult {
        let completed: Vec<&SubtaskResult> =
            results.iter().filter(|r| r.is_completed()).collect();
        let analysis = self.analyze(&completed);
        slog_info!(
            "integrating '{}': {} outputs, {} deps, {} conflicts, tier {}",
            task.title,
            completed.len(),
            analysis.dependencies.len(),
            analysis.conflicts.len(),
            analysis.tier.as_str()
        );

        let conflicts = self.resolve_conflicts(&analysis.conflicts).await;
        let (solution, path) = self.consolidate(task, &completed, &analysis).await;
        let architecture_summary = self.document(task, &solution, &analysis).await;

        let status = if completed.is_empty() {
            TaskStatus::Failed
        } else {
            TaskStatus::Completed
        };

        IntegratedResult {
            solution,
            architecture_summary,
            resolved_dependencies: analysis.dependencies,
            conflicts,
            quality_score: analysis.quality_score,
            path,
            status,
        }
    }

    /// Extract dependencies and names, detect pairwise naming conflicts,
    /// and score structural quality.
    pub fn analyze(&self, completed: &[&SubtaskResult]) -> IntegrationAnalysis {
        let mut dependencies: Vec<String> = Vec::new();
        let mut names_by_subtask: Vec<(String, Vec<String>)> = Vec::new();
        let mut quality_sum = 0.0;

        for result in completed {
            let text = result.result.as_deref().unwrap_or_default();
            for dep in self.extractor.external_dependencies(text) {
                if !dependencies.contains(&dep) {
                    dependencies.push(dep);
                }
            }
            names_by_subtask.push((result.title.clone(), self.extractor.declared_names(text)));
            quality_sum += structural_quality(text);
        }

        let mut conflicts = Vec::new();
        let mut first_owner: HashMap<&str, &str> = HashMap::new();
        for (title, names) in &names_by_subtask {
            for name in names {
                match first_owner.get(name.as_str()) {
                    Some(owner) if *owner != title.as_str() => {
                        conflicts.push(NamingConflict {
                            name: name.clone(),
                            first_subtask: owner.to_string(),
                            second_subtask: title.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        first_owner.insert(name, title);
                    }
                }
            }
        }

        let quality_score = if completed.is_empty() {
            0.0
        } else {
            quality_sum / completed.len() as f64
        };

        let complexity_points =
            completed.len() + dependencies.len() + conflicts.len() * 2;
        let tier = match complexity_points {
            0..=4 => IntegrationTier::Simple,
            5..=10 => IntegrationTier::Moderate,
            _ => IntegrationTier::Complex,
        };

        IntegrationAnalysis {
            dependencies,
            conflicts,
            quality_score,
            estimated_duration: tier.estimated_duration(),
            tier,
        }
    }

    /// Ask the collaborator for a strategy per conflict; mark the record
    /// for manual resolution when the call fails.
    async fn resolve_conflicts(&self, conflicts: &[NamingConflict]) -> Vec<ConflictResolution> {
        let mut resolutions = Vec::with_capacity(conflicts.len());
        for conflict in conflicts {
            let system = "You resolve naming conflicts between generated code fragments. \
                          Answer with one short strategy sentence.";
            let user = format!(
                "The name '{}' is declared by both '{}' and '{}'. How should the \
                 conflict be resolved?",
                conflict.name, conflict.first_subtask, conflict.second_subtask
            );
            match self.ctx.generation.complete(system, &user).await {
                Ok(completion) => resolutions.push(ConflictResolution {
                    conflict: conflict.clone(),
                    strategy: completion.text.trim().to_string(),
                    auto_resolved: true,
                }),
                Err(err) => {
                    slog_warn!("conflict resolution for '{}' failed: {}", conflict.name, err);
                    resolutions.push(ConflictResolution {
                        conflict: conflict.clone(),
                        strategy: "manual resolution required".to_string(),
                        auto_resolved: false,
                    });
                }
            }
        }
        resolutions
    }

    /// Produce the consolidated solution, tagging which path made it.
    async fn consolidate(
        &self,
        task: &Task,
        completed: &[&SubtaskResult],
        analysis: &IntegrationAnalysis,
    ) -> (String, IntegrationPath) {
        let combined = completed
            .iter()
            .map(|r| {
                format!(
                    "## {} ({})\n{}",
                    r.title,
                    r.kind.as_str(),
                    r.result.as_deref().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let system = "You consolidate multiple work products into one cohesive solution. \
                      Merge overlapping parts, keep every distinct capability.";
        let user = format!(
            "Task: {}\nDependency order: {}\nAggregate quality: {:.2}\n\n\
             Consolidate these subtask outputs into one solution:\n\n{}",
            task.description,
            analysis.dependencies.join(", "),
            analysis.quality_score,
            combined
        );

        match self.ctx.generation.complete(system, &user).await {
            Ok(completion) => (completion.text, IntegrationPath::Enhanced),
            Err(err) => {
                slog_warn!("enhanced consolidation failed ({}), using basic path", err);
                (basic_consolidation(task, &combined), IntegrationPath::Basic)
            }
        }
    }

    /// Architecture summary, degrading to a fixed string.
    async fn document(
        &self,
        task: &Task,
        solution: &str,
        analysis: &IntegrationAnalysis,
    ) -> String {
        let system =
            "You summarize the architecture of a solution in a few short paragraphs.";
        let user = format!(
            "Task: {}\nIntegration tier: {}\n\nSummarize the architecture of:\n\n{}",
            task.description,
            analysis.tier.as_str(),
            solution
        );
        match self.ctx.generation.complete(system, &user).await {
            Ok(completion) => completion.text,
            Err(err) => {
                slog_debug!("documentation step degraded: {}", err);
                format!(
                    "Integrated solution for '{}' assembled from {} dependencies at the {} tier.",
                    task.title,
                    analysis.dependencies.len(),
                    analysis.tier.as_str()
                )
            }
        }
    }
}

fn basic_consolidation(task: &Task, combined: &str) -> String {
    format!(
        "# {}\n\n{}\n\n## Integration notes\n\
         - Review the sections above for overlapping functionality.\n\
         - Add module-level documentation before shipping.\n\
         - Run the testing sections against the implementation sections.",
        task.title, combined
    )
}

/// Structural quality heuristic in [0, 1]: length, error handling,
/// comments, tests.
fn structural_quality(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let mut score: f64 = 0.5;
    if text.len() > 200 {
        score += 0.1;
    }
    let lower = text.to_lowercase();
    if ["try", "catch", "except", "result", "error"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        score += 0.15;
    }
    if text.contains("//") || text.contains("/*") || text.contains("# ") {
        score += 0.1;
    }
    if lower.contains("test") || lower.contains("assert") {
        score += 0.15;
    }
    score.min(1.0)
}
