//! Task decomposition: turn a request into a dependency-annotated subtask set.
//!
//! The decomposer scores request complexity, extracts requirements, picks a
//! decomposition strategy, and asks the generation collaborator for a plan.
//! Every collaborator-driven step has a deterministic fallback, and the
//! whole path degrades to a fixed minimal decomposition, so `decompose`
//! itself never fails.

use crate::core::task::{Subtask, SubtaskId, SubtaskKind, Task};
use crate::error::Result;
use crate::orchestration::Orchestrator;
use crate::{slog_debug, slog_warn};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

const INTEGRATION_KEYWORDS: &[&str] = &[
    "integrate",
    "integration",
    "third-party",
    "webhook",
    "external service",
    "api gateway",
];
const SECURITY_KEYWORDS: &[&str] = &[
    "security",
    "auth",
    "authentication",
    "authorization",
    "jwt",
    "oauth",
    "encrypt",
    "permission",
];
const PERFORMANCE_KEYWORDS: &[&str] = &[
    "performance",
    "scale",
    "scalable",
    "latency",
    "throughput",
    "cache",
    "optimize",
];
const TESTING_KEYWORDS: &[&str] = &["test", "testing", "coverage", "tdd", "regression"];
const NON_FUNCTIONAL_KEYWORDS: &[&str] = &[
    "performance",
    "security",
    "scalab",
    "reliab",
    "availab",
    "maintainab",
    "latency",
    "throughput",
];
const TECH_STACK_KEYWORDS: &[&str] = &[
    "react",
    "vue",
    "angular",
    "node",
    "python",
    "rust",
    "go",
    "java",
    "postgres",
    "mysql",
    "mongodb",
    "redis",
    "docker",
    "kubernetes",
    "aws",
    "graphql",
    "rest",
    "grpc",
    "websocket",
];

/// Request complexity level derived from structural signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Simple => write!(f, "simple"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::High => write!(f, "high"),
        }
    }
}

/// Outcome of complexity analysis.
#[derive(Debug, Clone)]
pub struct ComplexityAssessment {
    pub level: Complexity,
    /// How many subtasks the plan should target, clamped to the config
    /// bounds.
    pub target_subtasks: usize,
    pub keyword_hits: usize,
    pub stack_breadth: usize,
}

/// Whether a requirement describes behavior or a quality attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementKind {
    Functional,
    NonFunctional,
}

/// One extracted requirement.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub text: String,
    pub kind: RequirementKind,
}

/// How the request gets cut into subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionStrategy {
    /// Cut along user-visible features.
    Functional,
    /// Cut along system layers and components.
    Architectural,
    /// Cut along build-order stages.
    Temporal,
    /// Cut along the request's own structure and context.
    ContextAware,
}

impl DecompositionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecompositionStrategy::Functional => "functional",
            DecompositionStrategy::Architectural => "architectural",
            DecompositionStrategy::Temporal => "temporal",
            DecompositionStrategy::ContextAware => "context_aware",
        }
    }
}

/// Shape of one plan entry in the collaborator's JSON output.
#[derive(Debug, Deserialize)]
struct PlanEntry {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    kind: String,
    /// Indices into the plan array.
    #[serde(default)]
    depends_on: Vec<usize>,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    validation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequirementEntry {
    text: String,
    #[serde(default)]
    kind: String,
}

/// Decomposes a request into a dependency-annotated subtask set.
pub struct TaskDecomposer {
    ctx: Arc<Orchestrator>,
}

impl TaskDecomposer {
    pub fn new(ctx: Arc<Orchestrator>) -> Self {
        Self { ctx }
    }

    /// Decompose a task. Never fails: collaborator failures degrade to
    /// the fixed minimal decomposition.
    pub async fn decompose(&self, task: &Task) -> Vec<Subtask> {
        let assessment = self.assess_complexity(&task.description);
        let requirements = self.extract_requirements(&task.description).await;
        let strategy = choose_strategy(assessment.level, requirements.len());
        slog_debug!(
            "decomposing '{}': complexity={} target={} strategy={}",
            task.title,
            assessment.level,
            assessment.target_subtasks,
            strategy.as_str()
        );

        match self
            .generate_plan(task, &assessment, &requirements, strategy)
            .await
        {
            Ok(subtasks) if !subtasks.is_empty() => {
                self.validate_plan(task, subtasks, &requirements)
            }
            Ok(_) => {
                slog_warn!("collaborator returned an empty plan, using fallback");
                self.fallback_decomposition(task, assessment.level)
            }
            Err(err) => {
                slog_warn!("plan generation failed ({}), using fallback", err);
                self.fallback_decomposition(task, assessment.level)
            }
        }
    }

    /// Score complexity from structural signals: input length, presence of
    /// integration/security/performance/testing keywords, and technology
    /// stack breadth.
    pub fn assess_complexity(&self, input: &str) -> ComplexityAssessment {
        let lower = input.to_lowercase();

        let keyword_hits = [
            INTEGRATION_KEYWORDS,
            SECURITY_KEYWORDS,
            PERFORMANCE_KEYWORDS,
            TESTING_KEYWORDS,
        ]
        .iter()
        .flat_map(|set| set.iter())
        .filter(|kw| lower.contains(*kw))
        .count();

        let stack_breadth = TECH_STACK_KEYWORDS
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();

        let len_points = (input.len() / 200).min(4);
        let keyword_points = keyword_hits.min(4);
        let stack_points = stack_breadth.min(4);
        let total = len_points + keyword_points + stack_points;

        let level = match total {
            0..=2 => Complexity::Simple,
            3..=6 => Complexity::Medium,
            _ => Complexity::High,
        };

        let target_subtasks = (2 + total / 2)
            .clamp(self.ctx.config.min_subtasks, self.ctx.config.max_subtasks);

        ComplexityAssessment {
            level,
            target_subtasks,
            keyword_hits,
            stack_breadth,
        }
    }

    /// Extract and categorize requirements via the generation collaborator,
    /// with a deterministic keyword fallback when the call or the parse
    /// fails.
    pub async fn extract_requirements(&self, input: &str) -> Vec<Requirement> {
        let system = "You are a requirements analyst. Respond with a JSON array of \
                      objects: [{\"text\": string, \"kind\": \"functional\"|\"non_functional\"}]. \
                      No prose.";
        let user = format!("Extract the requirements from this request:\n\n{}", input);

        match self.ctx.generation.complete(system, &user).await {
            Ok(completion) => match parse_requirements(&completion.text) {
                Some(reqs) if !reqs.is_empty() => reqs,
                _ => {
                    slog_debug!("requirement extraction unparseable, using keyword fallback");
                    fallback_requirements(input)
                }
            },
            Err(err) => {
                slog_debug!("requirement extraction failed ({}), using keyword fallback", err);
                fallback_requirements(input)
            }
        }
    }

    async fn generate_plan(
        &self,
        task: &Task,
        assessment: &ComplexityAssessment,
        requirements: &[Requirement],
        strategy: DecompositionStrategy,
    ) -> Result<Vec<Subtask>> {
        let system = strategy_prompt(strategy);
        let requirement_list = requirements
            .iter()
            .map(|r| format!("- {}", r.text))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!(
            "Break this request into exactly {} subtasks.\n\
             Request: {}\n\
             Requirements:\n{}\n\n\
             Respond with a JSON array of objects:\n\
             [{{\"title\": string, \"description\": string, \
             \"kind\": \"analysis\"|\"implementation\"|\"testing\"|\"documentation\"|\"review\", \
             \"depends_on\": [array indices], \"priority\": \"high\"|\"medium\"|\"low\", \
             \"estimated_minutes\": number, \"skills\": [string], \"validation\": string}}]\n\
             No prose outside the JSON.",
            assessment.target_subtasks, task.description, requirement_list
        );

        let completion = self.ctx.generation.complete(&system, &user).await?;
        parse_plan(task, &completion.text)
    }

    /// Validate a generated plan: break dependency cycles deterministically,
    /// cover missed requirements, rebalance a skewed kind distribution, and
    /// pad up to the minimum subtask count.
    fn validate_plan(
        &self,
        task: &Task,
        mut subtasks: Vec<Subtask>,
        requirements: &[Requirement],
    ) -> Vec<Subtask> {
        break_cycles(&mut subtasks);
        self.cover_requirements(task, &mut subtasks, requirements);
        rebalance_kinds(&mut subtasks);

        while subtasks.len() < self.ctx.config.min_subtasks {
            let dep: Vec<SubtaskId> = subtasks.last().map(|s| vec![s.id]).unwrap_or_default();
            subtasks.push(
                Subtask::new(
                    task.id,
                    "Verify the result",
                    "Review the produced work against the original request.",
                    SubtaskKind::Review,
                )
                .with_dependencies(dep),
            );
        }
        subtasks.truncate(self.ctx.config.max_subtasks);
        subtasks
    }

    /// Append one generic subtask covering requirements no existing subtask
    /// mentions, unless the plan is already at the cap.
    fn cover_requirements(
        &self,
        task: &Task,
        subtasks: &mut Vec<Subtask>,
        requirements: &[Requirement],
    ) {
        if subtasks.len() >= self.ctx.config.max_subtasks {
            return;
        }
        let corpus = subtasks
            .iter()
            .map(|s| format!("{} {}", s.title, s.description).to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        let uncovered: Vec<&Requirement> = requirements
            .iter()
            .filter(|req| {
                !req.text
                    .to_lowercase()
                    .split_whitespace()
                    .filter(|w| w.len() > 4)
                    .any(|w| corpus.contains(w))
            })
            .collect();

        if uncovered.is_empty() {
            return;
        }
        let listing = uncovered
            .iter()
            .map(|r| format!("- {}", r.text))
            .collect::<Vec<_>>()
            .join("\n");
        let deps: Vec<SubtaskId> = subtasks.iter().map(|s| s.id).collect();
        slog_debug!("padding plan with {} uncovered requirements", uncovered.len());
        subtasks.push(
            Subtask::new(
                task.id,
                "Address remaining requirements",
                &format!("Cover requirements missing from the plan:\n{}", listing),
                SubtaskKind::Implementation,
            )
            .with_dependencies(deps),
        );
    }

    /// Fixed minimal decomposition used when the collaborator path fails:
    /// analysis, then implementation, then (for non-simple requests)
    /// testing. Decomposition never fails terminally.
    pub fn fallback_decomposition(&self, task: &Task, level: Complexity) -> Vec<Subtask> {
        let analysis = Subtask::new(
            task.id,
            "Analyze the request",
            &format!(
                "Identify the components, constraints, and interfaces needed for: {}",
                task.description
            ),
            SubtaskKind::Analysis,
        );
        let implementation = Subtask::new(
            task.id,
            "Implement the solution",
            &format!("Produce a working solution for: {}", task.description),
            SubtaskKind::Implementation,
        )
        .with_dependencies(vec![analysis.id]);

        let mut subtasks = vec![analysis, implementation];
        if level != Complexity::Simple {
            let testing = Subtask::new(
                task.id,
                "Test the solution",
                "Write tests exercising the main paths and failure modes of the solution.",
                SubtaskKind::Testing,
            )
            .with_dependencies(vec![subtasks[1].id]);
            subtasks.push(testing);
        }
        subtasks
    }
}

/// Pick a strategy by rule over complexity and requirement count.
pub fn choose_strategy(level: Complexity, requirement_count: usize) -> DecompositionStrategy {
    match level {
        Complexity::High if requirement_count >= 6 => DecompositionStrategy::Architectural,
        Complexity::High => DecompositionStrategy::ContextAware,
        Complexity::Medium if requirement_count >= 4 => DecompositionStrategy::Functional,
        Complexity::Medium => DecompositionStrategy::Temporal,
        Complexity::Simple => DecompositionStrategy::Functional,
    }
}

fn strategy_prompt(strategy: DecompositionStrategy) -> String {
    let angle = match strategy {
        DecompositionStrategy::Functional => {
            "Decompose along user-visible features; each subtask delivers one capability."
        }
        DecompositionStrategy::Architectural => {
            "Decompose along system layers (data, domain, interface); each subtask owns one layer."
        }
        DecompositionStrategy::Temporal => {
            "Decompose along build order: groundwork first, then assembly, then verification."
        }
        DecompositionStrategy::ContextAware => {
            "Decompose following the structure of the request itself, keeping related concerns together."
        }
    };
    format!(
        "You are a planning assistant decomposing work into subtasks. {} \
         Dependencies must reference earlier array indices only.",
        angle
    )
}

/// Parse the collaborator's JSON plan into subtasks.
///
/// Tolerates prose around the array. Dependency indices that are out of
/// range or self-referencing are dropped.
fn parse_plan(task: &Task, text: &str) -> Result<Vec<Subtask>> {
    let json = extract_json_array(text)
        .ok_or_else(|| crate::error::Error::Processing("no JSON array in plan output".into()))?;
    let entries: Vec<PlanEntry> = serde_json::from_str(json)?;

    let mut subtasks: Vec<Subtask> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let mut description = entry.description.clone();
        if !entry.skills.is_empty() {
            description.push_str(&format!("\nSkills: {}", entry.skills.join(", ")));
        }
        if let Some(validation) = &entry.validation {
            description.push_str(&format!("\nValidation: {}", validation));
        }
        subtasks.push(Subtask::new(
            task.id,
            &entry.title,
            &description,
            SubtaskKind::parse_lossy(&entry.kind),
        ));
    }

    // Second pass: map index-based dependencies onto generated ids.
    for (i, entry) in entries.iter().enumerate() {
        let deps: Vec<SubtaskId> = entry
            .depends_on
            .iter()
            .filter(|&&d| d < subtasks.len() && d != i)
            .map(|&d| subtasks[d].id)
            .collect();
        subtasks[i].depends_on = deps;
    }
    Ok(subtasks)
}

fn parse_requirements(text: &str) -> Option<Vec<Requirement>> {
    let json = extract_json_array(text)?;
    let entries: Vec<RequirementEntry> = serde_json::from_str(json).ok()?;
    Some(
        entries
            .into_iter()
            .map(|e| Requirement {
                kind: if e.kind.eq_ignore_ascii_case("non_functional") {
                    RequirementKind::NonFunctional
                } else {
                    RequirementKind::Functional
                },
                text: e.text,
            })
            .collect(),
    )
}

/// Deterministic keyword-based requirement extraction. Never fails.
pub fn fallback_requirements(input: &str) -> Vec<Requirement> {
    let mut requirements: Vec<Requirement> = input
        .split(|c| c == '.' || c == ';' || c == '\n')
        .map(str::trim)
        .filter(|s| s.len() > 10)
        .map(|sentence| {
            let lower = sentence.to_lowercase();
            let kind = if NON_FUNCTIONAL_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
                RequirementKind::NonFunctional
            } else {
                RequirementKind::Functional
            };
            Requirement {
                text: sentence.to_string(),
                kind,
            }
        })
        .collect();

    if requirements.is_empty() {
        requirements.push(Requirement {
            text: input.trim().to_string(),
            kind: RequirementKind::Functional,
        });
    }
    requirements
}

/// Drop dependency edges that would close a cycle, in declaration order.
///
/// Edges are re-added one at a time with a cycle check after each, so the
/// result is deterministic: the first edge (by subtask order, then
/// dependency order) that closes a cycle is the one removed.
fn break_cycles(subtasks: &mut [Subtask]) {
    let mut graph: DiGraph<SubtaskId, ()> = DiGraph::new();
    let mut node_of: HashMap<SubtaskId, NodeIndex> = HashMap::new();
    for sub in subtasks.iter() {
        let idx = graph.add_node(sub.id);
        node_of.insert(sub.id, idx);
    }

    for sub in subtasks.iter_mut() {
        let own = node_of[&sub.id];
        sub.depends_on.retain(|dep| {
            let Some(&dep_idx) = node_of.get(dep) else {
                // Unknown ids are kept; the planner ignores them later.
                return true;
            };
            let edge = graph.add_edge(dep_idx, own, ());
            if is_cyclic_directed(&graph) {
                graph.remove_edge(edge);
                slog_warn!(
                    "dropped dependency {} -> {} to break a cycle",
                    dep.short(),
                    sub.id.short()
                );
                false
            } else {
                true
            }
        });
    }
}

/// When every subtask has the same kind and there are at least three,
/// retype the first to analysis and the last to testing so the plan is
/// not skewed toward a single kind.
fn rebalance_kinds(subtasks: &mut [Subtask]) {
    if subtasks.len() < 3 {
        return;
    }
    let first_kind = subtasks[0].kind;
    if subtasks.iter().all(|s| s.kind == first_kind) {
        subtasks[0].kind = SubtaskKind::Analysis;
        if let Some(last) = subtasks.last_mut() {
            last.kind = SubtaskKind::Testing;
        }
    }
}

fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
