//! Request state threaded through the routing pipeline.
//!
//! Each pipeline step consumes the state and returns a new value instead of
//! mutating in place. Two invariants hold across all steps: `retry_count`
//! only ever increases, and `errors` only grows until a terminal state is
//! reached.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Workflow category a request is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DocumentQuery,
    GeneralChat,
    CodeGeneration,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::DocumentQuery => "document_query",
            Category::GeneralChat => "general_chat",
            Category::CodeGeneration => "code_generation",
        }
    }

    /// Parse a category tag, defaulting to general chat for anything
    /// unrecognized.
    pub fn parse_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "document_query" => Category::DocumentQuery,
            "code_generation" => Category::CodeGeneration,
            _ => Category::GeneralChat,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One prior turn of conversation supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

/// Caller-supplied context: conversation history and prior uploads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub uploads: Vec<String>,
}

impl RequestContext {
    /// Parse caller context from JSON, substituting an empty default and a
    /// warning note when the payload is malformed. Never fails.
    pub fn from_json(text: &str) -> (Self, Option<String>) {
        match serde_json::from_str(text) {
            Ok(context) => (context, None),
            Err(err) => (
                Self::default(),
                Some(format!("malformed request context ignored: {}", err)),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.uploads.is_empty()
    }
}

/// Position in the routing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingStep {
    Validating,
    Enriching,
    Classifying,
    Routed(Category),
    Responding,
    Done,
    Error,
}

/// Immutable-per-step request state.
#[derive(Debug, Clone)]
pub struct RequestState {
    pub input: String,
    pub step: RoutingStep,
    pub category: Option<Category>,
    pub confidence: f64,
    pub reasoning: String,
    pub context: RequestContext,
    pub errors: Vec<Error>,
    pub warnings: Vec<String>,
    pub retry_count: u32,
}

impl RequestState {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            step: RoutingStep::Validating,
            category: None,
            confidence: 0.0,
            reasoning: String::new(),
            context: RequestContext::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            retry_count: 0,
        }
    }

    pub fn advanced(mut self, step: RoutingStep) -> Self {
        self.step = step;
        self
    }

    pub fn with_context(mut self, context: RequestContext, warning: Option<String>) -> Self {
        self.context = context;
        if let Some(note) = warning {
            self.warnings.push(note);
        }
        self
    }

    pub fn classified(mut self, category: Category, confidence: f64, reasoning: String) -> Self {
        self.category = Some(category);
        self.confidence = confidence;
        self.reasoning = reasoning;
        self
    }

    /// Append an error. Errors are never removed.
    pub fn with_error(mut self, error: Error) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_warning(mut self, note: impl Into<String>) -> Self {
        self.warnings.push(note.into());
        self
    }

    /// Increment the retry counter. The counter never decreases.
    pub fn bumped_retry(mut self) -> Self {
        self.retry_count += 1;
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.errors.last()
    }
}

/// Response handed back to the caller for any route, including the
/// terminal error path.
#[derive(Debug, Clone)]
pub struct FinalResponse {
    pub text: String,
    /// Workflow tag: a category name, or `error` for the terminal path.
    pub workflow: String,
    pub sources: Vec<String>,
    pub confidence: f64,
}
