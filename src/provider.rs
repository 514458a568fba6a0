//! Collaborator boundary interfaces.
//!
//! The engine never talks to a model, a classifier, or a vector index
//! directly. It consumes them through the narrow traits below; callers
//! supply implementations. Everything here may fail, and every component
//! in this crate absorbs those failures into typed errors or fallbacks.

use crate::error::Result;
use crate::routing::state::RequestContext;
use async_trait::async_trait;

/// Output of a generation call. No streaming.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
}

/// Output of a classification call.
#[derive(Debug, Clone)]
pub struct Classification {
    /// One of `document_query`, `general_chat`, `code_generation`.
    pub category: crate::routing::Category,
    /// Confidence in [0,1].
    pub confidence: f64,
    /// Free-text reasoning for the choice.
    pub reasoning: String,
}

/// A ranked text passage returned by the context retriever.
#[derive(Debug, Clone)]
pub struct Passage {
    pub text: String,
    pub source: String,
    pub score: f64,
}

/// External text-generation capability: text in, text out, may fail.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<Completion>;
}

/// External classification capability.
#[async_trait]
pub trait ClassificationClient: Send + Sync {
    async fn classify(&self, input: &str, context: &RequestContext) -> Result<Classification>;
}

/// External vector-similarity lookup for the document-query route.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Passage>>;
}
