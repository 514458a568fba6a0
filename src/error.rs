//! Error taxonomy for the orchestration engine.
//!
//! Every failure in the pipeline is classified by a kind (which collaborator
//! or stage produced it) and a severity. Severity drives two decisions:
//! whether the retry policy keeps retrying (never for `Critical`), and
//! whether the router treats a run as recoverable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How serious a failure is.
///
/// `Critical` errors abort retry loops immediately; everything else is
/// eligible for retry with backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Stable error-kind tags used for routing and user-facing classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ApiError,
    ValidationError,
    ProcessingError,
    TimeoutError,
    NetworkError,
    EmbeddingError,
    VectorStoreError,
    LlmError,
    UnknownError,
    CircuitOpen,
    RetriesExhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ApiError => "api_error",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ProcessingError => "processing_error",
            ErrorKind::TimeoutError => "timeout_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::EmbeddingError => "embedding_error",
            ErrorKind::VectorStoreError => "vector_store_error",
            ErrorKind::LlmError => "llm_error",
            ErrorKind::UnknownError => "unknown_error",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::RetriesExhausted => "retries_exhausted",
        }
    }
}

/// Crate-wide error type.
///
/// Variants are `Clone` so errors can be recorded into `RequestState` and
/// re-inspected later by the router's terminal path. IO and parse errors
/// from the standard library are captured as strings for the same reason.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("API error: {message}")]
    Api { message: String, severity: Severity },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("LLM error: {message}")]
    Llm { message: String, severity: Severity },

    #[error("Circuit open for operation: {operation}")]
    CircuitOpen { operation: String },

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Convenience constructor for a medium-severity LLM failure.
    pub fn llm(message: impl Into<String>) -> Self {
        Error::Llm {
            message: message.into(),
            severity: Severity::Medium,
        }
    }

    /// Convenience constructor for a medium-severity API failure.
    pub fn api(message: impl Into<String>) -> Self {
        Error::Api {
            message: message.into(),
            severity: Severity::Medium,
        }
    }

    /// The taxonomy kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Api { .. } => ErrorKind::ApiError,
            Error::Validation(_) => ErrorKind::ValidationError,
            Error::Processing(_) => ErrorKind::ProcessingError,
            Error::Timeout(_) => ErrorKind::TimeoutError,
            Error::Network(_) => ErrorKind::NetworkError,
            Error::Embedding(_) => ErrorKind::EmbeddingError,
            Error::VectorStore(_) => ErrorKind::VectorStoreError,
            Error::Llm { .. } => ErrorKind::LlmError,
            Error::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Error::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            Error::Io(_) | Error::Config(_) => ErrorKind::ProcessingError,
            Error::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// The severity for this error.
    ///
    /// `Api` and `Llm` carry an explicit severity because the same
    /// collaborator can fail transiently or terminally; the rest have a
    /// fixed severity per kind.
    pub fn severity(&self) -> Severity {
        match self {
            Error::Api { severity, .. } => *severity,
            Error::Llm { severity, .. } => *severity,
            Error::Validation(_) => Severity::Low,
            Error::Processing(_) => Severity::Medium,
            Error::Timeout(_) => Severity::Medium,
            Error::Network(_) => Severity::Medium,
            Error::Embedding(_) => Severity::Medium,
            Error::VectorStore(_) => Severity::High,
            Error::CircuitOpen { .. } => Severity::High,
            Error::RetriesExhausted { source, .. } => source.severity(),
            Error::Io(_) => Severity::Medium,
            Error::Config(_) => Severity::Medium,
            Error::Unknown(_) => Severity::High,
        }
    }

    /// Whether the retry policy may attempt this operation again.
    pub fn is_retryable(&self) -> bool {
        self.severity() != Severity::Critical
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Processing(format!("JSON parse failure: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
