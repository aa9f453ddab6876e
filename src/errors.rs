//! Error types for the medcite engine.
//!
//! One request never fails because a single source or sub-step failed;
//! those conditions are absorbed into degraded answers. The variants here
//! cover the caller-visible failures plus the internal outcomes the
//! gateway's retry logic classifies as transient or permanent.

use thiserror::Error;

use crate::types::SourceKind;

/// Main error type for the retrieval engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or empty query, rejected before any retrieval
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Request deadline expired before any source could be attempted
    #[error("Request deadline of {budget_ms}ms exhausted before retrieval")]
    DeadlineExceeded { budget_ms: u64 },

    /// Transient source failure (timeout, temporary unavailability)
    #[error("Source {source} unavailable: {reason}")]
    SourceUnavailable { source: SourceKind, reason: String },

    /// Permanent source failure (malformed query rejected, auth, quota)
    #[error("Source {source} rejected the request: {reason}")]
    SourceRejected { source: SourceKind, reason: String },

    /// The per-source token bucket could not admit the call in time
    #[error("Rate limit exceeded for source {source}")]
    RateLimited { source: SourceKind },

    /// The per-source circuit breaker is open
    #[error("Circuit open for source {source}")]
    CircuitOpen { source: SourceKind },

    /// Text-completion capability failed or returned nothing usable
    #[error("Completion failed: {0}")]
    CompletionFailed(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Convert anyhow errors from adapter internals
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::ConfigError(err.to_string())
    }
}

impl EngineError {
    /// Whether the gateway may retry the failed call.
    ///
    /// Timeouts and temporary unavailability are transient; a source that
    /// rejected the request outright will reject it again.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::SourceUnavailable { .. } => true,
            EngineError::HttpError(_) => true,
            EngineError::SourceRejected { .. } => false,
            EngineError::RateLimited { .. } => false,
            EngineError::CircuitOpen { .. } => false,
            EngineError::CompletionFailed(_) => false,
            _ => false,
        }
    }
}
