//! Typed errors for the pipeline library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell
//! fatal setup problems apart from collaborator failures.

use thiserror::Error;

/// Errors surfaced by the orchestrator and its stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Queue or worker wiring is missing or inconsistent. Fatal for a run.
    #[error("pipeline setup failed: {reason}")]
    Setup { reason: String },

    /// Run or orchestrator configuration is not usable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A stage queue lost its receiving side.
    #[error("queue closed: {queue}")]
    QueueClosed { queue: &'static str },

    /// A collaborator call failed.
    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Filesystem error (result sinks)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the HTTP collaborators (search, enrichment, detail, classification).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Transport-level failure (connect, timeout, body)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response could not be interpreted
    #[error("parse error: {0}")]
    Parse(String),

    /// Collaborator is misconfigured
    #[error("config error: {0}")]
    Config(String),

    /// Rate limiter refused the request
    #[error("rate limit exceeded")]
    RateLimited,
}

impl CollaboratorError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::RateLimited => true,
            Self::Parse(_) | Self::Config(_) => false,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;
