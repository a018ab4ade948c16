//! Error types for ragserve
//!
//! Only input-validation errors ever reach a caller of the pipeline;
//! upstream timeouts and failures are recovered into fallback answers
//! and the variants below carry their detail into the logs.

use thiserror::Error;

/// Pipeline phase that talks to an external collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Retrieval,
    Generation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Retrieval => write!(f, "retrieval"),
            Phase::Generation => write!(f, "generation"),
        }
    }
}

/// Main error type for the query-serving pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// Caller supplied a bad argument; rejected before any I/O
    #[error("Invalid input for `{field}`: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// External call exceeded its phase budget
    #[error("{phase} timed out after {elapsed_ms}ms")]
    Timeout { phase: Phase, elapsed_ms: u64 },

    /// External collaborator returned an error
    #[error("{phase} failed: {message}")]
    Upstream { phase: Phase, message: String },

    /// Upstream payload did not match the expected record shape
    #[error("Invalid upstream payload, field `{field}`: {reason}")]
    InvalidResponse { field: &'static str, reason: String },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic errors with context
    #[error("ragserve error: {0}")]
    Generic(String),
}

impl RagError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RagError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn timeout(phase: Phase, elapsed_ms: u64) -> Self {
        RagError::Timeout { phase, elapsed_ms }
    }

    pub fn upstream(phase: Phase, message: impl Into<String>) -> Self {
        RagError::Upstream {
            phase,
            message: message.into(),
        }
    }

    /// True for errors the caller caused and must see
    pub fn is_input_error(&self) -> bool {
        matches!(self, RagError::InvalidInput { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RagError::Timeout { .. })
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}
