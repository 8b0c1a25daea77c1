//! Service-wide error kinds.
//!
//! The kind names are part of the wire contract: every HTTP error response
//! carries `{kind, message, retriable}` and callers dispatch on `kind`.

use thiserror::Error;

/// Canonical result alias used across Kestrel crates.
pub type Result<T> = std::result::Result<T, KestrelError>;

/// Error kinds shared by every Kestrel component.
#[derive(Debug, Clone, Error)]
pub enum KestrelError {
    /// Request violates schema or value ranges.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The generator endpoint failed after bounded retries.
    #[error("generator unavailable: {0}")]
    GeneratorUnavailable(String),

    /// The generator did not answer within the hard per-call timeout.
    #[error("generator timed out after {0} ms")]
    GeneratorTimeout(u64),

    /// Both retrieval methods failed.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// A bounded queue rejected the work.
    #[error("overloaded: {0}")]
    Overloaded(String),

    /// Schema repair exhausted on a request path.
    #[error("invalid output: {0}")]
    InvalidOutput(String),

    /// The golden set failed validation; the optimize run aborts.
    #[error("golden set invalid: {0}")]
    GoldenSetInvalid(String),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl KestrelError {
    /// Stable kind label used in the error envelope and in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            KestrelError::InvalidInput(_) => "InvalidInput",
            KestrelError::GeneratorUnavailable(_) => "GeneratorUnavailable",
            KestrelError::GeneratorTimeout(_) => "GeneratorTimeout",
            KestrelError::RetrievalUnavailable(_) => "RetrievalUnavailable",
            KestrelError::Overloaded(_) => "Overloaded",
            KestrelError::InvalidOutput(_) => "InvalidOutput",
            KestrelError::GoldenSetInvalid(_) => "GoldenSetInvalid",
            KestrelError::Internal(_) => "Internal",
        }
    }

    /// Whether the caller may retry the same request.
    pub fn retriable(&self) -> bool {
        match self {
            KestrelError::InvalidInput(_)
            | KestrelError::InvalidOutput(_)
            | KestrelError::GoldenSetInvalid(_) => false,
            KestrelError::GeneratorUnavailable(_)
            | KestrelError::GeneratorTimeout(_)
            | KestrelError::RetrievalUnavailable(_)
            | KestrelError::Overloaded(_)
            | KestrelError::Internal(_) => true,
        }
    }
}
