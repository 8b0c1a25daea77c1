//! Common types for the retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use kestrel_core::KestrelError;

/// Metadata equality filters. Ordered so cache keys are canonical.
pub type Filters = BTreeMap<String, String>;

/// Retrieval strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    Dense,
    Lexical,
    Hybrid,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMethod::Dense => "dense",
            RetrievalMethod::Lexical => "lexical",
            RetrievalMethod::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A ranked hit from one search method. Scores are only comparable within
/// the method that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f32,
}

/// A stored document with its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocRecord {
    pub doc_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Final result item handed to callers; `score` is the rerank score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub doc_id: String,
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub source_metadata: serde_json::Value,
}

/// Retrieval pipeline errors. Cloneable so coalesced waiters can share the
/// leader's outcome.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Every configured method failed or timed out.
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("too many in-flight queries")]
    Overloaded,

    #[error("{0}")]
    Internal(String),
}

impl From<RetrievalError> for KestrelError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidQuery(msg) => KestrelError::InvalidInput(msg),
            RetrievalError::Unavailable(msg) => KestrelError::RetrievalUnavailable(msg),
            RetrievalError::Overloaded => {
                KestrelError::Overloaded("retrieval in-flight limit reached".into())
            }
            RetrievalError::Backend(msg) | RetrievalError::Embedding(msg) => {
                KestrelError::RetrievalUnavailable(msg)
            }
            RetrievalError::Internal(msg) => KestrelError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RetrievalMethod::Hybrid).unwrap(), "\"hybrid\"");
        let parsed: RetrievalMethod = serde_json::from_str("\"dense\"").unwrap();
        assert_eq!(parsed, RetrievalMethod::Dense);
    }

    #[test]
    fn errors_map_onto_service_kinds() {
        let unavailable: KestrelError = RetrievalError::Unavailable("both down".into()).into();
        assert_eq!(unavailable.kind(), "RetrievalUnavailable");

        let overloaded: KestrelError = RetrievalError::Overloaded.into();
        assert_eq!(overloaded.kind(), "Overloaded");
        assert!(overloaded.retriable());
    }
}
