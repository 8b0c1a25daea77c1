//! Generator plug-in contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kestrel_core::KestrelError;

/// One generation call. `n_samples > 1` requests self-consistency sampling;
/// backends report usage and cost for the whole call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model_key: String,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub n_samples: u32,
}

/// Backend answer: one text per requested sample plus usage accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub texts: Vec<String>,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
}

impl GenerationOutput {
    /// Single-sample output with a rough 4-chars-per-token usage estimate,
    /// used by local stubs that have no tokenizer.
    pub fn from_text(prompt: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            tokens_in: (prompt.len() / 4) as u64,
            tokens_out: (text.len() / 4) as u64,
            cost_usd: 0.0,
            texts: vec![text],
        }
    }
}

/// Generator failures; anything else a backend produces is mapped onto
/// these before leaving the adapter.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("generator timed out after {0} ms")]
    Timeout(u64),

    #[error("invalid generator response: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for KestrelError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unavailable(msg) => KestrelError::GeneratorUnavailable(msg),
            LlmError::Timeout(ms) => KestrelError::GeneratorTimeout(ms),
            LlmError::InvalidResponse(msg) => KestrelError::GeneratorUnavailable(msg),
        }
    }
}

/// Opaque text-generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, LlmError>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_estimates_usage() {
        let out = GenerationOutput::from_text("a prompt of thirty-two characters", "answer text");
        assert_eq!(out.texts.len(), 1);
        assert!(out.tokens_in > 0);
        assert!(out.tokens_out > 0);
        assert_eq!(out.cost_usd, 0.0);
    }

    #[test]
    fn llm_errors_map_to_service_kinds() {
        let e: KestrelError = LlmError::Timeout(30_000).into();
        assert_eq!(e.kind(), "GeneratorTimeout");
        let e: KestrelError = LlmError::Unavailable("down".into()).into();
        assert_eq!(e.kind(), "GeneratorUnavailable");
    }
}
