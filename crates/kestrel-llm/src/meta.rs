//! Rubric rewriting through the generator itself.
//!
//! Used by the `rewrite_rubric` mutation operator and by the optional
//! one-shot rewrite before an optimize run. Every rewrite is an LLM call,
//! so results are cached by input hash.

use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::{GenerationRequest, Generator, LlmError};

const META_PROMPT: &str = "You improve prompt preambles for an assistant.\n\
    Rewrite the preamble below to be clearer and more specific while keeping \
    its intent. Reply with the rewritten preamble only.\n\nPreamble:\n";

pub struct RubricRewriter {
    generator: Arc<dyn Generator>,
    model_key: String,
    cache: Mutex<HashMap<String, String>>,
}

impl RubricRewriter {
    pub fn new(generator: Arc<dyn Generator>, model_key: impl Into<String>) -> Self {
        Self {
            generator,
            model_key: model_key.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Produces a rewritten rubric, served from cache when the same input
    /// was rewritten before.
    pub async fn rewrite(&self, rubric: &str) -> Result<String, LlmError> {
        let key = {
            let mut hasher = Sha256::new();
            hasher.update(rubric.as_bytes());
            format!("{:x}", hasher.finalize())
        };

        if let Some(hit) = self.cache.lock().await.get(&key) {
            debug!("rubric rewrite served from cache");
            return Ok(hit.clone());
        }

        let request = GenerationRequest {
            model_key: self.model_key.clone(),
            prompt: format!("{META_PROMPT}{rubric}"),
            temperature: 0.9,
            max_tokens: 256,
            n_samples: 1,
        };
        let output = self.generator.generate(&request).await?;
        let rewritten = output
            .texts
            .first()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| rubric.to_string());

        self.cache.lock().await.insert(key, rewritten.clone());
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockGenerator;

    #[tokio::test]
    async fn rewrites_are_cached_by_input() {
        let generator = Arc::new(MockGenerator::echo());
        let rewriter = RubricRewriter::new(generator.clone(), "phi-local");

        let first = rewriter.rewrite("be terse").await.unwrap();
        let second = rewriter.rewrite("be terse").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(generator.calls(), 1);

        let _ = rewriter.rewrite("be verbose").await.unwrap();
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn empty_rewrites_fall_back_to_the_original() {
        let generator = Arc::new(MockGenerator::with_handler(|req| {
            Ok(crate::models::GenerationOutput::from_text(&req.prompt, "  "))
        }));
        let rewriter = RubricRewriter::new(generator, "phi-local");
        assert_eq!(rewriter.rewrite("keep me").await.unwrap(), "keep me");
    }
}
