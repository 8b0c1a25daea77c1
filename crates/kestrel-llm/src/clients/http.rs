//! OpenAI-compatible completions client (vLLM, Ollama's compat layer, etc.).

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use async_trait::async_trait;

use crate::models::{GenerationOutput, GenerationRequest, Generator, LlmError};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f64,
    max_tokens: u32,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Client for an OpenAI-compatible `/completions` endpoint. Cost is derived
/// from reported usage and a per-model USD-per-1k-token price table; models
/// missing from the table are billed at zero (local serving).
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    prices_per_1k: HashMap<String, f64>,
}

impl HttpGenerator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            prices_per_1k: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, prices_per_1k: HashMap<String, f64>) -> Self {
        self.prices_per_1k = prices_per_1k;
        self
    }

    fn cost(&self, model: &str, tokens: u64) -> f64 {
        self.prices_per_1k
            .get(model)
            .map(|price| price * tokens as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, LlmError> {
        let url = format!("{}/completions", self.base_url);
        let body = CompletionRequest {
            model: &request.model_key,
            prompt: &request.prompt,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            n: request.n_samples,
        };

        debug!(model = %request.model_key, n = request.n_samples, "sending completion request");

        let response = self.client.post(&url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(0)
            } else {
                LlmError::Unavailable(format!("completion request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Unavailable(format!(
                "generator returned {status}: {body}"
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("completion decode: {e}")))?;

        if parsed.choices.is_empty() {
            return Err(LlmError::InvalidResponse("empty choices".into()));
        }

        let usage = parsed.usage.unwrap_or_default();
        let total_tokens = usage.prompt_tokens + usage.completion_tokens;
        Ok(GenerationOutput {
            texts: parsed.choices.into_iter().map(|c| c.text).collect(),
            tokens_in: usage.prompt_tokens,
            tokens_out: usage.completion_tokens,
            cost_usd: self.cost(&request.model_key, total_tokens),
        })
    }

    fn name(&self) -> &'static str {
        "openai-compat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_uses_the_price_table() {
        let generator = HttpGenerator::new("http://localhost:8000/v1")
            .with_prices(HashMap::from([("hosted-large".to_string(), 0.5)]));
        assert!((generator.cost("hosted-large", 2000) - 1.0).abs() < 1e-9);
        assert_eq!(generator.cost("phi-local", 2000), 0.0);
    }
}
