//! Executor contract: `(PromptSpec, Genome) -> ExecutionMetrics`.
//!
//! The executor owns no persistent state. Offline evaluation converts every
//! downstream failure into metrics so the population loop never sees an
//! error; the request path propagates the same failures to the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use kestrel_config::ExecutorConfig;
use kestrel_core::{ExecutionMetrics, Genome, KestrelError, PromptSpec};
use kestrel_retrieval::{RagService, RetrievalMethod};

use crate::compare::{Comparator, IntentComparator};
use crate::models::{GenerationOutput, GenerationRequest, Generator, LlmError};
use crate::output::{parse_structured, repair_prompt};
use crate::safety::{RegexSafetyFilter, SafetyFilter};
use crate::validation::{HeuristicValidator, Validator};

/// Successful execution: the chosen response text plus its metrics.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub text: String,
    pub metrics: ExecutionMetrics,
}

struct RunFailure {
    error: KestrelError,
    latency_ms: u64,
    repairs: u32,
}

pub struct Executor {
    generator: Arc<dyn Generator>,
    rag: Option<Arc<RagService>>,
    validator: Arc<dyn Validator>,
    comparator: Arc<dyn Comparator>,
    safety: Arc<dyn SafetyFilter>,
    cfg: ExecutorConfig,
}

impl Executor {
    pub fn new(generator: Arc<dyn Generator>, cfg: ExecutorConfig) -> Self {
        Self {
            generator,
            rag: None,
            validator: Arc::new(HeuristicValidator),
            comparator: Arc::new(IntentComparator),
            safety: Arc::new(RegexSafetyFilter),
            cfg,
        }
    }

    pub fn with_rag(mut self, rag: Arc<RagService>) -> Self {
        self.rag = Some(rag);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_safety(mut self, safety: Arc<dyn SafetyFilter>) -> Self {
        self.safety = safety;
        self
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Offline evaluation entry point: never fails. Downstream errors come
    /// back as failure metrics with the elapsed time and repair count.
    pub async fn execute(&self, spec: &PromptSpec, genome: &Genome) -> ExecutionMetrics {
        match self.run(spec, genome).await {
            Ok(outcome) => outcome.metrics,
            Err(failure) => {
                kestrel_metrics::record_executor_failure(failure.error.kind());
                ExecutionMetrics::failure(failure.latency_ms, failure.repairs)
            }
        }
    }

    /// Request-path entry point: propagates generator failures, and turns
    /// exhausted schema repair into `InvalidOutput`.
    pub async fn execute_request(
        &self,
        spec: &PromptSpec,
        genome: &Genome,
    ) -> Result<ExecutionOutcome, KestrelError> {
        let outcome = self.run(spec, genome).await.map_err(|failure| {
            kestrel_metrics::record_executor_failure(failure.error.kind());
            failure.error
        })?;

        if spec.intent.requires_structured_output() && !outcome.metrics.schema_ok {
            let error = KestrelError::InvalidOutput(format!(
                "structured output still invalid after {} repairs",
                outcome.metrics.repairs
            ));
            kestrel_metrics::record_executor_failure(error.kind());
            return Err(error);
        }
        Ok(outcome)
    }

    async fn run(&self, spec: &PromptSpec, genome: &Genome) -> Result<ExecutionOutcome, RunFailure> {
        let context = self.gather_context(spec, genome).await;
        let prompt = self.build_prompt(spec, genome, &context);

        let request = GenerationRequest {
            model_key: genome.model_key().to_string(),
            prompt: prompt.clone(),
            temperature: genome.temp(),
            max_tokens: genome.max_tokens(),
            n_samples: if genome.use_consensus() {
                self.cfg.consensus_samples
            } else {
                1
            },
        };

        let started = Instant::now();
        let output = self.call_generator(&request).await.map_err(|err| RunFailure {
            error: err.into(),
            latency_ms: started.elapsed().as_millis() as u64,
            repairs: 0,
        })?;

        let mut tokens_total = output.tokens_in + output.tokens_out;
        let mut cost_usd = output.cost_usd;
        let mut text = pick_consensus(&output.texts);

        let mut repairs = 0u32;
        let mut schema_ok = true;
        if spec.intent.requires_structured_output() {
            schema_ok = parse_structured(&text).is_some();
            while !schema_ok && repairs < self.cfg.max_repairs {
                repairs += 1;
                debug!(repairs, "attempting schema repair");
                let repair_request = GenerationRequest {
                    model_key: genome.model_key().to_string(),
                    prompt: repair_prompt(&prompt, &text),
                    temperature: genome.temp(),
                    max_tokens: genome.max_tokens(),
                    n_samples: 1,
                };
                let repaired = self
                    .call_generator(&repair_request)
                    .await
                    .map_err(|err| RunFailure {
                        error: err.into(),
                        latency_ms: started.elapsed().as_millis() as u64,
                        repairs,
                    })?;
                tokens_total += repaired.tokens_in + repaired.tokens_out;
                cost_usd += repaired.cost_usd;
                if let Some(candidate) = repaired.texts.first() {
                    text = candidate.clone();
                    schema_ok = parse_structured(&text).is_some();
                }
            }
        }
        let latency_ms = started.elapsed().as_millis() as u64;
        kestrel_metrics::record_executor_latency(latency_ms);

        let safety_flags = self.safety.flags(&text);
        let accuracy = spec
            .expected
            .as_deref()
            .map(|expected| self.comparator.compare(expected, &text, spec.intent));
        let validator_score = self.validator.score(spec, &text);

        Ok(ExecutionOutcome {
            metrics: ExecutionMetrics {
                schema_ok,
                safety_flags,
                validator_score,
                accuracy,
                latency_ms,
                tokens_total,
                repairs,
                cost_usd,
            },
            text,
        })
    }

    /// Pulls hybrid retrieval context when the genome asks for it. A failed
    /// retrieval degrades to an empty context instead of failing the run.
    async fn gather_context(&self, spec: &PromptSpec, genome: &Genome) -> Vec<String> {
        let topk = genome.retriever_topk() as usize;
        if topk == 0 {
            return Vec::new();
        }
        let Some(rag) = &self.rag else {
            return Vec::new();
        };

        match rag.query(&spec.prompt, topk, RetrievalMethod::Hybrid).await {
            Ok(response) => response
                .results
                .into_iter()
                .take(topk.min(5))
                .map(|doc| truncate(&doc.text, self.cfg.context_snippet_chars))
                .collect(),
            Err(err) => {
                warn!(error = %err, "context retrieval failed, continuing without context");
                Vec::new()
            }
        }
    }

    /// Final prompt: rubric, optional CoT scaffold, optional retrieved
    /// context, output-format instruction for structured intents, task.
    fn build_prompt(&self, spec: &PromptSpec, genome: &Genome, context: &[String]) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !genome.rubric().trim().is_empty() {
            parts.push(genome.rubric().trim().to_string());
        }
        if genome.cot() {
            parts.push(
                "Think through the problem step by step before giving the final answer."
                    .to_string(),
            );
        }
        if !context.is_empty() {
            parts.push(format!("Context:\n{}", context.join("\n---\n")));
        }
        if spec.intent.requires_structured_output() {
            parts.push(
                "Respond with a single JSON object of the form {\"tool\": \"...\", \"arguments\": {...}}."
                    .to_string(),
            );
        }
        parts.push(format!("Task:\n{}", spec.prompt));
        parts.join("\n\n")
    }

    /// One generator call under the hard timeout, retried on endpoint
    /// errors per the backoff schedule. Timeouts are terminal.
    async fn call_generator(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, LlmError> {
        let timeout = Duration::from_millis(self.cfg.timeout_ms);
        let mut attempt = 0usize;
        loop {
            match tokio::time::timeout(timeout, self.generator.generate(request)).await {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(err @ LlmError::Timeout(_))) => return Err(err),
                Ok(Err(err)) => {
                    let Some(&delay) = self.cfg.retry_schedule_ms.get(attempt) else {
                        return Err(err);
                    };
                    warn!(attempt, delay_ms = delay, error = %err, "generator call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(_) => return Err(LlmError::Timeout(self.cfg.timeout_ms)),
            }
        }
    }
}

/// Majority vote over normalized samples; earliest sample wins ties.
fn pick_consensus(texts: &[String]) -> String {
    if texts.len() <= 1 {
        return texts.first().cloned().unwrap_or_default();
    }

    let normalize =
        |t: &str| t.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");

    let mut best_index = 0usize;
    let mut best_count = 0usize;
    for (i, text) in texts.iter().enumerate() {
        let norm = normalize(text);
        let count = texts.iter().filter(|other| normalize(other) == norm).count();
        if count > best_count {
            best_count = count;
            best_index = i;
        }
    }
    texts[best_index].clone()
}

fn truncate(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let mut cut = budget;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}
