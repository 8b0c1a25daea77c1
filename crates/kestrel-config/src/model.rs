//! Typed configuration sections. Every struct is `deny_unknown_fields` so a
//! misspelled option fails at startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the whole stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KestrelConfig {
    /// Base directory for history logs, snapshots and local corpora.
    pub data_dir: PathBuf,
    /// Golden set file; defaults to `{data_dir}/golden_set.json`.
    pub golden_path: Option<PathBuf>,
    pub population: PopulationConfig,
    pub fitness: FitnessWeights,
    pub executor: ExecutorConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub bandit: BanditConfig,
    pub daemon: DaemonConfig,
    pub server: ServerConfig,
    pub models: ModelConfig,
}

impl Default for KestrelConfig {
    fn default() -> Self {
        Self {
            data_dir: crate::data_dir(),
            golden_path: None,
            population: PopulationConfig::default(),
            fitness: FitnessWeights::default(),
            executor: ExecutorConfig::default(),
            retrieval: RetrievalConfig::default(),
            cache: CacheConfig::default(),
            bandit: BanditConfig::default(),
            daemon: DaemonConfig::default(),
            server: ServerConfig::default(),
            models: ModelConfig::default(),
        }
    }
}

/// Population loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PopulationConfig {
    /// Genomes per generation; stable across a run.
    pub size: usize,
    /// Generations per optimize run.
    pub generations: u32,
    pub p_crossover: f64,
    /// Best score at which a run stops early.
    pub early_stop: f64,
    /// Bounded worker pool evaluating genome-example pairs.
    pub eval_workers: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 12,
            generations: 10,
            p_crossover: 0.5,
            early_stop: 0.95,
            eval_workers: 8,
        }
    }
}

impl PopulationConfig {
    /// Elites surviving unchanged each generation.
    pub fn elite(&self) -> usize {
        (self.size / 6).max(1)
    }

    /// Tournament size for parent selection.
    pub fn tournament(&self) -> usize {
        (self.size / 4).max(2)
    }
}

/// Resource penalty weights applied by the fitness aggregator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitnessWeights {
    pub w_lat: f64,
    pub w_tok: f64,
    pub w_rep: f64,
    pub w_cost: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            w_lat: 1e-3,
            w_tok: 5e-4,
            w_rep: 0.2,
            w_cost: 0.5,
        }
    }
}

/// Executor timeouts and repair budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Hard per-call generator timeout.
    pub timeout_ms: u64,
    /// Maximum schema repair calls per execution.
    pub max_repairs: u32,
    /// Backoff before each generator retry.
    pub retry_schedule_ms: Vec<u64>,
    /// Per-source budget for injected retrieval context.
    pub context_snippet_chars: usize,
    /// Samples requested when a genome asks for self-consistency.
    pub consensus_samples: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_repairs: 2,
            retry_schedule_ms: vec![100, 300, 900],
            context_snippet_chars: 500,
            consensus_samples: 3,
        }
    }
}

/// Hybrid retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Per-method timeout during the dense/lexical fanout.
    pub fanout_timeout_ms: u64,
    /// Reciprocal rank fusion constant.
    pub rrf_c: f64,
    /// Cross-encoder scoring batch size.
    pub rerank_batch: usize,
    /// Local document corpus loaded into the reference indexes.
    pub corpus_path: Option<PathBuf>,
    /// OpenAI-compatible embeddings endpoint; the deterministic hash
    /// embedder is used when unset.
    pub embedding_url: Option<String>,
    pub embedding_model: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fanout_timeout_ms: 800,
            rrf_c: 60.0,
            rerank_batch: 32,
            corpus_path: None,
            embedding_url: None,
            embedding_model: "BAAI/bge-large-en-v1.5".to_string(),
        }
    }
}

/// Result cache policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub ttl_s: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_s: 600,
            max_entries: 10_000,
        }
    }
}

/// Thompson bandit persistence and priors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BanditConfig {
    /// Snapshot the arm table every N updates (and on shutdown).
    pub snapshot_every: u64,
    pub prior_alpha: f64,
    pub prior_beta: f64,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            snapshot_every: 100,
            prior_alpha: 1.0,
            prior_beta: 1.0,
        }
    }
}

/// Improvement daemon schedule and promotion gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub enabled: bool,
    /// Seconds between scheduled optimize runs.
    pub interval_s: u64,
    /// Minimum improvement over the live best before promoting.
    pub promotion_delta: f64,
    /// Genomes carried by a promotion event.
    pub top_n: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_s: 3600,
            promotion_delta: 0.05,
            top_n: 3,
        }
    }
}

/// HTTP façade binding and backpressure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bounded in-flight RAG queries; excess fails fast as Overloaded.
    pub max_inflight_queries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8700,
            max_inflight_queries: 64,
        }
    }
}

/// Generator endpoint and the model allow-list genomes may reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// OpenAI-compatible completions endpoint; the scripted mock generator
    /// is used when unset.
    pub generator_url: Option<String>,
    pub allow_list: Vec<String>,
    /// Baseline genome rubric used for cold starts and as the seed base.
    pub baseline_rubric: String,
    pub baseline_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            generator_url: None,
            allow_list: vec![
                "phi-local".to_string(),
                "mistral-local".to_string(),
                "qwen-local".to_string(),
            ],
            baseline_rubric: "You are a precise assistant. Answer the task directly.".to_string(),
            baseline_model: "phi-local".to_string(),
        }
    }
}
