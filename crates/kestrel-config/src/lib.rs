//! Kestrel Configuration - Centralized configuration management
//!
//! Every tunable in the stack is enumerated here with its default. Values are
//! layered: built-in defaults, then an optional `kestrel.toml` under the data
//! directory, then environment variables. Unknown keys in the TOML file are a
//! startup error, not a silent no-op.

mod model;
pub use model::*;

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Data directory resolution order: `KESTREL_DATA_DIR`, then
/// `~/kestrel-data`, then `./kestrel-data` as a last resort.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = env::var("KESTREL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|h| h.join("kestrel-data"))
        .unwrap_or_else(|| PathBuf::from("kestrel-data"))
}

impl KestrelConfig {
    /// Loads the layered configuration: defaults, optional TOML file, env.
    pub fn load() -> Result<Self, ConfigError> {
        let dir = data_dir();
        let file = env::var("KESTREL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dir.join("config").join("kestrel.toml"));

        let mut cfg = if file.exists() {
            info!(path = %file.display(), "loading configuration file");
            Self::from_file(&file)?
        } else {
            Self::default()
        };

        cfg.data_dir = dir;
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Strict parse of a TOML file; unknown keys are rejected.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Environment variables take final precedence.
    fn apply_env(&mut self) {
        if let Ok(host) = env::var("KESTREL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env::var("KESTREL_PORT").ok().and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(url) = env::var("KESTREL_GENERATOR_URL") {
            self.models.generator_url = Some(url);
        }
        if let Ok(url) = env::var("KESTREL_EMBEDDING_URL") {
            self.retrieval.embedding_url = Some(url);
        }
        if let Ok(path) = env::var("KESTREL_GOLDEN_PATH") {
            self.golden_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = env::var("KESTREL_CORPUS_PATH") {
            self.retrieval.corpus_path = Some(PathBuf::from(path));
        }
    }

    /// Range checks mirroring the documented bounds. Called once at startup;
    /// a violation aborts boot rather than surfacing mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.population;
        if !(4..=64).contains(&p.size) {
            return Err(ConfigError::Invalid(format!(
                "population.size {} outside [4, 64]",
                p.size
            )));
        }
        if p.generations == 0 {
            return Err(ConfigError::Invalid("population.generations must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&p.p_crossover) {
            return Err(ConfigError::Invalid("population.p_crossover outside [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&p.early_stop) {
            return Err(ConfigError::Invalid("population.early_stop outside [0, 1]".into()));
        }
        if p.eval_workers == 0 {
            return Err(ConfigError::Invalid("population.eval_workers must be >= 1".into()));
        }

        let w = &self.fitness;
        if w.w_lat < 0.0 || w.w_tok < 0.0 || w.w_rep < 0.0 || w.w_cost < 0.0 {
            return Err(ConfigError::Invalid("fitness weights must be non-negative".into()));
        }

        if self.executor.retry_schedule_ms.is_empty() {
            return Err(ConfigError::Invalid("executor.retry_schedule_ms must not be empty".into()));
        }
        if self.executor.timeout_ms == 0 {
            return Err(ConfigError::Invalid("executor.timeout_ms must be >= 1".into()));
        }

        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be >= 1".into()));
        }
        if self.cache.ttl_s == 0 {
            return Err(ConfigError::Invalid("cache.ttl_s must be >= 1".into()));
        }

        if self.bandit.prior_alpha < 1.0 || self.bandit.prior_beta < 1.0 {
            return Err(ConfigError::Invalid("bandit priors must be >= 1".into()));
        }
        if self.bandit.snapshot_every == 0 {
            return Err(ConfigError::Invalid("bandit.snapshot_every must be >= 1".into()));
        }

        if self.daemon.promotion_delta < 0.0 {
            return Err(ConfigError::Invalid("daemon.promotion_delta must be >= 0".into()));
        }
        if self.daemon.top_n == 0 {
            return Err(ConfigError::Invalid("daemon.top_n must be >= 1".into()));
        }

        if self.server.max_inflight_queries == 0 {
            return Err(ConfigError::Invalid("server.max_inflight_queries must be >= 1".into()));
        }

        if self.models.allow_list.is_empty() {
            return Err(ConfigError::Invalid("models.allow_list must not be empty".into()));
        }

        Ok(())
    }

    /// Directory holding per-run history logs.
    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }

    /// Durable bandit arm table.
    pub fn bandit_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("bandit").join("snapshot.json")
    }

    /// Golden set file used by optimize runs.
    pub fn golden_path(&self) -> PathBuf {
        self.golden_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("golden_set.json"))
    }
}
