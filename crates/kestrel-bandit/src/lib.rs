//! kestrel-bandit - Online Thompson-sampling arm selection.
//!
//! One Beta(alpha, beta) arm per genome. `choose` samples every posterior
//! and returns the argmax; `update` folds a clamped reward into the winning
//! arm. Updates are atomic per arm (each arm sits behind its own mutex);
//! reads may race but `pulls` is monotone. The arm table is snapshotted to
//! disk on an update interval and on shutdown.

pub mod snapshot;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use kestrel_config::BanditConfig;

/// One arm's posterior state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arm {
    pub genome_id: String,
    pub alpha: f64,
    pub beta: f64,
    pub pulls: u64,
    pub reward_sum: f64,
}

/// Read-only view of an arm for the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmStats {
    pub pulls: u64,
    pub mean_reward: f64,
    pub expected_value: f64,
}

#[derive(Debug, Error)]
pub enum BanditError {
    #[error("no arms registered")]
    NoArms,

    #[error("unknown arm: {0}")]
    UnknownArm(String),

    #[error("snapshot failed: {0}")]
    Snapshot(String),
}

pub struct ThompsonBandit {
    arms: RwLock<HashMap<String, Arc<Mutex<Arm>>>>,
    rng: StdMutex<StdRng>,
    cfg: BanditConfig,
    updates: AtomicU64,
    snapshot_path: Option<PathBuf>,
}

impl ThompsonBandit {
    pub fn new(cfg: BanditConfig) -> Self {
        Self {
            arms: RwLock::new(HashMap::new()),
            rng: StdMutex::new(StdRng::from_entropy()),
            cfg,
            updates: AtomicU64::new(0),
            snapshot_path: None,
        }
    }

    /// Deterministic sampling for tests and reproducibility checks.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdMutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Enables periodic snapshots; restores the arm table from the snapshot
    /// file when one exists.
    pub fn with_snapshot_path(mut self, path: PathBuf) -> Self {
        match snapshot::load(&path) {
            Ok(Some(arms)) => {
                info!(count = arms.len(), "restored bandit arms from snapshot");
                let restored: HashMap<String, Arc<Mutex<Arm>>> = arms
                    .into_iter()
                    .map(|arm| (arm.genome_id.clone(), Arc::new(Mutex::new(arm))))
                    .collect();
                self.arms = RwLock::new(restored);
            }
            Ok(None) => debug!(path = %path.display(), "no bandit snapshot, starting fresh"),
            Err(err) => warn!(error = %err, "bandit snapshot unreadable, starting fresh"),
        }
        self.snapshot_path = Some(path);
        self
    }

    /// Creates the arm with the configured prior if absent; idempotent.
    pub async fn register(&self, genome_id: &str) {
        let mut arms = self.arms.write().await;
        arms.entry(genome_id.to_string()).or_insert_with(|| {
            debug!(genome_id, "registering bandit arm");
            Arc::new(Mutex::new(Arm {
                genome_id: genome_id.to_string(),
                alpha: self.cfg.prior_alpha,
                beta: self.cfg.prior_beta,
                pulls: 0,
                reward_sum: 0.0,
            }))
        });
    }

    /// Samples every arm's posterior and returns the argmax. Ties break to
    /// fewer pulls, then lexicographic id.
    pub async fn choose(&self) -> Result<String, BanditError> {
        let arms = self.arms.read().await;
        if arms.is_empty() {
            return Err(BanditError::NoArms);
        }

        let mut best: Option<(f64, u64, String)> = None;
        for (genome_id, slot) in arms.iter() {
            let (alpha, beta, pulls) = {
                let arm = slot.lock().await;
                (arm.alpha, arm.beta, arm.pulls)
            };
            let sample = {
                let mut rng = self.rng.lock().expect("bandit rng mutex poisoned");
                Beta::new(alpha, beta)
                    .map(|dist| dist.sample(&mut *rng))
                    .unwrap_or(0.5)
            };

            let candidate = (sample, pulls, genome_id.clone());
            let better = match &best {
                None => true,
                Some((best_sample, best_pulls, best_id)) => {
                    sample > *best_sample
                        || (sample == *best_sample
                            && (pulls < *best_pulls
                                || (pulls == *best_pulls && genome_id < best_id)))
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        Ok(best.map(|(_, _, id)| id).expect("non-empty arm table"))
    }

    /// Folds a reward (clamped to [0, 1]) into one arm.
    pub async fn update(&self, genome_id: &str, reward: f64) -> Result<(), BanditError> {
        let reward = reward.clamp(0.0, 1.0);
        let slot = {
            let arms = self.arms.read().await;
            arms.get(genome_id)
                .cloned()
                .ok_or_else(|| BanditError::UnknownArm(genome_id.to_string()))?
        };

        let expected = {
            let mut arm = slot.lock().await;
            arm.alpha += reward;
            arm.beta += 1.0 - reward;
            arm.pulls += 1;
            arm.reward_sum += reward;
            arm.alpha / (arm.alpha + arm.beta)
        };
        kestrel_metrics::record_bandit_update(genome_id, expected);

        let updates = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
        if updates % self.cfg.snapshot_every == 0 {
            if let Err(err) = self.snapshot().await {
                warn!(error = %err, "periodic bandit snapshot failed");
            }
        }
        Ok(())
    }

    /// Current arm table, keyed by genome id.
    pub async fn stats(&self) -> BTreeMap<String, ArmStats> {
        let arms = self.arms.read().await;
        let mut out = BTreeMap::new();
        for (genome_id, slot) in arms.iter() {
            let arm = slot.lock().await;
            out.insert(
                genome_id.clone(),
                ArmStats {
                    pulls: arm.pulls,
                    mean_reward: if arm.pulls > 0 {
                        arm.reward_sum / arm.pulls as f64
                    } else {
                        0.0
                    },
                    expected_value: arm.alpha / (arm.alpha + arm.beta),
                },
            );
        }
        out
    }

    pub async fn arm_count(&self) -> usize {
        self.arms.read().await.len()
    }

    /// Writes the arm table to the snapshot path with an atomic rename.
    /// Call on shutdown as well as on the periodic interval.
    pub async fn snapshot(&self) -> Result<(), BanditError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let arms: Vec<Arm> = {
            let table = self.arms.read().await;
            let mut collected = Vec::with_capacity(table.len());
            for slot in table.values() {
                collected.push(slot.lock().await.clone());
            }
            collected
        };

        snapshot::save(path, &arms).map_err(|e| BanditError::Snapshot(e.to_string()))
    }
}
