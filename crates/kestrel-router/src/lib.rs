//! kestrel-router - Bandit-fronted request path.
//!
//! Per request: choose a genome through the bandit, execute, convert the
//! execution metrics into a reward with the same aggregator as offline
//! fitness, update the chosen arm. Failed executions propagate to the
//! caller and skip the bandit update so arms are never poisoned with
//! non-informative rewards.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use kestrel_bandit::ThompsonBandit;
use kestrel_config::FitnessWeights;
use kestrel_core::{Genome, KestrelError, PromptSpec};
use kestrel_evolve::{fitness, PromotionEvent};
use kestrel_llm::Executor;

/// What the caller gets back: the generator's response, not the metrics.
#[derive(Debug, Clone, Serialize)]
pub struct RouteResponse {
    pub genome_id: String,
    pub text: String,
}

pub struct Router {
    bandit: Arc<ThompsonBandit>,
    executor: Arc<Executor>,
    weights: FitnessWeights,
    baseline: Genome,
    catalog: RwLock<HashMap<String, Genome>>,
}

impl Router {
    pub fn new(
        bandit: Arc<ThompsonBandit>,
        executor: Arc<Executor>,
        weights: FitnessWeights,
        baseline: Genome,
    ) -> Self {
        Self {
            bandit,
            executor,
            weights,
            baseline,
            catalog: RwLock::new(HashMap::new()),
        }
    }

    /// Serves one request through the bandit-chosen genome.
    pub async fn handle(&self, spec: &PromptSpec) -> Result<RouteResponse, KestrelError> {
        self.ensure_cold_start().await;

        let genome_id = self
            .bandit
            .choose()
            .await
            .map_err(|e| KestrelError::Internal(e.to_string()))?;
        let genome = {
            let catalog = self.catalog.read().await;
            catalog.get(&genome_id).cloned()
        }
        .unwrap_or_else(|| {
            warn!(genome_id, "chosen arm missing from catalog, using baseline");
            self.baseline.clone()
        });

        match self.executor.execute_request(spec, &genome).await {
            Ok(outcome) => {
                let reward = fitness(&outcome.metrics, &self.weights).clamp(0.0, 1.0);
                if let Err(err) = self.bandit.update(&genome_id, reward).await {
                    warn!(error = %err, "bandit update failed");
                }
                debug!(genome_id, reward, "request served");
                Ok(RouteResponse {
                    genome_id,
                    text: outcome.text,
                })
            }
            Err(err) => {
                // Errors carry no signal about genome quality; skip the
                // update and surface the failure.
                debug!(genome_id, kind = err.kind(), "request failed, skipping bandit update");
                Err(err)
            }
        }
    }

    /// Registers promoted genomes as live arms.
    pub async fn adopt(&self, genomes: &[Genome]) {
        let mut catalog = self.catalog.write().await;
        for genome in genomes {
            let id = genome.id().to_string();
            self.bandit.register(&id).await;
            catalog.insert(id, genome.clone());
        }
    }

    /// Consumes promotion events from the improvement daemon until the
    /// channel closes.
    pub fn watch_promotions(
        self: Arc<Self>,
        mut events: tokio::sync::broadcast::Receiver<PromotionEvent>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                info!(
                    run_id = %event.run_id,
                    best_score = event.best_score,
                    adopted = event.top.len(),
                    "adopting promoted genomes"
                );
                self.adopt(&event.top).await;
            }
        })
    }

    /// Cold start: with no registered arms, the configured baseline genome
    /// joins with the uniform prior.
    async fn ensure_cold_start(&self) {
        if self.bandit.arm_count().await == 0 {
            info!("cold start: registering baseline genome");
            self.adopt(&[self.baseline.clone()]).await;
        }
    }

    pub async fn catalog_len(&self) -> usize {
        self.catalog.read().await.len()
    }
}
