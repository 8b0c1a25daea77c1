//! Improvement daemon: scheduled offline optimize runs with a promotion
//! gate. The gate only emits events; consumers decide whether to act.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use kestrel_config::DaemonConfig;
use kestrel_core::Genome;

use crate::population::{OptimizeOutcome, PopulationLoop};
use crate::EvolveError;

/// Emitted when a freshly optimized population clears the promotion gate.
#[derive(Debug, Clone)]
pub struct PromotionEvent {
    pub run_id: String,
    pub best_score: f64,
    pub previous_best: f64,
    /// Top genomes of the run, best first.
    pub top: Vec<Genome>,
}

/// Gate rule: promote iff the new best improves on the live best by at
/// least delta.
pub fn should_promote(live_best: f64, new_best: f64, delta: f64) -> bool {
    new_best >= live_best + delta
}

pub struct ImprovementDaemon {
    population_loop: Arc<PopulationLoop>,
    base: Genome,
    golden_path: PathBuf,
    history_dir: PathBuf,
    cfg: DaemonConfig,
    live_best: StdMutex<f64>,
    events: broadcast::Sender<PromotionEvent>,
}

impl ImprovementDaemon {
    pub fn new(
        population_loop: Arc<PopulationLoop>,
        base: Genome,
        golden_path: PathBuf,
        history_dir: PathBuf,
        cfg: DaemonConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            population_loop,
            base,
            golden_path,
            history_dir,
            cfg,
            live_best: StdMutex::new(0.0),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PromotionEvent> {
        self.events.subscribe()
    }

    pub fn live_best(&self) -> f64 {
        *self.live_best.lock().expect("live_best mutex poisoned")
    }

    /// Seeds the live best score, e.g. from a previous deployment.
    pub fn set_live_best(&self, score: f64) {
        *self.live_best.lock().expect("live_best mutex poisoned") = score;
    }

    /// One optimize run followed by the promotion gate.
    pub async fn run_once(
        &self,
        generations: u32,
        seed: u64,
    ) -> Result<OptimizeOutcome, EvolveError> {
        let outcome = self
            .population_loop
            .run_from_file(
                self.base.clone(),
                &self.golden_path,
                generations,
                seed,
                Some(&self.history_dir),
            )
            .await?;

        let live = self.live_best();
        if should_promote(live, outcome.best_score, self.cfg.promotion_delta) {
            let event = PromotionEvent {
                run_id: outcome.run_id.clone(),
                best_score: outcome.best_score,
                previous_best: live,
                top: outcome.top.iter().take(self.cfg.top_n).cloned().collect(),
            };
            info!(
                best_score = outcome.best_score,
                previous_best = live,
                promoted = event.top.len(),
                "promotion gate passed"
            );
            self.set_live_best(outcome.best_score);
            // No subscribers is fine; the gate only emits.
            let _ = self.events.send(event);
        } else {
            info!(
                best_score = outcome.best_score,
                previous_best = live,
                delta = self.cfg.promotion_delta,
                "promotion gate held"
            );
        }
        Ok(outcome)
    }

    /// Spawns the schedule loop. Each tick runs with a fresh random seed;
    /// failures are logged and the schedule continues.
    pub fn spawn(self: Arc<Self>, generations: u32) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.cfg.interval_s.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so the schedule
            // starts one interval after boot.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let seed = rand::random::<u64>();
                if let Err(err) = self.run_once(generations, seed).await {
                    warn!(error = %err, "scheduled optimize run failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_config::{ExecutorConfig, FitnessWeights, PopulationConfig};
    use kestrel_core::Intent;
    use kestrel_llm::{ConstValidator, Executor, GenerationOutput, MockGenerator};
    use std::io::Write;

    #[test]
    fn gate_requires_the_full_delta() {
        assert!(!should_promote(0.80, 0.84, 0.05));
        assert!(should_promote(0.80, 0.86, 0.05));
        assert!(should_promote(0.80, 0.85, 0.05));
    }

    fn daemon_with_perfect_generator(dir: &std::path::Path) -> ImprovementDaemon {
        let golden_path = dir.join("golden_set.json");
        let mut file = std::fs::File::create(&golden_path).unwrap();
        write!(
            file,
            r#"[{{"prompt": "what is 2+2?", "intent": "qa", "expected": "4"}}]"#
        )
        .unwrap();

        let generator = Arc::new(MockGenerator::with_handler(|req| {
            Ok(GenerationOutput::from_text(&req.prompt, "4"))
        }));
        let executor = Arc::new(
            Executor::new(generator, ExecutorConfig::default())
                .with_validator(Arc::new(ConstValidator(1.0))),
        );
        let population_loop = Arc::new(PopulationLoop::new(
            executor,
            FitnessWeights {
                w_lat: 0.0,
                w_tok: 0.0,
                ..FitnessWeights::default()
            },
            PopulationConfig {
                size: 4,
                eval_workers: 4,
                ..PopulationConfig::default()
            },
            vec!["phi-local".into()],
        ));
        let base = Genome::new("Answer.", false, 0.3, 128, 0, false, "phi-local").unwrap();

        ImprovementDaemon::new(
            population_loop,
            base,
            golden_path,
            dir.join("history"),
            DaemonConfig {
                top_n: 2,
                ..DaemonConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn promotion_event_carries_top_genomes() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_with_perfect_generator(dir.path());
        let mut events = daemon.subscribe();

        let outcome = daemon.run_once(1, 42).await.unwrap();
        assert!(outcome.best_score > 0.9);

        let event = events.try_recv().unwrap();
        assert_eq!(event.best_score, outcome.best_score);
        assert_eq!(event.previous_best, 0.0);
        assert_eq!(event.top.len(), 2);
        assert_eq!(daemon.live_best(), outcome.best_score);
    }

    #[tokio::test]
    async fn gate_holds_when_improvement_is_too_small() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = daemon_with_perfect_generator(dir.path());
        let mut events = daemon.subscribe();

        // Live best is already near the score this stub can reach.
        daemon.set_live_best(0.97);
        let outcome = daemon.run_once(1, 42).await.unwrap();
        assert!(outcome.best_score < 0.97 + 0.05);

        assert!(events.try_recv().is_err());
        assert_eq!(daemon.live_best(), 0.97);
    }
}
