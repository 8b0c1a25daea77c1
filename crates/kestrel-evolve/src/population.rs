//! The population loop: seed, evaluate, select, breed, repeat.
//!
//! Evaluation fans genome-example pairs out over a bounded worker pool; all
//! randomness stays on the loop task, so a fixed seed reproduces the run.

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use kestrel_config::{FitnessWeights, PopulationConfig};
use kestrel_core::{ExecutionMetrics, Genome, GoldenExample};
use kestrel_llm::{Executor, RubricRewriter};

use crate::fitness::{rank_cmp, score_examples, GenomeScore};
use crate::golden::load_golden_set;
use crate::history::{GenerationRecord, HistoryLog};
use crate::operators::{crossover, mutate, seed_population, tournament};
use crate::EvolveError;

/// Observable state of the optimize run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "generation", rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Loading,
    Evaluating(u32),
    Selecting(u32),
    Done,
    Error,
}

/// Result of one optimize run.
#[derive(Debug, Clone)]
pub struct OptimizeOutcome {
    pub run_id: String,
    pub best: Genome,
    pub best_score: f64,
    pub history: Vec<GenerationRecord>,
    /// Final evaluated generation, ranked best-first.
    pub top: Vec<Genome>,
}

pub struct PopulationLoop {
    executor: Arc<Executor>,
    rewriter: Option<Arc<RubricRewriter>>,
    weights: FitnessWeights,
    cfg: PopulationConfig,
    allow_list: Vec<String>,
    phase_tx: watch::Sender<RunPhase>,
    run_lock: Mutex<()>,
}

impl PopulationLoop {
    pub fn new(
        executor: Arc<Executor>,
        weights: FitnessWeights,
        cfg: PopulationConfig,
        allow_list: Vec<String>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(RunPhase::Idle);
        Self {
            executor,
            rewriter: None,
            weights,
            cfg,
            allow_list,
            phase_tx,
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_rewriter(mut self, rewriter: Arc<RubricRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Watchable run state for health reporting.
    pub fn phase(&self) -> watch::Receiver<RunPhase> {
        self.phase_tx.subscribe()
    }

    /// Explicit reset back to idle between runs.
    pub fn reset(&self) {
        self.phase_tx.send_replace(RunPhase::Idle);
    }

    /// Optional one-shot rubric rewrite applied to the base genome before
    /// the loop starts. Disabled means unchanged behavior.
    pub async fn prepare_base(&self, base: Genome, use_mipro: bool) -> Genome {
        if !use_mipro {
            return base;
        }
        let Some(rewriter) = &self.rewriter else {
            warn!("mipro requested but no rewriter configured");
            return base;
        };
        match rewriter.rewrite(base.rubric()).await {
            Ok(rubric) => Genome::new(
                rubric,
                base.cot(),
                base.temp(),
                base.max_tokens(),
                base.retriever_topk(),
                base.use_consensus(),
                base.model_key(),
            )
            .unwrap_or_else(|_| base.clone()),
            Err(err) => {
                warn!(error = %err, "mipro rewrite failed, keeping base rubric");
                base
            }
        }
    }

    /// Loads the golden set then runs the loop; the Loading state is
    /// observable while the file is read and validated.
    pub async fn run_from_file(
        &self,
        base: Genome,
        golden_path: &Path,
        generations: u32,
        seed: u64,
        history_dir: Option<&Path>,
    ) -> Result<OptimizeOutcome, EvolveError> {
        self.phase_tx.send_replace(RunPhase::Loading);
        let golden = match load_golden_set(golden_path) {
            Ok(golden) => golden,
            Err(err) => {
                self.phase_tx.send_replace(RunPhase::Error);
                return Err(err);
            }
        };
        self.run(base, &golden, generations, seed, history_dir).await
    }

    /// Runs the full loop over an already-loaded golden set.
    pub async fn run(
        &self,
        base: Genome,
        golden: &[GoldenExample],
        generations: u32,
        seed: u64,
        history_dir: Option<&Path>,
    ) -> Result<OptimizeOutcome, EvolveError> {
        let _guard = self.run_lock.lock().await;
        let result = self
            .run_inner(base, golden, generations, seed, history_dir)
            .await;
        self.phase_tx.send_replace(match result {
            Ok(_) => RunPhase::Done,
            Err(_) => RunPhase::Error,
        });
        result
    }

    async fn run_inner(
        &self,
        base: Genome,
        golden: &[GoldenExample],
        generations: u32,
        seed: u64,
        history_dir: Option<&Path>,
    ) -> Result<OptimizeOutcome, EvolveError> {
        if golden.is_empty() {
            return Err(EvolveError::GoldenSet("golden set is empty".into()));
        }
        if generations == 0 {
            return Err(EvolveError::Internal("generations must be >= 1".into()));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let run_id = Uuid::new_v4().to_string();
        let mut log = history_dir
            .map(|dir| HistoryLog::create(dir, &run_id))
            .transpose()?;

        let mut population = seed_population(&base, self.cfg.size, &self.allow_list, &mut rng)
            .map_err(|e| EvolveError::Internal(e.to_string()))?;

        let mut history: Vec<GenerationRecord> = Vec::new();
        let mut overall_best: Option<(Genome, f64)> = None;
        let mut final_ranked: Vec<Genome> = Vec::new();

        for gen in 0..generations {
            self.phase_tx.send_replace(RunPhase::Evaluating(gen));
            let scores = self.evaluate(&population, golden).await;

            let mut order: Vec<usize> = (0..population.len()).collect();
            order.sort_by(|&a, &b| rank_cmp(&scores[a], &scores[b]));

            let best_index = order[0];
            let best_score = scores[best_index].mean_fitness;
            let mean_score =
                scores.iter().map(|s| s.mean_fitness).sum::<f64>() / scores.len() as f64;

            let record = GenerationRecord {
                generation: gen,
                best_score,
                mean_score,
                best_genome_id: population[best_index].id().to_string(),
                timestamp: chrono::Utc::now(),
            };
            if let Some(log) = log.as_mut() {
                log.append(&record)?;
            }
            kestrel_metrics::set_population_best(best_score);
            info!(gen, best_score, mean_score, "generation evaluated");
            history.push(record);

            let improved = overall_best
                .as_ref()
                .map(|(_, score)| best_score > *score)
                .unwrap_or(true);
            if improved {
                overall_best = Some((population[best_index].clone(), best_score));
            }
            final_ranked = order.iter().map(|&i| population[i].clone()).collect();

            if best_score >= self.cfg.early_stop {
                info!(gen, best_score, "early stop threshold reached");
                break;
            }
            if gen + 1 == generations {
                break;
            }

            self.phase_tx.send_replace(RunPhase::Selecting(gen));
            population = self
                .breed(&population, &scores, gen + 1, &mut rng)
                .await?;
        }

        let (best, best_score) =
            overall_best.ok_or_else(|| EvolveError::Internal("no generation evaluated".into()))?;

        Ok(OptimizeOutcome {
            run_id,
            best,
            best_score,
            history,
            top: final_ranked,
        })
    }

    /// Evaluates every genome against every golden example on a bounded
    /// worker pool; aggregation order is fixed, so concurrency does not
    /// perturb determinism.
    async fn evaluate(
        &self,
        population: &[Genome],
        golden: &[GoldenExample],
    ) -> Vec<GenomeScore> {
        let mut tasks = Vec::with_capacity(population.len() * golden.len());
        for (genome_index, genome) in population.iter().enumerate() {
            for example in golden {
                tasks.push((genome_index, genome.clone(), example.to_spec()));
            }
        }

        let results: Vec<(usize, ExecutionMetrics)> = stream::iter(tasks)
            .map(|(genome_index, genome, spec)| {
                let executor = self.executor.clone();
                async move { (genome_index, executor.execute(&spec, &genome).await) }
            })
            .buffer_unordered(self.cfg.eval_workers)
            .collect()
            .await;

        let mut grouped: Vec<Vec<ExecutionMetrics>> = vec![Vec::new(); population.len()];
        for (genome_index, metrics) in results {
            grouped[genome_index].push(metrics);
        }

        grouped
            .iter()
            .enumerate()
            .map(|(index, metrics)| score_examples(metrics, &self.weights, index))
            .collect()
    }

    /// Elites survive unchanged; the remainder are bred by tournament
    /// parents, crossover with configured probability, then mutation.
    async fn breed(
        &self,
        population: &[Genome],
        scores: &[GenomeScore],
        child_generation: u32,
        rng: &mut StdRng,
    ) -> Result<Vec<Genome>, EvolveError> {
        let mut order: Vec<usize> = (0..population.len()).collect();
        order.sort_by(|&a, &b| rank_cmp(&scores[a], &scores[b]));

        let mut next: Vec<Genome> = order
            .iter()
            .take(self.cfg.elite())
            .map(|&i| population[i].clone())
            .collect();

        let internal = |e: kestrel_core::KestrelError| EvolveError::Internal(e.to_string());
        while next.len() < self.cfg.size {
            let p1 = tournament(population, scores, self.cfg.tournament(), rng).clone();
            let p2 = tournament(population, scores, self.cfg.tournament(), rng).clone();

            let child = if rng.gen_bool(self.cfg.p_crossover) {
                let crossed = crossover(&p1, &p2, rng, child_generation).map_err(internal)?;
                mutate(
                    &crossed,
                    &self.allow_list,
                    rng,
                    self.rewriter.as_deref(),
                    child_generation,
                )
                .await
                .map_err(internal)?
            } else {
                mutate(
                    &p1,
                    &self.allow_list,
                    rng,
                    self.rewriter.as_deref(),
                    child_generation,
                )
                .await
                .map_err(internal)?
            };
            next.push(child);
        }
        Ok(next)
    }
}
