//! kestrel-evolve - Population-based prompt optimization.
//!
//! A seeded population of genomes is evaluated against the golden set
//! through the executor, scored by the fitness aggregator, then bred with
//! tournament selection, uniform crossover and a small set of mutation
//! operators. Elites survive unchanged, so the best score never regresses.
//! The improvement daemon schedules runs and gates promotion of the results.

pub mod daemon;
pub mod fitness;
pub mod golden;
pub mod history;
pub mod operators;
pub mod population;

use thiserror::Error;

use kestrel_core::KestrelError;

pub use daemon::{ImprovementDaemon, PromotionEvent};
pub use fitness::{fitness, rank_cmp, score_examples, GenomeScore};
pub use golden::load_golden_set;
pub use history::{read_history, GenerationRecord, HistoryLog};
pub use population::{OptimizeOutcome, PopulationLoop, RunPhase};

/// Optimizer-side failures.
#[derive(Debug, Error)]
pub enum EvolveError {
    #[error("golden set invalid: {0}")]
    GoldenSet(String),

    #[error("history log: {0}")]
    History(String),

    #[error("{0}")]
    Internal(String),
}

impl From<EvolveError> for KestrelError {
    fn from(err: EvolveError) -> Self {
        match err {
            EvolveError::GoldenSet(msg) => KestrelError::GoldenSetInvalid(msg),
            EvolveError::History(msg) | EvolveError::Internal(msg) => KestrelError::Internal(msg),
        }
    }
}
