//! Genome value type: prompt rubric + generation hyperparameters + model
//! choice, content-addressed so identical configurations share an id across
//! processes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{KestrelError, Result};

/// Temperature bounds accepted by the generator contract.
pub const TEMP_RANGE: (f64, f64) = (0.0, 2.0);
/// Upper bound on requested completion tokens.
pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 8192);
/// Upper bound on retrieval fan-in; zero disables retrieval entirely.
pub const RETRIEVER_TOPK_MAX: u32 = 50;

/// Stable, content-addressed genome identity (hex SHA-256 of the canonical
/// field serialization; `generation` is excluded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GenomeId(String);

impl GenomeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable bundle of prompt rubric + generation hyperparameters + model
/// choice. Constructed once, never mutated; derived copies go through
/// [`Genome::with_generation`] or the genetic operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genome {
    rubric: String,
    cot: bool,
    temp: f64,
    max_tokens: u32,
    retriever_topk: u32,
    use_consensus: bool,
    model_key: String,
    #[serde(default)]
    generation: u32,
}

impl Genome {
    /// Builds a genome, enforcing the documented value ranges.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rubric: impl Into<String>,
        cot: bool,
        temp: f64,
        max_tokens: u32,
        retriever_topk: u32,
        use_consensus: bool,
        model_key: impl Into<String>,
    ) -> Result<Self> {
        let genome = Self {
            rubric: rubric.into(),
            cot,
            temp,
            max_tokens,
            retriever_topk,
            use_consensus,
            model_key: model_key.into(),
            generation: 0,
        };
        genome.validate()?;
        Ok(genome)
    }

    /// Range checks for genomes that arrived through deserialization.
    pub fn validate(&self) -> Result<()> {
        if !(TEMP_RANGE.0..=TEMP_RANGE.1).contains(&self.temp) || !self.temp.is_finite() {
            return Err(KestrelError::InvalidInput(format!(
                "temperature {} outside [{}, {}]",
                self.temp, TEMP_RANGE.0, TEMP_RANGE.1
            )));
        }
        if !(MAX_TOKENS_RANGE.0..=MAX_TOKENS_RANGE.1).contains(&self.max_tokens) {
            return Err(KestrelError::InvalidInput(format!(
                "max_tokens {} outside [{}, {}]",
                self.max_tokens, MAX_TOKENS_RANGE.0, MAX_TOKENS_RANGE.1
            )));
        }
        if self.retriever_topk > RETRIEVER_TOPK_MAX {
            return Err(KestrelError::InvalidInput(format!(
                "retriever_topk {} exceeds {}",
                self.retriever_topk, RETRIEVER_TOPK_MAX
            )));
        }
        if self.model_key.trim().is_empty() {
            return Err(KestrelError::InvalidInput("model_key must not be empty".into()));
        }
        Ok(())
    }

    pub fn rubric(&self) -> &str {
        &self.rubric
    }

    pub fn cot(&self) -> bool {
        self.cot
    }

    pub fn temp(&self) -> f64 {
        self.temp
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn retriever_topk(&self) -> u32 {
        self.retriever_topk
    }

    pub fn use_consensus(&self) -> bool {
        self.use_consensus
    }

    pub fn model_key(&self) -> &str {
        &self.model_key
    }

    /// Bookkeeping only; two genomes differing solely in `generation` are
    /// equal and share an id.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Returns a copy stamped with the given generation number. Identity is
    /// unaffected.
    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    /// Canonical serialization: identity fields in fixed order, temperature
    /// normalized to six decimal places so float formatting cannot fork ids.
    fn canonical(&self) -> String {
        format!(
            "rubric={}\u{1}cot={}\u{1}temp={:.6}\u{1}max_tokens={}\u{1}retriever_topk={}\u{1}use_consensus={}\u{1}model_key={}",
            self.rubric,
            self.cot,
            self.temp,
            self.max_tokens,
            self.retriever_topk,
            self.use_consensus,
            self.model_key,
        )
    }

    /// Content-addressed identity, reproducible across processes.
    pub fn id(&self) -> GenomeId {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        GenomeId(format!("{:x}", hasher.finalize()))
    }
}

impl PartialEq for Genome {
    fn eq(&self, other: &Self) -> bool {
        self.rubric == other.rubric
            && self.cot == other.cot
            && self.temp == other.temp
            && self.max_tokens == other.max_tokens
            && self.retriever_topk == other.retriever_topk
            && self.use_consensus == other.use_consensus
            && self.model_key == other.model_key
    }
}

impl Eq for Genome {}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Genome {
        Genome::new("Answer concisely.", true, 0.7, 512, 5, false, "phi-local").unwrap()
    }

    #[test]
    fn generation_is_not_identity() {
        let a = sample();
        let b = sample().with_generation(7);
        assert_eq!(a, b);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn distinct_fields_fork_the_id() {
        let a = sample();
        let b = Genome::new("Answer concisely.", true, 0.8, 512, 5, false, "phi-local").unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn range_violations_are_rejected() {
        assert!(Genome::new("r", false, 2.5, 512, 5, false, "m").is_err());
        assert!(Genome::new("r", false, 0.5, 0, 5, false, "m").is_err());
        assert!(Genome::new("r", false, 0.5, 9000, 5, false, "m").is_err());
        assert!(Genome::new("r", false, 0.5, 512, 51, false, "m").is_err());
        assert!(Genome::new("r", false, 0.5, 512, 5, false, "  ").is_err());
    }

    #[test]
    fn json_round_trip_is_identity() {
        let a = sample().with_generation(3);
        let json = serde_json::to_string(&a).unwrap();
        let b: Genome = serde_json::from_str(&json).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.generation(), b.generation());
        assert_eq!(a.id(), b.id());
    }

    proptest! {
        #[test]
        fn id_survives_serialization(
            rubric in ".{0,120}",
            cot in any::<bool>(),
            temp in 0.0f64..=2.0,
            max_tokens in 1u32..=8192,
            topk in 0u32..=50,
            consensus in any::<bool>(),
        ) {
            let g = Genome::new(rubric, cot, temp, max_tokens, topk, consensus, "stub-model").unwrap();
            let round: Genome = serde_json::from_str(&serde_json::to_string(&g).unwrap()).unwrap();
            prop_assert_eq!(g.id(), round.id());
        }
    }
}
