//! Genetic operators: seeding, mutation, crossover, tournament selection.
//!
//! All randomness flows through the caller's seeded RNG so optimize runs
//! are reproducible. The one LLM-backed operator (`rewrite_rubric`) caches
//! by input hash inside the rewriter.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use kestrel_core::{genome::MAX_TOKENS_RANGE, genome::TEMP_RANGE, Genome, Result};
use kestrel_llm::RubricRewriter;

use crate::fitness::{rank_cmp, GenomeScore};

const TEMP_JITTER_SIGMA: f64 = 0.15;
const TOKEN_RESIZE_RANGE: (f64, f64) = (0.75, 1.25);
const SEED_FLIP_PROBABILITY: f64 = 0.3;

fn clamp_temp(temp: f64) -> f64 {
    temp.clamp(TEMP_RANGE.0, TEMP_RANGE.1)
}

fn clamp_tokens(tokens: f64) -> u32 {
    (tokens.round() as i64).clamp(MAX_TOKENS_RANGE.0 as i64, MAX_TOKENS_RANGE.1 as i64) as u32
}

#[allow(clippy::too_many_arguments)]
fn build(
    rubric: &str,
    cot: bool,
    temp: f64,
    max_tokens: u32,
    retriever_topk: u32,
    use_consensus: bool,
    model_key: &str,
    generation: u32,
) -> Result<Genome> {
    Ok(Genome::new(
        rubric,
        cot,
        clamp_temp(temp),
        max_tokens,
        retriever_topk,
        use_consensus,
        model_key,
    )?
    .with_generation(generation))
}

/// Produces `size` diverse genomes from a base by perturbing each field
/// independently. The first seed is the base verbatim.
pub fn seed_population(
    base: &Genome,
    size: usize,
    allow_list: &[String],
    rng: &mut StdRng,
) -> Result<Vec<Genome>> {
    let jitter = Normal::new(0.0, TEMP_JITTER_SIGMA)
        .map_err(|e| kestrel_core::KestrelError::Internal(e.to_string()))?;

    let mut population = Vec::with_capacity(size);
    population.push(base.clone().with_generation(0));

    for i in 1..size {
        let temp = base.temp() + jitter.sample(rng);
        let tokens = base.max_tokens() as f64
            * rng.gen_range(TOKEN_RESIZE_RANGE.0..=TOKEN_RESIZE_RANGE.1);
        let cot = if rng.gen_bool(SEED_FLIP_PROBABILITY) {
            !base.cot()
        } else {
            base.cot()
        };
        let use_consensus = if rng.gen_bool(SEED_FLIP_PROBABILITY) {
            !base.use_consensus()
        } else {
            base.use_consensus()
        };
        let model_key = &allow_list[i % allow_list.len()];

        population.push(build(
            base.rubric(),
            cot,
            temp,
            clamp_tokens(tokens),
            base.retriever_topk(),
            use_consensus,
            model_key,
            0,
        )?);
    }
    Ok(population)
}

/// Applies one mutation operator chosen uniformly at random.
pub async fn mutate(
    genome: &Genome,
    allow_list: &[String],
    rng: &mut StdRng,
    rewriter: Option<&RubricRewriter>,
    generation: u32,
) -> Result<Genome> {
    // Operators: toggle_cot, adjust_temperature, change_model,
    // resize_tokens, rewrite_rubric.
    let operator = rng.gen_range(0..5u8);
    match operator {
        0 => build(
            genome.rubric(),
            !genome.cot(),
            genome.temp(),
            genome.max_tokens(),
            genome.retriever_topk(),
            genome.use_consensus(),
            genome.model_key(),
            generation,
        ),
        1 => {
            let jitter = Normal::new(0.0, TEMP_JITTER_SIGMA)
                .map_err(|e| kestrel_core::KestrelError::Internal(e.to_string()))?;
            build(
                genome.rubric(),
                genome.cot(),
                genome.temp() + jitter.sample(rng),
                genome.max_tokens(),
                genome.retriever_topk(),
                genome.use_consensus(),
                genome.model_key(),
                generation,
            )
        }
        2 => {
            let alternatives: Vec<&String> = allow_list
                .iter()
                .filter(|m| m.as_str() != genome.model_key())
                .collect();
            let model_key = alternatives
                .choose(rng)
                .map(|m| m.as_str())
                .unwrap_or_else(|| genome.model_key());
            build(
                genome.rubric(),
                genome.cot(),
                genome.temp(),
                genome.max_tokens(),
                genome.retriever_topk(),
                genome.use_consensus(),
                model_key,
                generation,
            )
        }
        3 => {
            let factor = rng.gen_range(TOKEN_RESIZE_RANGE.0..=TOKEN_RESIZE_RANGE.1);
            build(
                genome.rubric(),
                genome.cot(),
                genome.temp(),
                clamp_tokens(genome.max_tokens() as f64 * factor),
                genome.retriever_topk(),
                genome.use_consensus(),
                genome.model_key(),
                generation,
            )
        }
        _ => {
            let rubric = match rewriter {
                Some(rewriter) => match rewriter.rewrite(genome.rubric()).await {
                    Ok(rewritten) => rewritten,
                    Err(err) => {
                        warn!(error = %err, "rubric rewrite failed, keeping rubric");
                        genome.rubric().to_string()
                    }
                },
                None => genome.rubric().to_string(),
            };
            build(
                &rubric,
                genome.cot(),
                genome.temp(),
                genome.max_tokens(),
                genome.retriever_topk(),
                genome.use_consensus(),
                genome.model_key(),
                generation,
            )
        }
    }
}

/// Uniform per-field crossover; numeric fields may take the arithmetic
/// mean of the parents.
pub fn crossover(p1: &Genome, p2: &Genome, rng: &mut StdRng, generation: u32) -> Result<Genome> {
    let rubric = if rng.gen_bool(0.5) { p1.rubric() } else { p2.rubric() };
    let cot = if rng.gen_bool(0.5) { p1.cot() } else { p2.cot() };
    let use_consensus = if rng.gen_bool(0.5) {
        p1.use_consensus()
    } else {
        p2.use_consensus()
    };
    let model_key = if rng.gen_bool(0.5) {
        p1.model_key()
    } else {
        p2.model_key()
    };
    let retriever_topk = if rng.gen_bool(0.5) {
        p1.retriever_topk()
    } else {
        p2.retriever_topk()
    };

    let temp = match rng.gen_range(0..3u8) {
        0 => p1.temp(),
        1 => p2.temp(),
        _ => (p1.temp() + p2.temp()) / 2.0,
    };
    let max_tokens = match rng.gen_range(0..3u8) {
        0 => p1.max_tokens(),
        1 => p2.max_tokens(),
        _ => clamp_tokens((p1.max_tokens() as f64 + p2.max_tokens() as f64) / 2.0),
    };

    build(
        rubric,
        cot,
        temp,
        max_tokens,
        retriever_topk,
        use_consensus,
        model_key,
        generation,
    )
}

/// Tournament of `t` distinct entrants; the winner is the best by the
/// fitness ranking (ties resolved by the aggregator's rules).
pub fn tournament<'a>(
    population: &'a [Genome],
    scores: &[GenomeScore],
    t: usize,
    rng: &mut StdRng,
) -> &'a Genome {
    let t = t.clamp(1, population.len());
    let entrants = rand::seq::index::sample(rng, population.len(), t);
    let winner = entrants
        .iter()
        .min_by(|&a, &b| rank_cmp(&scores[a], &scores[b]))
        .expect("tournament has at least one entrant");
    &population[winner]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn base() -> Genome {
        Genome::new("Answer well.", false, 0.7, 512, 3, false, "phi-local").unwrap()
    }

    fn allow_list() -> Vec<String> {
        vec!["phi-local".into(), "mistral-local".into(), "qwen-local".into()]
    }

    #[test]
    fn seeding_keeps_one_verbatim_copy_and_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let population = seed_population(&base(), 12, &allow_list(), &mut rng).unwrap();

        assert_eq!(population.len(), 12);
        assert_eq!(population[0], base());
        for genome in &population {
            assert!(genome.validate().is_ok());
            assert!((0.0..=2.0).contains(&genome.temp()));
        }
        // Model keys cycle through the allow-list.
        assert!(population.iter().any(|g| g.model_key() == "mistral-local"));
    }

    #[test]
    fn seeding_is_deterministic_under_a_fixed_seed() {
        let mut rng1 = StdRng::seed_from_u64(7);
        let mut rng2 = StdRng::seed_from_u64(7);
        let a = seed_population(&base(), 8, &allow_list(), &mut rng1).unwrap();
        let b = seed_population(&base(), 8, &allow_list(), &mut rng2).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mutation_changes_at_most_one_field_class() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let child = mutate(&base(), &allow_list(), &mut rng, None, 1).await.unwrap();
            assert!(child.validate().is_ok());
            assert_eq!(child.generation(), 1);

            let parent = base();
            let mut changed = 0;
            if child.cot() != parent.cot() {
                changed += 1;
            }
            if child.temp() != parent.temp() {
                changed += 1;
            }
            if child.model_key() != parent.model_key() {
                changed += 1;
            }
            if child.max_tokens() != parent.max_tokens() {
                changed += 1;
            }
            if child.rubric() != parent.rubric() {
                changed += 1;
            }
            assert!(changed <= 1);
        }
    }

    #[test]
    fn crossover_only_mixes_parent_material() {
        let mut rng = StdRng::seed_from_u64(11);
        let p1 = base();
        let p2 = Genome::new("Be terse.", true, 1.3, 1024, 8, true, "qwen-local").unwrap();

        for _ in 0..50 {
            let child = crossover(&p1, &p2, &mut rng, 2).unwrap();
            assert!(child.rubric() == p1.rubric() || child.rubric() == p2.rubric());
            let mean_temp = (p1.temp() + p2.temp()) / 2.0;
            assert!(
                child.temp() == p1.temp() || child.temp() == p2.temp() || child.temp() == mean_temp
            );
            assert!(
                child.model_key() == p1.model_key() || child.model_key() == p2.model_key()
            );
        }
    }

    #[test]
    fn tournament_prefers_higher_fitness() {
        let mut rng = StdRng::seed_from_u64(5);
        let population: Vec<Genome> = (0..4)
            .map(|i| {
                Genome::new(format!("rubric {i}"), false, 0.5, 256, 0, false, "phi-local").unwrap()
            })
            .collect();
        let scores: Vec<GenomeScore> = (0..4)
            .map(|i| GenomeScore {
                mean_fitness: i as f64 / 4.0,
                mean_latency_ms: 0.0,
                mean_cost_usd: 0.0,
                created_order: i,
            })
            .collect();

        // With the tournament spanning the whole population, the best genome
        // always wins.
        let winner = tournament(&population, &scores, 4, &mut rng);
        assert_eq!(winner.rubric(), "rubric 3");
    }
}
