//! Fitness aggregation: one scalar per execution, averaged across the
//! golden set to score a genome.

use std::cmp::Ordering;

use kestrel_config::FitnessWeights;
use kestrel_core::ExecutionMetrics;

/// Per-example fitness in [0, 1]:
///
/// ```text
/// ok      = schema_ok && no safety flags && validator >= 0.9 && accuracy >= 0.85
/// base    = 1.0 if ok else 0.0
/// penalty = w_lat*latency + w_tok*tokens + w_rep*repairs + w_cost*cost
/// fitness = max(0, base - penalty)
/// ```
pub fn fitness(metrics: &ExecutionMetrics, weights: &FitnessWeights) -> f64 {
    let ok = metrics.schema_ok
        && metrics.is_clean()
        && metrics.validator_score >= 0.9
        && metrics.effective_accuracy() >= 0.85;
    let base = if ok { 1.0 } else { 0.0 };

    let penalty = weights.w_lat * metrics.latency_ms as f64
        + weights.w_tok * metrics.tokens_total as f64
        + weights.w_rep * metrics.repairs as f64
        + weights.w_cost * metrics.cost_usd;

    (base - penalty).max(0.0)
}

/// Aggregate score of one genome across the golden set, plus the resource
/// means used for tie-breaking.
#[derive(Debug, Clone, PartialEq)]
pub struct GenomeScore {
    pub mean_fitness: f64,
    pub mean_latency_ms: f64,
    pub mean_cost_usd: f64,
    /// Position in the population, used as the creation-order tie-break.
    pub created_order: usize,
}

/// Averages per-example metrics into one [`GenomeScore`].
pub fn score_examples(
    per_example: &[ExecutionMetrics],
    weights: &FitnessWeights,
    created_order: usize,
) -> GenomeScore {
    let n = per_example.len().max(1) as f64;
    GenomeScore {
        mean_fitness: per_example.iter().map(|m| fitness(m, weights)).sum::<f64>() / n,
        mean_latency_ms: per_example.iter().map(|m| m.latency_ms as f64).sum::<f64>() / n,
        mean_cost_usd: per_example.iter().map(|m| m.cost_usd).sum::<f64>() / n,
        created_order,
    }
}

/// Best-first ordering: higher fitness, then lower mean latency, then lower
/// mean cost, then earliest creation.
pub fn rank_cmp(a: &GenomeScore, b: &GenomeScore) -> Ordering {
    b.mean_fitness
        .partial_cmp(&a.mean_fitness)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.mean_latency_ms
                .partial_cmp(&b.mean_latency_ms)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| {
            a.mean_cost_usd
                .partial_cmp(&b.mean_cost_usd)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.created_order.cmp(&b.created_order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn clean_metrics() -> ExecutionMetrics {
        ExecutionMetrics {
            schema_ok: true,
            safety_flags: BTreeSet::new(),
            validator_score: 1.0,
            accuracy: Some(1.0),
            latency_ms: 0,
            tokens_total: 0,
            repairs: 0,
            cost_usd: 0.0,
        }
    }

    #[test]
    fn perfect_run_scores_one() {
        assert_eq!(fitness(&clean_metrics(), &FitnessWeights::default()), 1.0);
    }

    #[test]
    fn any_gate_failure_zeroes_the_base() {
        let weights = FitnessWeights::default();

        let mut m = clean_metrics();
        m.schema_ok = false;
        assert_eq!(fitness(&m, &weights), 0.0);

        let mut m = clean_metrics();
        m.safety_flags.insert("pii_email".into());
        assert_eq!(fitness(&m, &weights), 0.0);

        let mut m = clean_metrics();
        m.validator_score = 0.89;
        assert_eq!(fitness(&m, &weights), 0.0);

        let mut m = clean_metrics();
        m.accuracy = Some(0.8);
        assert_eq!(fitness(&m, &weights), 0.0);
    }

    #[test]
    fn penalties_reduce_but_never_go_negative() {
        let weights = FitnessWeights::default();

        let mut m = clean_metrics();
        m.latency_ms = 100;
        m.tokens_total = 200;
        m.repairs = 1;
        let expected = 1.0 - (0.001 * 100.0 + 5e-4 * 200.0 + 0.2);
        assert!((fitness(&m, &weights) - expected).abs() < 1e-12);

        m.latency_ms = 10_000;
        assert_eq!(fitness(&m, &weights), 0.0);
    }

    #[test]
    fn fitness_stays_in_unit_interval() {
        let weights = FitnessWeights::default();
        for latency in [0u64, 1, 50, 500, 100_000] {
            let mut m = clean_metrics();
            m.latency_ms = latency;
            let f = fitness(&m, &weights);
            assert!((0.0..=1.0).contains(&f));
        }
    }

    #[test]
    fn ranking_breaks_ties_by_latency_cost_then_creation() {
        let a = GenomeScore {
            mean_fitness: 0.9,
            mean_latency_ms: 100.0,
            mean_cost_usd: 0.1,
            created_order: 1,
        };
        let faster = GenomeScore {
            mean_latency_ms: 50.0,
            ..a.clone()
        };
        assert_eq!(rank_cmp(&faster, &a), Ordering::Less);

        let cheaper = GenomeScore {
            mean_cost_usd: 0.05,
            ..a.clone()
        };
        assert_eq!(rank_cmp(&cheaper, &a), Ordering::Less);

        let earlier = GenomeScore {
            created_order: 0,
            ..a.clone()
        };
        assert_eq!(rank_cmp(&earlier, &a), Ordering::Less);

        let fitter = GenomeScore {
            mean_fitness: 0.95,
            ..a.clone()
        };
        assert_eq!(rank_cmp(&fitter, &a), Ordering::Less);
    }
}
