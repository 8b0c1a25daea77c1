//! Prometheus metrics sink.
//!
//! All collectors are registered against a crate-local [`Registry`] so the
//! sink carries no global default-registry state and tests can gather
//! deterministically. Consumers record through the helper functions; the
//! HTTP façade exports via [`export`]. No UI coupling.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{
    exponential_buckets, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every Kestrel collector.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Total RAG queries accepted (cache hits included).
pub static RAG_QUERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("rag_queries_total", "Total RAG queries served")
        .expect("valid rag_queries_total opts");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register rag_queries_total");
    counter
});

/// RAG queries answered from the result cache.
pub static RAG_CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new("rag_cache_hits_total", "RAG queries answered from cache")
        .expect("valid rag_cache_hits_total opts");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register rag_cache_hits_total");
    counter
});

/// Bandit reward updates, segmented by genome.
pub static BANDIT_UPDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("bandit_updates_total", "Bandit reward updates"),
        &["genome_id"],
    )
    .expect("valid bandit_updates_total opts");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register bandit_updates_total");
    counter
});

/// Executor failures segmented by error kind.
pub static EXECUTOR_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("executor_failures_total", "Executor failures by kind"),
        &["kind"],
    )
    .expect("valid executor_failures_total opts");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register executor_failures_total");
    counter
});

/// Posterior mean per bandit arm.
pub static BANDIT_EXPECTED_VALUE: Lazy<GaugeVec> = Lazy::new(|| {
    let gauge = GaugeVec::new(
        Opts::new("bandit_expected_value", "Posterior mean alpha/(alpha+beta) per arm"),
        &["genome_id"],
    )
    .expect("valid bandit_expected_value opts");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("register bandit_expected_value");
    gauge
});

/// Best score of the most recent optimize generation.
pub static POPULATION_BEST_SCORE: Lazy<Gauge> = Lazy::new(|| {
    let gauge = Gauge::new("population_best_score", "Best fitness in the current population")
        .expect("valid population_best_score opts");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("register population_best_score");
    gauge
});

/// End-to-end RAG query latency.
pub static RAG_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new("rag_latency_ms", "RAG query latency in milliseconds")
            .buckets(exponential_buckets(1.0, 2.0, 14).expect("valid rag latency buckets")),
    )
    .expect("valid rag_latency_ms opts");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("register rag_latency_ms");
    histogram
});

/// Executor wall-clock latency (generation plus repairs).
pub static EXECUTOR_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new("executor_latency_ms", "Executor latency in milliseconds")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid executor latency buckets")),
    )
    .expect("valid executor_latency_ms opts");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("register executor_latency_ms");
    histogram
});

/// Records one served RAG query.
pub fn record_rag_query(latency_ms: u64, cache_hit: bool) {
    RAG_QUERIES_TOTAL.inc();
    if cache_hit {
        RAG_CACHE_HITS_TOTAL.inc();
    }
    RAG_LATENCY_MS.observe(latency_ms as f64);
}

/// Records one bandit update and the arm's refreshed posterior mean.
pub fn record_bandit_update(genome_id: &str, expected_value: f64) {
    BANDIT_UPDATES_TOTAL.with_label_values(&[genome_id]).inc();
    BANDIT_EXPECTED_VALUE
        .with_label_values(&[genome_id])
        .set(expected_value);
}

/// Records an executor failure by error kind.
pub fn record_executor_failure(kind: &str) {
    EXECUTOR_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

/// Records executor wall-clock latency.
pub fn record_executor_latency(latency_ms: u64) {
    EXECUTOR_LATENCY_MS.observe(latency_ms as f64);
}

/// Publishes the best score of the latest generation.
pub fn set_population_best(score: f64) {
    POPULATION_BEST_SCORE.set(score);
}

/// Serializes every collector in the Prometheus text format.
pub fn export() -> Result<String> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .context("failed to encode metrics")?;
    String::from_utf8(buffer).context("metrics buffer was not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_counters_show_up_in_export() {
        record_rag_query(12, true);
        record_rag_query(40, false);
        record_executor_failure("GeneratorUnavailable");
        record_bandit_update("genome-a", 0.75);
        set_population_best(0.9);

        let text = export().unwrap();
        assert!(text.contains("rag_queries_total"));
        assert!(text.contains("rag_cache_hits_total"));
        assert!(text.contains("executor_failures_total"));
        assert!(text.contains("bandit_expected_value"));
        assert!(text.contains("population_best_score"));
    }

    #[test]
    fn latency_histograms_accept_observations() {
        record_executor_latency(250);
        let text = export().unwrap();
        assert!(text.contains("executor_latency_ms"));
        assert!(text.contains("rag_latency_ms"));
    }
}
