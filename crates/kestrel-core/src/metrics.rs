//! Structured result of one executor run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Everything the fitness aggregator and the router need to know about a
/// single execution. Downstream failures are expressed here rather than as
/// errors so the population loop stays deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    /// The generator produced parseable structured output where required.
    pub schema_ok: bool,
    /// Empty set means clean.
    pub safety_flags: BTreeSet<String>,
    /// Plug-in validator verdict in [0, 1].
    pub validator_score: f64,
    /// Intent-specific comparator verdict; absent when no reference output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub latency_ms: u64,
    pub tokens_total: u64,
    /// Count of schema repair attempts actually made.
    pub repairs: u32,
    pub cost_usd: f64,
}

impl ExecutionMetrics {
    /// Metrics for a run that never produced usable output (generator down,
    /// timeout, repair exhausted). Accuracy resolves to zero via
    /// [`ExecutionMetrics::effective_accuracy`].
    pub fn failure(latency_ms: u64, repairs: u32) -> Self {
        Self {
            schema_ok: false,
            safety_flags: BTreeSet::new(),
            validator_score: 0.0,
            accuracy: None,
            latency_ms,
            tokens_total: 0,
            repairs,
            cost_usd: 0.0,
        }
    }

    /// Accuracy with the documented absent-value rule: missing accuracy is
    /// treated as 1.0 iff the schema check passed.
    pub fn effective_accuracy(&self) -> f64 {
        match self.accuracy {
            Some(a) => a,
            None if self.schema_ok => 1.0,
            None => 0.0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.safety_flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_accuracy_defaults_by_schema() {
        let mut m = ExecutionMetrics::failure(10, 0);
        assert_eq!(m.effective_accuracy(), 0.0);

        m.schema_ok = true;
        assert_eq!(m.effective_accuracy(), 1.0);

        m.accuracy = Some(0.4);
        assert_eq!(m.effective_accuracy(), 0.4);
    }

    #[test]
    fn failure_metrics_are_marked_dirty() {
        let m = ExecutionMetrics::failure(1234, 2);
        assert!(!m.schema_ok);
        assert_eq!(m.latency_ms, 1234);
        assert_eq!(m.repairs, 2);
        assert!(m.is_clean());
    }
}
