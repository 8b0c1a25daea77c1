//! Reciprocal rank fusion across retrieval methods.

use crate::types::ScoredDoc;

/// Fuses ranked lists by `RRF(d) = Σ_m 1/(C + rank_m(d))` with 1-based
/// ranks. The output is sorted by fused score descending, ties broken by
/// doc_id ascending so the ordering is deterministic regardless of which
/// method produced a document first.
pub fn reciprocal_rank_fusion(ranked_lists: &[&[ScoredDoc]], c: f64) -> Vec<(String, f64)> {
    use std::collections::HashMap;

    let mut fused: HashMap<String, f64> = HashMap::new();
    for list in ranked_lists {
        for (index, hit) in list.iter().enumerate() {
            let rank = (index + 1) as f64;
            *fused.entry(hit.doc_id.clone()).or_insert(0.0) += 1.0 / (c + rank);
        }
    }

    let mut out: Vec<(String, f64)> = fused.into_iter().collect();
    out.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    out
}
