//! Cross-encoder rerank plug-in.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::embed::tokenize;
use crate::types::RetrievalError;

/// Scores `(query, text)` pairs; higher is more relevant. Scores are real
/// numbers on an arbitrary scale, only ordered within one call.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, RetrievalError>;
}

/// Token-overlap cross-encoder stand-in: harmonic mean of query and
/// document term coverage. Deterministic and cheap; a learned cross-encoder
/// drops in behind the same trait.
pub struct OverlapReranker;

#[async_trait]
impl Reranker for OverlapReranker {
    async fn rerank(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, RetrievalError> {
        let query_terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        Ok(texts
            .iter()
            .map(|text| {
                if query_terms.is_empty() {
                    return 0.0;
                }
                let doc_terms: BTreeSet<String> = tokenize(text).into_iter().collect();
                if doc_terms.is_empty() {
                    return 0.0;
                }
                let overlap = query_terms.intersection(&doc_terms).count() as f32;
                let precision = overlap / doc_terms.len() as f32;
                let recall = overlap / query_terms.len() as f32;
                if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                }
            })
            .collect())
    }
}

/// Pass-through reranker scoring every candidate equally, which leaves the
/// fused ordering untouched. Used in tests and when reranking is disabled.
pub struct IdentityReranker;

#[async_trait]
impl Reranker for IdentityReranker {
    async fn rerank(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>, RetrievalError> {
        Ok(vec![0.0; texts.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overlap_scores_relevant_text_higher() {
        let reranker = OverlapReranker;
        let scores = reranker
            .rerank(
                "bandit reward update",
                &[
                    "the bandit applies a reward update per pull".to_string(),
                    "completely unrelated cooking instructions".to_string(),
                ],
            )
            .await
            .unwrap();
        assert!(scores[0] > scores[1]);
    }

    #[tokio::test]
    async fn identity_scores_everything_equally() {
        let reranker = IdentityReranker;
        let scores = reranker
            .rerank("q", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(scores, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn empty_query_scores_zero() {
        let reranker = OverlapReranker;
        let scores = reranker.rerank("", &["text".to_string()]).await.unwrap();
        assert_eq!(scores, vec![0.0]);
    }
}
