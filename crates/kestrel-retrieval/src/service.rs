//! RAG service facade: cache-fronted hybrid retrieval with bounded
//! concurrency and aggregate metrics.

use std::sync::Mutex as StdMutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::cache::{cache_key, QueryCache};
use crate::hybrid::HybridRetriever;
use crate::types::{Filters, RetrievalError, RetrievalMethod, RetrievedDocument};

/// Response for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<RetrievedDocument>,
    pub latency_ms: u64,
    pub cache_hit: bool,
}

/// Aggregate service metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagMetrics {
    pub cache_hit_ratio: f64,
    pub avg_latency_ms: f64,
    pub total_queries: u64,
    pub doc_count: usize,
}

#[derive(Default)]
struct Totals {
    queries: u64,
    cache_hits: u64,
    latency_sum_ms: u64,
}

pub struct RagService {
    retriever: HybridRetriever,
    cache: QueryCache,
    inflight: Semaphore,
    totals: StdMutex<Totals>,
}

impl RagService {
    pub fn new(retriever: HybridRetriever, cache: QueryCache, max_inflight: usize) -> Self {
        Self {
            retriever,
            cache,
            inflight: Semaphore::new(max_inflight),
            totals: StdMutex::new(Totals::default()),
        }
    }

    /// Serves one query through cache + single-flight + hybrid retrieval.
    /// Rejects immediately with `Overloaded` once the in-flight bound is hit.
    pub async fn query(
        &self,
        query: &str,
        k: usize,
        method: RetrievalMethod,
    ) -> Result<QueryResponse, RetrievalError> {
        self.query_filtered(query, k, method, &Filters::new()).await
    }

    pub async fn query_filtered(
        &self,
        query: &str,
        k: usize,
        method: RetrievalMethod,
        filters: &Filters,
    ) -> Result<QueryResponse, RetrievalError> {
        let _permit = self
            .inflight
            .try_acquire()
            .map_err(|_| RetrievalError::Overloaded)?;

        let start = Instant::now();
        let key = cache_key(query, k, method, filters);
        let (result, cache_hit) = self
            .cache
            .get_or_compute(&key, || self.retriever.retrieve(query, k, method, filters))
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let results = result?;
        debug!(k, method = %method, latency_ms, cache_hit, "rag query served");

        {
            let mut totals = self.totals.lock().expect("rag totals mutex poisoned");
            totals.queries += 1;
            totals.latency_sum_ms += latency_ms;
            if cache_hit {
                totals.cache_hits += 1;
            }
        }
        kestrel_metrics::record_rag_query(latency_ms, cache_hit);

        Ok(QueryResponse {
            results,
            latency_ms,
            cache_hit,
        })
    }

    pub async fn metrics(&self) -> RagMetrics {
        let (queries, cache_hits, latency_sum) = {
            let totals = self.totals.lock().expect("rag totals mutex poisoned");
            (totals.queries, totals.cache_hits, totals.latency_sum_ms)
        };
        RagMetrics {
            cache_hit_ratio: if queries > 0 {
                cache_hits as f64 / queries as f64
            } else {
                0.0
            },
            avg_latency_ms: if queries > 0 {
                latency_sum as f64 / queries as f64
            } else {
                0.0
            },
            total_queries: queries,
            doc_count: self.retriever.doc_count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{Embedder, HashEmbedder};
    use crate::memory::{MemoryLexicalIndex, MemoryVectorIndex};
    use crate::rerank::OverlapReranker;
    use crate::types::DocRecord;
    use kestrel_config::{CacheConfig, RetrievalConfig};
    use std::sync::Arc;

    async fn service(max_inflight: usize) -> RagService {
        let docs = vec![
            DocRecord {
                doc_id: "a".into(),
                text: "thompson sampling bandit routing".into(),
                metadata: serde_json::json!({}),
            },
            DocRecord {
                doc_id: "b".into(),
                text: "reciprocal rank fusion of search results".into(),
                metadata: serde_json::json!({}),
            },
            DocRecord {
                doc_id: "c".into(),
                text: "prompt rubric evolution with elitism".into(),
                metadata: serde_json::json!({}),
            },
        ];
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        let vector = MemoryVectorIndex::index(embedder.clone(), docs.clone()).await.unwrap();
        let lexical = MemoryLexicalIndex::index(docs);
        let retriever = HybridRetriever::new(
            Arc::new(vector),
            Arc::new(lexical),
            embedder,
            Arc::new(OverlapReranker),
            RetrievalConfig::default(),
        );
        RagService::new(
            retriever,
            QueryCache::new(CacheConfig::default()),
            max_inflight,
        )
    }

    #[tokio::test]
    async fn warm_cache_returns_identical_ordering() {
        let svc = service(8).await;
        let first = svc.query("bandit routing", 3, RetrievalMethod::Hybrid).await.unwrap();
        assert!(!first.cache_hit);

        let second = svc.query("bandit routing", 3, RetrievalMethod::Hybrid).await.unwrap();
        assert!(second.cache_hit);

        let ids = |r: &QueryResponse| r.results.iter().map(|d| d.doc_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn metrics_track_hits_and_volume() {
        let svc = service(8).await;
        let _ = svc.query("fusion results", 2, RetrievalMethod::Hybrid).await.unwrap();
        let _ = svc.query("fusion results", 2, RetrievalMethod::Hybrid).await.unwrap();

        let metrics = svc.metrics().await;
        assert_eq!(metrics.total_queries, 2);
        assert!((metrics.cache_hit_ratio - 0.5).abs() < 1e-9);
        assert_eq!(metrics.doc_count, 3);
    }

    #[tokio::test]
    async fn zero_capacity_service_fails_fast() {
        let svc = service(0).await;
        let err = svc.query("anything", 2, RetrievalMethod::Hybrid).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Overloaded));
    }
}
