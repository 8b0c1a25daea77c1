//! Hybrid retriever: embed once, fan out dense and lexical searches in
//! parallel, fuse by reciprocal rank, fetch survivors in one batch, rerank.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use std::future::Future;

use tracing::{debug, warn};

use kestrel_config::RetrievalConfig;

use crate::embed::Embedder;
use crate::fusion::reciprocal_rank_fusion;
use crate::rerank::Reranker;
use crate::store::{LexicalIndex, VectorIndex};
use crate::types::{DocRecord, Filters, RetrievalError, RetrievalMethod, RetrievedDocument, ScoredDoc};

/// Hard ceiling on result fan-in, shared with the genome's retriever_topk.
const K_MAX: usize = 50;

pub struct HybridRetriever {
    vector: Arc<dyn VectorIndex>,
    lexical: Arc<dyn LexicalIndex>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    cfg: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        cfg: RetrievalConfig,
    ) -> Self {
        Self {
            vector,
            lexical,
            embedder,
            reranker,
            cfg,
        }
    }

    pub async fn doc_count(&self) -> usize {
        self.vector.doc_count().await.max(self.lexical.doc_count().await)
    }

    /// Runs the full pipeline for one query.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        method: RetrievalMethod,
        filters: &Filters,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        if k == 0 || k > K_MAX {
            return Err(RetrievalError::InvalidQuery(format!(
                "k {k} outside [1, {K_MAX}]"
            )));
        }
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery("query must not be empty".into()));
        }

        let k_fuse = (k * 4).min(K_MAX);
        let lists = self.fan_out(query, k_fuse, method, filters).await?;

        let list_refs: Vec<&[ScoredDoc]> = lists.iter().map(|l| l.as_slice()).collect();
        let mut fused = reciprocal_rank_fusion(&list_refs, self.cfg.rrf_c);
        fused.truncate(k_fuse);

        if fused.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.fetch_survivors(&fused).await?;
        self.rerank_and_rank(query, k, fused, records).await
    }

    /// Dense/lexical fanout with per-method timeouts. A single failed method
    /// degrades the query; both failing is `Unavailable`.
    async fn fan_out(
        &self,
        query: &str,
        k_fuse: usize,
        method: RetrievalMethod,
        filters: &Filters,
    ) -> Result<Vec<Vec<ScoredDoc>>, RetrievalError> {
        match method {
            RetrievalMethod::Dense => {
                let hits = self.dense(query, k_fuse, filters).await?;
                Ok(vec![hits])
            }
            RetrievalMethod::Lexical => {
                let hits = self
                    .bounded("lexical", self.lexical.lexical_search(query, k_fuse, filters))
                    .await?;
                Ok(vec![hits])
            }
            RetrievalMethod::Hybrid => {
                let (dense, lexical) = tokio::join!(
                    self.dense(query, k_fuse, filters),
                    self.bounded("lexical", self.lexical.lexical_search(query, k_fuse, filters)),
                );

                let mut lists = Vec::new();
                let mut failures = Vec::new();
                match dense {
                    Ok(hits) => lists.push(hits),
                    Err(e) => {
                        warn!(error = %e, "dense search failed, degrading to lexical");
                        failures.push(e.to_string());
                    }
                }
                match lexical {
                    Ok(hits) => lists.push(hits),
                    Err(e) => {
                        warn!(error = %e, "lexical search failed, degrading to dense");
                        failures.push(e.to_string());
                    }
                }

                if lists.is_empty() {
                    return Err(RetrievalError::Unavailable(failures.join("; ")));
                }
                Ok(lists)
            }
        }
    }

    async fn dense(
        &self,
        query: &str,
        k_fuse: usize,
        filters: &Filters,
    ) -> Result<Vec<ScoredDoc>, RetrievalError> {
        let inputs = vec![query.to_string()];
        let vectors = self.bounded("embed", self.embedder.embed(&inputs)).await?;
        let query_vec = vectors
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("embedder returned no vector".into()))?;
        self.bounded("dense", self.vector.dense_search(&query_vec, k_fuse, filters))
            .await
    }

    async fn bounded<T>(
        &self,
        label: &str,
        fut: impl Future<Output = Result<T, RetrievalError>>,
    ) -> Result<T, RetrievalError> {
        match tokio::time::timeout(Duration::from_millis(self.cfg.fanout_timeout_ms), fut).await {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::Backend(format!(
                "{label} timed out after {} ms",
                self.cfg.fanout_timeout_ms
            ))),
        }
    }

    /// One batched payload fetch across both indexes; ids neither index can
    /// resolve are dropped.
    async fn fetch_survivors(
        &self,
        fused: &[(String, f64)],
    ) -> Result<Vec<DocRecord>, RetrievalError> {
        let ids: Vec<String> = fused.iter().map(|(id, _)| id.clone()).collect();

        let mut records = match self.vector.fetch(&ids).await {
            Ok(records) => records,
            Err(e) => {
                debug!(error = %e, "vector fetch failed, falling back to lexical fetch");
                Vec::new()
            }
        };

        let seen: HashSet<String> = records.iter().map(|r| r.doc_id.clone()).collect();
        let missing: Vec<String> = ids.iter().filter(|id| !seen.contains(*id)).cloned().collect();
        if !missing.is_empty() {
            if let Ok(mut extra) = self.lexical.fetch(&missing).await {
                records.append(&mut extra);
            }
        }
        Ok(records)
    }

    /// Cross-encoder scoring in batches, descending order by rerank score
    /// with deterministic tie-breaks (fused score, then doc_id). A rerank
    /// failure degrades to the fused ordering rather than failing the query.
    async fn rerank_and_rank(
        &self,
        query: &str,
        k: usize,
        fused: Vec<(String, f64)>,
        records: Vec<DocRecord>,
    ) -> Result<Vec<RetrievedDocument>, RetrievalError> {
        let fused_scores: HashMap<&str, f64> =
            fused.iter().map(|(id, score)| (id.as_str(), *score)).collect();

        let candidates: Vec<&DocRecord> = fused
            .iter()
            .filter_map(|(id, _)| records.iter().find(|r| &r.doc_id == id))
            .collect();
        let texts: Vec<String> = candidates.iter().map(|r| r.text.clone()).collect();

        let mut scores = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.cfg.rerank_batch.max(1)) {
            match self.bounded("rerank", self.reranker.rerank(query, chunk)).await {
                Ok(mut batch) => scores.append(&mut batch),
                Err(e) => {
                    warn!(error = %e, "rerank failed, keeping fused ordering");
                    scores.clear();
                    scores.extend(
                        candidates
                            .iter()
                            .map(|r| fused_scores.get(r.doc_id.as_str()).copied().unwrap_or(0.0) as f32),
                    );
                    break;
                }
            }
        }

        let mut ranked: Vec<(RetrievedDocument, f64)> = candidates
            .into_iter()
            .zip(scores)
            .map(|(record, score)| {
                let fused_score = fused_scores.get(record.doc_id.as_str()).copied().unwrap_or(0.0);
                (
                    RetrievedDocument {
                        doc_id: record.doc_id.clone(),
                        text: record.text.clone(),
                        score,
                        source_metadata: record.metadata.clone(),
                    },
                    fused_score,
                )
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.0.score
                .partial_cmp(&a.0.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.0.doc_id.cmp(&b.0.doc_id))
        });

        Ok(ranked.into_iter().map(|(doc, _)| doc).take(k).collect())
    }
}
