//! Abstract index operations. Ingestion (upsert/delete) happens outside this
//! service; the pipeline only searches and fetches.

use async_trait::async_trait;

use crate::types::{DocRecord, Filters, RetrievalError, ScoredDoc};

/// Dense ANN index over document embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest neighbours of `query_vec`, best first. Scores are
    /// method-local and not comparable with lexical scores.
    async fn dense_search(
        &self,
        query_vec: &[f32],
        k: usize,
        filters: &Filters,
    ) -> Result<Vec<ScoredDoc>, RetrievalError>;

    /// Batched payload fetch. Unknown ids are skipped, not an error.
    async fn fetch(&self, doc_ids: &[String]) -> Result<Vec<DocRecord>, RetrievalError>;

    async fn doc_count(&self) -> usize;
}

/// Term-based lexical index (BM25 scoring or equivalent).
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn lexical_search(
        &self,
        query: &str,
        k: usize,
        filters: &Filters,
    ) -> Result<Vec<ScoredDoc>, RetrievalError>;

    async fn fetch(&self, doc_ids: &[String]) -> Result<Vec<DocRecord>, RetrievalError>;

    async fn doc_count(&self) -> usize;
}
