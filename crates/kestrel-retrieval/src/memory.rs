//! In-memory reference adapters for both index traits: a cosine vector index
//! and a BM25 lexical index. Both are deterministic, with score ties broken
//! by doc_id, so warm-cache orderings are stable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::embed::{cosine_similarity, tokenize, Embedder};
use crate::store::{LexicalIndex, VectorIndex};
use crate::types::{DocRecord, Filters, RetrievalError, ScoredDoc};

/// Loads a JSON array of [`DocRecord`] from disk.
pub fn load_corpus(path: &Path) -> Result<Vec<DocRecord>, RetrievalError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| RetrievalError::Backend(format!("corpus read {}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|e| RetrievalError::Backend(format!("corpus parse {}: {e}", path.display())))
}

fn matches_filters(record: &DocRecord, filters: &Filters) -> bool {
    filters.iter().all(|(key, expected)| {
        record
            .metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(|actual| actual == expected)
            .unwrap_or(false)
    })
}

fn sort_hits(hits: &mut Vec<ScoredDoc>, k: usize) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
    hits.truncate(k);
}

/// Cosine-similarity vector index over documents embedded at load time.
pub struct MemoryVectorIndex {
    docs: Vec<DocRecord>,
    vectors: Vec<Vec<f32>>,
    by_id: HashMap<String, usize>,
}

impl MemoryVectorIndex {
    /// Embeds the corpus once and keeps vectors alongside payloads.
    pub async fn index(
        embedder: Arc<dyn Embedder>,
        docs: Vec<DocRecord>,
    ) -> Result<Self, RetrievalError> {
        let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed(&texts).await?
        };
        let by_id = docs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.doc_id.clone(), i))
            .collect();
        Ok(Self {
            docs,
            vectors,
            by_id,
        })
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn dense_search(
        &self,
        query_vec: &[f32],
        k: usize,
        filters: &Filters,
    ) -> Result<Vec<ScoredDoc>, RetrievalError> {
        let mut hits: Vec<ScoredDoc> = self
            .docs
            .iter()
            .zip(self.vectors.iter())
            .filter(|(doc, _)| matches_filters(doc, filters))
            .map(|(doc, vector)| ScoredDoc {
                doc_id: doc.doc_id.clone(),
                score: cosine_similarity(query_vec, vector),
            })
            .collect();
        sort_hits(&mut hits, k);
        Ok(hits)
    }

    async fn fetch(&self, doc_ids: &[String]) -> Result<Vec<DocRecord>, RetrievalError> {
        Ok(doc_ids
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|&i| self.docs[i].clone()))
            .collect())
    }

    async fn doc_count(&self) -> usize {
        self.docs.len()
    }
}

/// BM25 parameters.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term frequency saturation parameter.
    pub k1: f32,
    /// Length normalization parameter.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// BM25 lexical index with corpus statistics computed at load time.
pub struct MemoryLexicalIndex {
    docs: Vec<DocRecord>,
    doc_tokens: Vec<Vec<String>>,
    doc_freq: HashMap<String, usize>,
    avg_doc_len: f32,
    by_id: HashMap<String, usize>,
    params: Bm25Params,
}

impl MemoryLexicalIndex {
    pub fn index(docs: Vec<DocRecord>) -> Self {
        let doc_tokens: Vec<Vec<String>> = docs.iter().map(|d| tokenize(&d.text)).collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for tokens in &doc_tokens {
            let mut seen: Vec<&String> = tokens.iter().collect();
            seen.sort();
            seen.dedup();
            for token in seen {
                *doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }

        let total_len: usize = doc_tokens.iter().map(|t| t.len()).sum();
        let avg_doc_len = if docs.is_empty() {
            0.0
        } else {
            total_len as f32 / docs.len() as f32
        };

        let by_id = docs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.doc_id.clone(), i))
            .collect();

        Self {
            docs,
            doc_tokens,
            doc_freq,
            avg_doc_len,
            by_id,
            params: Bm25Params::default(),
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.docs.len() as f32;
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn score(&self, doc_index: usize, query_terms: &[String]) -> f32 {
        let tokens = &self.doc_tokens[doc_index];
        let doc_len = tokens.len() as f32;
        let mut score = 0.0;
        for term in query_terms {
            let tf = tokens.iter().filter(|t| *t == term).count() as f32;
            if tf == 0.0 {
                continue;
            }
            let idf = self.idf(term);
            let numerator = tf * (self.params.k1 + 1.0);
            let denominator = tf
                + self.params.k1
                    * (1.0 - self.params.b + self.params.b * doc_len / self.avg_doc_len.max(1.0));
            score += idf * numerator / denominator;
        }
        score
    }
}

#[async_trait]
impl LexicalIndex for MemoryLexicalIndex {
    async fn lexical_search(
        &self,
        query: &str,
        k: usize,
        filters: &Filters,
    ) -> Result<Vec<ScoredDoc>, RetrievalError> {
        let terms = tokenize(query);
        let mut hits: Vec<ScoredDoc> = self
            .docs
            .iter()
            .enumerate()
            .filter(|(_, doc)| matches_filters(doc, filters))
            .map(|(i, doc)| ScoredDoc {
                doc_id: doc.doc_id.clone(),
                score: self.score(i, &terms),
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        sort_hits(&mut hits, k);
        Ok(hits)
    }

    async fn fetch(&self, doc_ids: &[String]) -> Result<Vec<DocRecord>, RetrievalError> {
        Ok(doc_ids
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|&i| self.docs[i].clone()))
            .collect())
    }

    async fn doc_count(&self) -> usize {
        self.docs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbedder;

    fn corpus() -> Vec<DocRecord> {
        vec![
            DocRecord {
                doc_id: "d1".into(),
                text: "thompson sampling selects bandit arms by posterior draws".into(),
                metadata: serde_json::json!({"source": "notes"}),
            },
            DocRecord {
                doc_id: "d2".into(),
                text: "reciprocal rank fusion combines dense and lexical rankings".into(),
                metadata: serde_json::json!({"source": "notes"}),
            },
            DocRecord {
                doc_id: "d3".into(),
                text: "the cache layer coalesces identical in-flight queries".into(),
                metadata: serde_json::json!({"source": "design"}),
            },
        ]
    }

    #[tokio::test]
    async fn dense_search_prefers_related_documents() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        let index = MemoryVectorIndex::index(embedder.clone(), corpus()).await.unwrap();
        let query = embedder
            .embed(&["bandit arms thompson sampling".to_string()])
            .await
            .unwrap();
        let hits = index.dense_search(&query[0], 3, &Filters::new()).await.unwrap();
        assert_eq!(hits[0].doc_id, "d1");
    }

    #[tokio::test]
    async fn lexical_search_ranks_by_bm25() {
        let index = MemoryLexicalIndex::index(corpus());
        let hits = index
            .lexical_search("rank fusion rankings", 3, &Filters::new())
            .await
            .unwrap();
        assert_eq!(hits[0].doc_id, "d2");
    }

    #[tokio::test]
    async fn filters_restrict_both_methods() {
        let mut filters = Filters::new();
        filters.insert("source".into(), "design".into());

        let lexical = MemoryLexicalIndex::index(corpus());
        let hits = lexical.lexical_search("cache queries", 5, &filters).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "d3");

        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::default());
        let vector = MemoryVectorIndex::index(embedder.clone(), corpus()).await.unwrap();
        let query = embedder.embed(&["cache".to_string()]).await.unwrap();
        let hits = vector.dense_search(&query[0], 5, &filters).await.unwrap();
        assert!(hits.iter().all(|h| h.doc_id == "d3"));
    }

    #[tokio::test]
    async fn fetch_skips_unknown_ids() {
        let index = MemoryLexicalIndex::index(corpus());
        let records = index
            .fetch(&["d2".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].doc_id, "d2");
    }
}
