//! kestrel-retrieval - Hybrid retrieval pipeline
//!
//! Dense + lexical search behind abstract index traits, fused by reciprocal
//! rank, reranked by a cross-encoder plug-in, fronted by a TTL+LRU result
//! cache with single-flight coalescing and a bounded-concurrency facade.
//!
//! All components support:
//! - Per-method fanout timeouts with graceful single-method degradation
//! - Deterministic ordering under warm caches
//! - Structured error types mapped onto the service-wide kinds

pub mod cache;
pub mod embed;
pub mod fusion;
pub mod hybrid;
pub mod memory;
pub mod rerank;
pub mod service;
pub mod store;
pub mod types;

pub use cache::{cache_key, QueryCache};
pub use embed::{cosine_similarity, Embedder, HashEmbedder, HttpEmbedder};
pub use fusion::reciprocal_rank_fusion;
pub use hybrid::HybridRetriever;
pub use memory::{load_corpus, MemoryLexicalIndex, MemoryVectorIndex};
pub use rerank::{IdentityReranker, OverlapReranker, Reranker};
pub use service::{RagMetrics, RagService, QueryResponse};
pub use store::{LexicalIndex, VectorIndex};
pub use types::{DocRecord, Filters, RetrievalError, RetrievalMethod, RetrievedDocument, ScoredDoc};
