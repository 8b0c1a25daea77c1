//! Wire-format DTOs for the public API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use kestrel_core::Genome;
use kestrel_evolve::GenerationRecord;
use kestrel_retrieval::{QueryResponse, RagMetrics, RetrievedDocument};

/// Genome as it appears in responses, with its content-addressed id.
#[derive(Debug, Serialize, ToSchema)]
pub struct GenomeDto {
    pub genome_id: String,
    pub rubric: String,
    pub cot: bool,
    pub temp: f64,
    pub max_tokens: u32,
    pub retriever_topk: u32,
    pub use_consensus: bool,
    pub model_key: String,
    pub generation: u32,
}

impl From<&Genome> for GenomeDto {
    fn from(genome: &Genome) -> Self {
        Self {
            genome_id: genome.id().to_string(),
            rubric: genome.rubric().to_string(),
            cot: genome.cot(),
            temp: genome.temp(),
            max_tokens: genome.max_tokens(),
            retriever_topk: genome.retriever_topk(),
            use_consensus: genome.use_consensus(),
            model_key: genome.model_key().to_string(),
            generation: genome.generation(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationRecordDto {
    pub generation: u32,
    pub best_score: f64,
    pub mean_score: f64,
    pub best_genome_id: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&GenerationRecord> for GenerationRecordDto {
    fn from(record: &GenerationRecord) -> Self {
        Self {
            generation: record.generation,
            best_score: record.best_score,
            mean_score: record.mean_score,
            best_genome_id: record.best_genome_id.clone(),
            timestamp: record.timestamp,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentDto {
    pub doc_id: String,
    pub text: String,
    pub score: f32,
    #[schema(value_type = Object)]
    pub source_metadata: serde_json::Value,
}

impl From<RetrievedDocument> for DocumentDto {
    fn from(doc: RetrievedDocument) -> Self {
        Self {
            doc_id: doc.doc_id,
            text: doc.text,
            score: doc.score,
            source_metadata: doc.source_metadata,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RagQueryResponseDto {
    pub results: Vec<DocumentDto>,
    pub latency_ms: u64,
    pub cache_hit: bool,
}

impl From<QueryResponse> for RagQueryResponseDto {
    fn from(response: QueryResponse) -> Self {
        Self {
            results: response.results.into_iter().map(DocumentDto::from).collect(),
            latency_ms: response.latency_ms,
            cache_hit: response.cache_hit,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RagMetricsDto {
    pub cache_hit_ratio: f64,
    pub avg_latency_ms: f64,
    pub total_queries: u64,
    pub doc_count: usize,
}

impl From<RagMetrics> for RagMetricsDto {
    fn from(metrics: RagMetrics) -> Self {
        Self {
            cache_hit_ratio: metrics.cache_hit_ratio,
            avg_latency_ms: metrics.avg_latency_ms,
            total_queries: metrics.total_queries,
            doc_count: metrics.doc_count,
        }
    }
}
