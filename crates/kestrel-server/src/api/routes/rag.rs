//! Retrieval endpoints.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;

use kestrel_retrieval::RetrievalMethod;

use crate::{
    api::models::{RagMetricsDto, RagQueryResponseDto},
    error::ApiResult,
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RagQueryRequest {
    pub query: String,
    #[serde(default = "default_k")]
    #[schema(example = 5)]
    pub k: usize,
    #[serde(default = "default_method")]
    #[schema(value_type = String, example = "hybrid")]
    pub method: RetrievalMethod,
}

const fn default_k() -> usize {
    5
}

const fn default_method() -> RetrievalMethod {
    RetrievalMethod::Hybrid
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rag/query", post(rag_query))
        .route("/rag/metrics", get(rag_metrics))
}

/// Hybrid retrieval query.
#[utoipa::path(
    post,
    path = "/rag/query",
    request_body = RagQueryRequest,
    responses(
        (status = 200, description = "Ranked results", body = RagQueryResponseDto),
        (status = 400, description = "Invalid query"),
        (status = 429, description = "Too many in-flight queries"),
        (status = 503, description = "Both retrieval methods failed")
    )
)]
pub async fn rag_query(
    State(state): State<AppState>,
    Json(payload): Json<RagQueryRequest>,
) -> ApiResult<Json<RagQueryResponseDto>> {
    let response = state
        .rag
        .query(&payload.query, payload.k, payload.method)
        .await?;
    Ok(Json(response.into()))
}

/// Aggregate retrieval metrics.
#[utoipa::path(
    get,
    path = "/rag/metrics",
    responses((status = 200, description = "Service metrics", body = RagMetricsDto))
)]
pub async fn rag_metrics(State(state): State<AppState>) -> Json<RagMetricsDto> {
    Json(state.rag.metrics().await.into())
}
