//! Health, readiness and liveness endpoints.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use kestrel_evolve::RunPhase;

use crate::state::AppState;

/// Per-component readiness flags.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[schema(example = "mock")]
    pub generator: String,
    pub retrieval_docs: usize,
    pub bandit_arms: usize,
    #[schema(example = "idle")]
    pub optimizer: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

fn phase_label(phase: RunPhase) -> String {
    match phase {
        RunPhase::Idle => "idle".into(),
        RunPhase::Loading => "loading".into(),
        RunPhase::Evaluating(generation) => format!("evaluating({generation})"),
        RunPhase::Selecting(generation) => format!("selecting({generation})"),
        RunPhase::Done => "done".into(),
        RunPhase::Error => "error".into(),
    }
}

/// Component readiness snapshot.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Component readiness flags", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let rag_metrics = state.rag.metrics().await;
    let optimizer = phase_label(*state.population_loop.phase().borrow());

    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        generator: state.generator_name.to_string(),
        retrieval_docs: rag_metrics.doc_count,
        bandit_arms: state.bandit.arm_count().await,
        optimizer,
    })
}

/// Readiness probe.
#[utoipa::path(
    get,
    path = "/ready",
    responses((status = 200, description = "Service ready"))
)]
pub async fn readiness_check() -> &'static str {
    "ready"
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    responses((status = 200, description = "Service running"))
)]
pub async fn liveness_check() -> &'static str {
    "alive"
}
