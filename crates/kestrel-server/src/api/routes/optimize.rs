//! Optimize run endpoint.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use kestrel_core::KestrelError;

use crate::{
    api::models::{GenerationRecordDto, GenomeDto},
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_GENERATIONS: u32 = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OptimizeRequest {
    /// Generations to run; defaults to the configured value.
    #[serde(default)]
    pub num_generations: Option<u32>,
    /// One-shot rubric rewrite before the loop starts.
    #[serde(default)]
    pub use_mipro: bool,
    /// RNG seed; runs with the same seed and golden set reproduce.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OptimizeResponse {
    pub run_id: String,
    pub best_genome: GenomeDto,
    pub best_score: f64,
    pub history: Vec<GenerationRecordDto>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/optimize", post(optimize))
}

/// Runs the population loop against the configured golden set.
#[utoipa::path(
    post,
    path = "/optimize",
    request_body = OptimizeRequest,
    responses(
        (status = 200, description = "Optimize run finished", body = OptimizeResponse),
        (status = 400, description = "Invalid parameters"),
        (status = 422, description = "Golden set invalid")
    )
)]
pub async fn optimize(
    State(state): State<AppState>,
    Json(payload): Json<OptimizeRequest>,
) -> ApiResult<Json<OptimizeResponse>> {
    let generations = payload
        .num_generations
        .unwrap_or(state.config.population.generations);
    if generations == 0 || generations > MAX_GENERATIONS {
        return Err(ApiError(KestrelError::InvalidInput(format!(
            "num_generations {generations} outside [1, {MAX_GENERATIONS}]"
        ))));
    }
    let seed = payload.seed.unwrap_or_else(rand::random);

    let base = state
        .population_loop
        .prepare_base(state.baseline.clone(), payload.use_mipro)
        .await;

    let outcome = state
        .population_loop
        .run_from_file(
            base,
            &state.config.golden_path(),
            generations,
            seed,
            Some(&state.config.history_dir()),
        )
        .await?;

    Ok(Json(OptimizeResponse {
        run_id: outcome.run_id.clone(),
        best_genome: GenomeDto::from(&outcome.best),
        best_score: outcome.best_score,
        history: outcome.history.iter().map(GenerationRecordDto::from).collect(),
    }))
}
