//! Bandit introspection.

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ArmStatsDto {
    pub pulls: u64,
    pub mean_reward: f64,
    pub expected_value: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BanditStatsResponse {
    /// Arm table keyed by genome id.
    #[schema(value_type = Object)]
    pub arms: BTreeMap<String, ArmStatsDto>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/bandit/stats", get(bandit_stats))
}

/// Current arm table.
#[utoipa::path(
    get,
    path = "/bandit/stats",
    responses((status = 200, description = "Arm table", body = BanditStatsResponse))
)]
pub async fn bandit_stats(State(state): State<AppState>) -> Json<BanditStatsResponse> {
    let arms = state
        .bandit
        .stats()
        .await
        .into_iter()
        .map(|(genome_id, stats)| {
            (
                genome_id,
                ArmStatsDto {
                    pulls: stats.pulls,
                    mean_reward: stats.mean_reward,
                    expected_value: stats.expected_value,
                },
            )
        })
        .collect();
    Json(BanditStatsResponse { arms })
}
