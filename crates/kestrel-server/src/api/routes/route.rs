//! End-user request path: bandit-chosen genome, executed, reward fed back.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use kestrel_core::{Intent, KestrelError, PromptSpec};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RouteRequest {
    #[schema(value_type = String, example = "qa")]
    pub intent: Intent,
    pub prompt: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteResponseDto {
    pub genome_id: String,
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/route", post(route))
}

/// Serves one request through the bandit-fronted router. The response is
/// the generator's text; execution metrics flow to the sink.
#[utoipa::path(
    post,
    path = "/route",
    request_body = RouteRequest,
    responses(
        (status = 200, description = "Generated response", body = RouteResponseDto),
        (status = 422, description = "Structured output could not be repaired"),
        (status = 503, description = "Generator unavailable")
    )
)]
pub async fn route(
    State(state): State<AppState>,
    Json(payload): Json<RouteRequest>,
) -> ApiResult<Json<RouteResponseDto>> {
    if payload.prompt.trim().is_empty() {
        return Err(ApiError(KestrelError::InvalidInput(
            "prompt must not be empty".into(),
        )));
    }

    let spec = PromptSpec::new(payload.intent, payload.prompt);
    let response = state.router.handle(&spec).await?;
    Ok(Json(RouteResponseDto {
        genome_id: response.genome_id,
        text: response.text,
    }))
}
