//! Prometheus export route.

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};

use kestrel_core::KestrelError;

use crate::{error::ApiError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_endpoint))
}

async fn metrics_endpoint() -> Result<impl IntoResponse, ApiError> {
    let body = kestrel_metrics::export()
        .map_err(|err| ApiError(KestrelError::Internal(err.to_string())))?;
    Ok((
        [(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        body,
    ))
}
