//! Axum façade over the Kestrel stack: optimize runs, RAG queries, bandit
//! stats, routed chat, health and Prometheus export.

pub mod api;
pub mod error;
pub mod metrics;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Builds the full application router.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(api::routes::health::router())
        .merge(api::routes::optimize::router())
        .merge(api::routes::rag::router())
        .merge(api::routes::bandit::router())
        .merge(api::routes::route::router())
        .merge(api::routes::metrics::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(from_fn(metrics::track_http_requests))
        .with_state(state)
}
