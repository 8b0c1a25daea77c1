//! HTTP request counting layered on the shared metrics sink.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, Opts};

/// Total HTTP requests by method, matched route and status.
pub static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid http_requests_total opts");

    kestrel_metrics::REGISTRY
        .register(Box::new(counter.clone()))
        .expect("register http_requests_total");

    counter
});

/// Middleware incrementing the request counter per response.
pub async fn track_http_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let matched_path: String = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS
        .with_label_values(&[method.as_str(), matched_path.as_str(), status.as_str()])
        .inc();

    response
}
