//! End-to-end endpoint tests over an in-process app with the scripted mock
//! generator and a small local corpus.

use axum::body::{to_bytes, Body};
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use kestrel_config::KestrelConfig;
use kestrel_server::state::AppState;

async fn test_app() -> axum::Router {
    let dir = tempfile::tempdir().unwrap();

    let golden_path = dir.path().join("golden_set.json");
    std::fs::write(
        &golden_path,
        r#"[{"prompt": "what is 2+2?", "intent": "qa", "expected": "4"}]"#,
    )
    .unwrap();

    let corpus_path = dir.path().join("corpus.json");
    std::fs::write(
        &corpus_path,
        serde_json::to_string(&json!([
            {"doc_id": "d1", "text": "thompson sampling routes traffic across genome arms"},
            {"doc_id": "d2", "text": "reciprocal rank fusion merges dense and lexical hits"},
            {"doc_id": "d3", "text": "the improvement daemon gates genome promotion"}
        ]))
        .unwrap(),
    )
    .unwrap();

    let mut config = KestrelConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.golden_path = Some(golden_path);
    config.retrieval.corpus_path = Some(corpus_path);
    config.population.size = 4;
    config.population.generations = 1;
    config.validate().unwrap();

    let state = AppState::new(config).await.unwrap();
    // Keep the tempdir alive for the whole test process.
    std::mem::forget(dir);
    kestrel_server::build_app(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_component_readiness() {
    let app = test_app().await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["generator"], "mock");
    assert_eq!(body["retrieval_docs"], 3);
    assert_eq!(body["optimizer"], "idle");
}

#[tokio::test]
async fn rag_query_round_trip_and_metrics() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/rag/query",
            json!({"query": "rank fusion", "k": 2, "method": "hybrid"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["cache_hit"], false);
    assert!(!body["results"].as_array().unwrap().is_empty());

    let response = app.oneshot(get("/rag/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_queries"], 1);
    assert_eq!(body["doc_count"], 3);
}

#[tokio::test]
async fn invalid_rag_query_returns_the_error_envelope() {
    let app = test_app().await;
    let response = app
        .oneshot(post_json("/rag/query", json!({"query": "x", "k": 0})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "InvalidInput");
    assert_eq!(body["error"]["retriable"], false);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn optimize_runs_against_the_golden_set() {
    let app = test_app().await;
    let response = app
        .oneshot(post_json(
            "/optimize",
            json!({"num_generations": 1, "seed": 42}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["run_id"].is_string());
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
    assert!(body["best_genome"]["genome_id"].is_string());
    assert!(body["best_genome"]["model_key"].is_string());
}

#[tokio::test]
async fn optimize_rejects_out_of_range_generations() {
    let app = test_app().await;
    let response = app
        .oneshot(post_json("/optimize", json!({"num_generations": 0})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "InvalidInput");
}

#[tokio::test]
async fn route_serves_and_registers_the_baseline_arm() {
    let app = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/route", json!({"intent": "qa", "prompt": "hello"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["text"].as_str().unwrap().starts_with("MOCK:"));
    let genome_id = body["genome_id"].as_str().unwrap().to_string();

    let response = app.oneshot(get("/bandit/stats")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["arms"][&genome_id]["pulls"], 1);
}

#[tokio::test]
async fn prometheus_export_is_reachable() {
    let app = test_app().await;
    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = test_app().await;
    let response = app.oneshot(get("/definitely/not/here")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
