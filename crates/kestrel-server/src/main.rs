//! Kestrel server entry point.
//!
//! Initializes telemetry, loads configuration, assembles the component
//! graph and serves the Axum router. On shutdown the bandit arm table is
//! flushed to its snapshot file.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use utoipa::OpenApi;

use kestrel_server::api::openapi::ApiDoc;
use kestrel_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    info!("initializing Kestrel server");

    let config = kestrel_config::KestrelConfig::load()?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(config).await?;
    let bandit = state.bandit.clone();

    // The OpenAPI document is materialized at boot so schema errors fail
    // fast rather than on first request.
    let openapi = ApiDoc::openapi();
    info!(endpoints = openapi.paths.paths.len(), "OpenAPI document built");

    let app = kestrel_server::build_app(state);

    let listener = TcpListener::bind(addr).await?;
    info!("starting Kestrel server on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Final snapshot so restored arms carry everything learned this run.
    if let Err(err) = bandit.snapshot().await {
        warn!(error = %err, "bandit snapshot on shutdown failed");
    }
    info!("Kestrel server stopped");

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kestrel_server=info,kestrel_evolve=info,tower_http=info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_level(true);

    let registry = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(registry)
        .expect("failed to initialize tracing subscriber");
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
