mod config;
mod rpc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use td_api_types::ContractArtifact;
use td_contract_memory::DevChain;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::DevnodeConfig;

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

pub(crate) struct AppState {
    pub(crate) chain: RwLock<DevChain>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = DevnodeConfig::from_env()?;
    let state = Arc::new(AppState {
        chain: RwLock::new(DevChain::new(config.chain.clone())),
    });

    info!(
        network_id = %config.chain.network_id,
        accounts = config.chain.accounts.len(),
        deny_authorization = config.chain.deny_authorization,
        "devnode starting"
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!("devnode listening on {}", config.addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(rpc::rpc))
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/TodoList.json", get(artifact))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "devnode",
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "devnode",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build artifact pointing at this node's deployment.
async fn artifact(State(state): State<Arc<AppState>>) -> Json<ContractArtifact> {
    Json(state.chain.read().await.artifact())
}
