pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the wallet router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/accounts",
            get(handlers::list_accounts)
                .fallback(|| async { handlers::wrong_verb("GET", "/accounts") }),
        )
        .route(
            "/transfers",
            get(handlers::list_transfers)
                .fallback(|| async { handlers::wrong_verb("GET", "/transfers") }),
        )
        .route(
            "/submittransfer",
            post(handlers::submit_transfer)
                .fallback(|| async { handlers::wrong_verb("POST", "/submittransfer") }),
        )
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(openapi::ApiDoc::openapi()) }),
        )
}

/// Serve the router until Ctrl-C
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}, port may already be in use"))?;

    tracing::info!(%addr, "Wallet gateway listening");
    tracing::info!("Endpoints: GET /accounts, GET /transfers, POST /submittransfer, GET /metrics, GET /health");
    tracing::info!("API Docs: http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Wallet gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
