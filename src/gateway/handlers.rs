//! Wallet HTTP handlers

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};

use super::state::AppState;
use super::types::{
    HealthResponse, LedgerResponse, SubmitTransferRequest, SubmitTransferResponse, VerbError,
};
use crate::ledger::{LedgerKind, WalletError};

fn status_of(e: &WalletError) -> StatusCode {
    StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn list(state: &AppState, kind: LedgerKind) -> (StatusCode, Json<LedgerResponse>) {
    let relation = state.relation(kind);
    match state.wallet.list_ledger(relation).await {
        Ok(records) => (StatusCode::OK, Json(LedgerResponse::records(records))),
        Err(e) => {
            if e.category() == crate::ledger::ErrorCategory::Infrastructure {
                tracing::error!(%kind, relation, error = %e, "Ledger listing failed");
            }
            (status_of(&e), Json(LedgerResponse::error(&e)))
        }
    }
}

/// List all accounts
#[utoipa::path(
    get,
    path = "/accounts",
    responses(
        (status = 200, description = "Accounts ordered by account id", body = LedgerResponse),
        (status = 404, description = "No accounts defined", body = LedgerResponse),
        (status = 503, description = "Store unavailable", body = LedgerResponse)
    ),
    tag = "Ledger"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<LedgerResponse>) {
    list(&state, LedgerKind::Accounts).await
}

/// List the transfer history
#[utoipa::path(
    get,
    path = "/transfers",
    responses(
        (status = 200, description = "Transfers in store-assigned order", body = LedgerResponse),
        (status = 404, description = "No transfers defined", body = LedgerResponse),
        (status = 503, description = "Store unavailable", body = LedgerResponse)
    ),
    tag = "Ledger"
)]
pub async fn list_transfers(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<LedgerResponse>) {
    list(&state, LedgerKind::Transfers).await
}

/// Submit a funds transfer
#[utoipa::path(
    post,
    path = "/submittransfer",
    request_body = SubmitTransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = SubmitTransferResponse),
        (status = 400, description = "Malformed request, same account or invalid amount", body = SubmitTransferResponse),
        (status = 404, description = "Unknown source or destination account", body = SubmitTransferResponse),
        (status = 422, description = "Insufficient balance or currency mismatch", body = SubmitTransferResponse),
        (status = 503, description = "Store unavailable or retries exhausted", body = SubmitTransferResponse)
    ),
    tag = "Transfer"
)]
pub async fn submit_transfer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitTransferRequest>, JsonRejection>,
) -> (StatusCode, Json<SubmitTransferResponse>) {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SubmitTransferResponse::error(
                    rejection.body_text(),
                    "INVALID_REQUEST",
                )),
            );
        }
    };

    match state.wallet.transfer(&req.from, &req.to, &req.amount).await {
        Ok(receipt) => (StatusCode::OK, Json(SubmitTransferResponse::success(&receipt))),
        Err(e) => (status_of(&e), Json(SubmitTransferResponse::from(&e))),
    }
}

/// Prometheus metrics
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus text exposition", body = String, content_type = "text/plain")
    ),
    tag = "System"
)]
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render_prometheus(),
    )
}

/// Health check endpoint
///
/// - Healthy: 200 OK + {status: "ok", timestamp_ms}
/// - Store unreachable: 503 + {status: "unavailable", timestamp_ms}
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable", body = HealthResponse)
    ),
    tag = "System"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                timestamp_ms,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "[HEALTH] store ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    timestamp_ms,
                }),
            )
        }
    }
}

/// 405 body for a route hit with the wrong verb
pub fn wrong_verb(verb: &str, endpoint: &str) -> (StatusCode, Json<VerbError>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(VerbError {
            err: format!("Verb can only be \"{verb}\" for endpoint \"{endpoint}\""),
        }),
    )
}
