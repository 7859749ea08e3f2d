//! OpenAPI document for the wallet API
//!
//! Served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

use crate::gateway::types::{
    HealthResponse, LedgerResponse, SubmitTransferRequest, SubmitTransferResponse, VerbError,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Wallet Funds Transfer API",
        version = "1.0.0",
        description = "Account balances and funds transfers over a serializable transactional store.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::list_accounts,
        crate::gateway::handlers::list_transfers,
        crate::gateway::handlers::submit_transfer,
        crate::gateway::handlers::metrics,
        crate::gateway::handlers::health_check,
    ),
    components(
        schemas(
            LedgerResponse,
            SubmitTransferRequest,
            SubmitTransferResponse,
            HealthResponse,
            VerbError,
        )
    ),
    tags(
        (name = "Ledger", description = "Account and transfer listings"),
        (name = "Transfer", description = "Funds transfers between accounts"),
        (name = "System", description = "Health checks and metrics")
    )
)]
pub struct ApiDoc;
