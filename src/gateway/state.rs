use std::sync::Arc;

use crate::ledger::{LedgerKind, LedgerStore, RelationNames};
use crate::middleware::WalletMetrics;
use crate::service::WalletService;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    /// Fully decorated facade
    pub wallet: Arc<dyn WalletService>,
    /// Metrics fed by the instrumentation layer
    pub metrics: Arc<WalletMetrics>,
    /// Store handle for health checks
    pub store: Arc<dyn LedgerStore>,
    /// Relation names the wallet was configured with
    pub names: RelationNames,
}

impl AppState {
    pub fn new(
        wallet: Arc<dyn WalletService>,
        metrics: Arc<WalletMetrics>,
        store: Arc<dyn LedgerStore>,
        names: RelationNames,
    ) -> Self {
        Self {
            wallet,
            metrics,
            store,
            names,
        }
    }

    /// Relation name to ask the wallet for when listing `kind`
    pub fn relation(&self, kind: LedgerKind) -> &str {
        self.names.relation(kind)
    }
}
