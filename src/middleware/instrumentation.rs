//! Instrumentation decorator: request count and latency per method and outcome.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::metrics::WalletMetrics;
use super::{METHOD_LIST_LEDGER, METHOD_TRANSFER};
use crate::ledger::{TransferReceipt, WalletError};
use crate::service::WalletService;

pub struct InstrumentedWallet<S> {
    metrics: Arc<WalletMetrics>,
    next: S,
}

impl<S: WalletService> InstrumentedWallet<S> {
    pub fn new(metrics: Arc<WalletMetrics>, next: S) -> Self {
        Self { metrics, next }
    }
}

#[async_trait]
impl<S: WalletService> WalletService for InstrumentedWallet<S> {
    async fn list_ledger(&self, kind: &str) -> Result<Vec<String>, WalletError> {
        let begin = Instant::now();
        let result = self.next.list_ledger(kind).await;
        self.metrics
            .observe(METHOD_LIST_LEDGER, result.is_err(), begin.elapsed());
        result
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: &str,
    ) -> Result<TransferReceipt, WalletError> {
        let begin = Instant::now();
        let result = self.next.transfer(from, to, amount).await;
        self.metrics
            .observe(METHOD_TRANSFER, result.is_err(), begin.elapsed());
        result
    }
}
