//! Logging decorator: one event per facade call.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{METHOD_LIST_LEDGER, METHOD_TRANSFER};
use crate::ledger::{TransferReceipt, WalletError};
use crate::service::WalletService;

pub struct LoggingWallet<S> {
    next: S,
}

impl<S: WalletService> LoggingWallet<S> {
    pub fn new(next: S) -> Self {
        Self { next }
    }
}

#[async_trait]
impl<S: WalletService> WalletService for LoggingWallet<S> {
    async fn list_ledger(&self, kind: &str) -> Result<Vec<String>, WalletError> {
        let begin = Instant::now();
        let result = self.next.list_ledger(kind).await;
        let took = begin.elapsed();

        match &result {
            Ok(records) => info!(
                method = METHOD_LIST_LEDGER,
                input = kind,
                output = records.len(),
                took = ?took,
                "wallet call"
            ),
            Err(e) => warn!(
                method = METHOD_LIST_LEDGER,
                input = kind,
                output = "no table",
                err = %e,
                code = e.code(),
                took = ?took,
                "wallet call"
            ),
        }
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
        let took = begin.elapsed();
        let input = format!("From {from} to {to} amount {amount}");

        match &result {
            Ok(receipt) => info!(
                method = METHOD_TRANSFER,
                input = %input,
                output = %receipt.status,
                transfer_id = receipt.transfer_id,
                attempts = receipt.attempts,
                took = ?took,
                "wallet call"
            ),
            Err(e) => warn!(
                method = METHOD_TRANSFER,
                input = %input,
                output = "error",
                err = %e,
                code = e.code(),
                took = ?took,
                "wallet call"
            ),
        }
        result
    }
}
