//! Wallet Facade
//!
//! The two-operation contract consumed by the decorators in
//! [`crate::middleware`] and by the HTTP gateway.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ledger::{
    LedgerReader, LedgerStore, RelationNames, RetryPolicy, TransferExecutor, TransferReceipt,
    WalletError,
};

/// Funds transfer service.
///
/// Implementations must be safe to call concurrently; every call runs to
/// completion (including conflict retries) before returning.
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Formatted records of the accounts or transfers relation
    async fn list_ledger(&self, kind: &str) -> Result<Vec<String>, WalletError>;

    /// Move `amount` from `from` to `to`
    async fn transfer(&self, from: &str, to: &str, amount: &str)
    -> Result<TransferReceipt, WalletError>;
}

/// Store-backed [`WalletService`].
pub struct Wallet {
    reader: LedgerReader,
    executor: TransferExecutor,
}

impl Wallet {
    pub fn new(store: Arc<dyn LedgerStore>, names: RelationNames, policy: RetryPolicy) -> Self {
        Self {
            reader: LedgerReader::new(Arc::clone(&store), names, policy.clone()),
            executor: TransferExecutor::new(store, policy),
        }
    }
}

#[async_trait]
impl WalletService for Wallet {
    async fn list_ledger(&self, kind: &str) -> Result<Vec<String>, WalletError> {
        self.reader.list(kind).await
    }

    async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: &str,
    ) -> Result<TransferReceipt, WalletError> {
        self.executor.transfer(from, to, amount).await
    }
}
