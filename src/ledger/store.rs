//! Transactional store port
//!
//! The ledger core depends only on these traits. Adapters:
//! - [`PgLedgerStore`](super::postgres::PgLedgerStore) for PostgreSQL
//! - [`InMemoryLedgerStore`](super::memory::InMemoryLedgerStore) for tests and local runs

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;

use super::error::{StoreError, WalletError};
use super::types::{Account, LedgerKind, NewTransfer, TransferRecord};

/// Names of the relations and the sequence the ledger works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationNames {
    pub accounts: String,
    pub transfers: String,
    pub transfer_sequence: String,
}

impl Default for RelationNames {
    fn default() -> Self {
        Self {
            accounts: "accounts".to_string(),
            transfers: "transfers".to_string(),
            transfer_sequence: "payment_counter".to_string(),
        }
    }
}

impl RelationNames {
    /// Configured name of the relation a listing of `kind` reads
    pub fn relation(&self, kind: LedgerKind) -> &str {
        match kind {
            LedgerKind::Accounts => &self.accounts,
            LedgerKind::Transfers => &self.transfers,
        }
    }
}

/// Source of ledger transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction on its own connection
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;

    /// Check store health
    async fn ping(&self) -> Result<(), StoreError>;
}

/// One open store transaction.
///
/// Dropping a transaction that was neither committed nor rolled back rolls it
/// back and releases its connection and locks.
#[async_trait]
pub trait LedgerTx: Send {
    /// Switch the transaction to serializable isolation
    async fn set_serializable(&mut self) -> Result<(), StoreError>;

    /// Take the self-exclusive intent lock on the accounts relation for the
    /// rest of the transaction
    async fn lock_accounts(&mut self) -> Result<(), StoreError>;

    /// Balance and currency of an account
    async fn fetch_balance(&mut self, account_id: &str)
    -> Result<Option<(Decimal, String)>, StoreError>;

    /// Currency of an account
    async fn fetch_currency(&mut self, account_id: &str) -> Result<Option<String>, StoreError>;

    /// Add `delta` (may be negative) to an account balance, returns rows affected
    async fn adjust_balance(&mut self, account_id: &str, delta: Decimal)
    -> Result<u64, StoreError>;

    /// Append a transfer record, returns the store-assigned transfer id
    async fn append_transfer(&mut self, transfer: &NewTransfer) -> Result<i64, StoreError>;

    /// All accounts, ascending by account id
    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError>;

    /// All transfers, in store-assigned order
    async fn list_transfers(&mut self) -> Result<Vec<TransferRecord>, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// End a transaction according to the outcome of the work done in it.
///
/// `Ok` commits; a failing commit is reported through the classifier so a
/// serialization failure at commit time is retried like any other. `Err`
/// rolls back and returns the original error.
pub async fn settle<T>(
    mut tx: Box<dyn LedgerTx>,
    outcome: Result<T, WalletError>,
) -> Result<T, WalletError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed, connection discarded");
            }
            Err(e)
        }
    }
}
