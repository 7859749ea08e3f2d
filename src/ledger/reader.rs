//! Ledger Reader
//!
//! Lists the accounts or the transfer history under a consistent snapshot.
//! Each attempt runs in its own serializable transaction holding the accounts
//! relation lock, so a listing never observes half of a concurrent transfer,
//! even when it only reads transfers.

use std::sync::Arc;

use tracing::{debug, warn};

use super::error::WalletError;
use super::retry::{RetryPolicy, run_with_retry};
use super::store::{LedgerStore, LedgerTx, RelationNames, settle};
use super::types::{Account, LedgerKind, TransferRecord};

pub struct LedgerReader {
    store: Arc<dyn LedgerStore>,
    names: RelationNames,
    policy: RetryPolicy,
}

impl LedgerReader {
    pub fn new(store: Arc<dyn LedgerStore>, names: RelationNames, policy: RetryPolicy) -> Self {
        Self {
            store,
            names,
            policy,
        }
    }

    /// Formatted records of the relation named `kind`.
    ///
    /// A name matching neither relation is served as a transfers listing.
    pub async fn list(&self, kind: &str) -> Result<Vec<String>, WalletError> {
        let (resolved, recognized) =
            LedgerKind::resolve(kind, &self.names.accounts, &self.names.transfers);
        if !recognized {
            warn!(
                requested = kind,
                served = %resolved,
                "Unknown ledger relation, serving transfers"
            );
        }

        run_with_retry(&self.policy, "list_ledger", move |attempt| {
            self.attempt(resolved, attempt)
        })
        .await
    }

    async fn attempt(&self, kind: LedgerKind, attempt: u32) -> Result<Vec<String>, WalletError> {
        debug!(%kind, attempt, "Ledger read attempt");
        let mut tx = self.store.begin().await?;
        let outcome = read_in_tx(tx.as_mut(), kind).await;
        settle(tx, outcome).await
    }
}

async fn read_in_tx(tx: &mut dyn LedgerTx, kind: LedgerKind) -> Result<Vec<String>, WalletError> {
    tx.set_serializable().await?;
    tx.lock_accounts().await?;

    match kind {
        LedgerKind::Accounts => {
            let accounts = tx.list_accounts().await?;
            if accounts.is_empty() {
                return Err(WalletError::NoAccountsDefined);
            }
            Ok(accounts.iter().map(Account::to_record).collect())
        }
        LedgerKind::Transfers => {
            let transfers = tx.list_transfers().await?;
            if transfers.is_empty() {
                return Err(WalletError::NoTransfersDefined);
            }
            Ok(transfers.iter().map(TransferRecord::to_record).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::error::StoreErrorKind;
    use crate::ledger::memory::{InMemoryLedgerStore, StoreOp};
    use rust_decimal_macros::dec;

    fn reader(store: &InMemoryLedgerStore) -> LedgerReader {
        LedgerReader::new(
            Arc::new(store.clone()),
            RelationNames::default(),
            RetryPolicy::unbounded(),
        )
    }

    #[tokio::test]
    async fn test_accounts_are_ordered_by_id() {
        let store = InMemoryLedgerStore::with_accounts([
            Account::new("carol789", dec!(5), "EUR"),
            Account::new("alice456", dec!(50), "USD"),
            Account::new("bob123", dec!(100), "USD"),
        ]);

        let records = reader(&store).list("Accounts").await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].starts_with("Account: alice456 "));
        assert!(records[1].starts_with("Account: bob123 "));
        assert!(records[2].starts_with("Account: carol789 "));
        assert_eq!(store.stats().open, 0);
    }

    #[tokio::test]
    async fn test_empty_relations_are_distinguished() {
        let store = InMemoryLedgerStore::new();
        let reader = reader(&store);
        assert!(matches!(
            reader.list("Accounts").await,
            Err(WalletError::NoAccountsDefined)
        ));
        assert!(matches!(
            reader.list("Transfers").await,
            Err(WalletError::NoTransfersDefined)
        ));
        assert_eq!(store.stats().rolled_back, 2);
    }

    #[tokio::test]
    async fn test_unknown_kind_served_as_transfers() {
        let store = InMemoryLedgerStore::with_accounts([Account::new("bob123", dec!(1), "USD")]);
        assert!(matches!(
            reader(&store).list("Payments").await,
            Err(WalletError::NoTransfersDefined)
        ));
    }

    #[tokio::test]
    async fn test_conflicting_read_is_retried() {
        let store = InMemoryLedgerStore::with_accounts([Account::new("bob123", dec!(1), "USD")]);
        store.inject_fault(StoreOp::ListAccounts, StoreErrorKind::Conflict, 3);

        let records = reader(&store).list("accounts").await.unwrap();
        assert_eq!(records.len(), 1);

        let stats = store.stats();
        assert_eq!(stats.begun, 4);
        assert_eq!(stats.rolled_back, 3);
        assert_eq!(stats.committed, 1);
        assert_eq!(stats.open, 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_terminal() {
        let store = InMemoryLedgerStore::with_accounts([Account::new("bob123", dec!(1), "USD")]);
        store.inject_fault(StoreOp::Lock, StoreErrorKind::Transient, 1);

        match reader(&store).list("Accounts").await {
            Err(WalletError::Store(e)) => assert_eq!(e.kind, StoreErrorKind::Transient),
            other => panic!("expected store error, got {:?}", other),
        }
        assert_eq!(store.stats().begun, 1);
        assert_eq!(store.stats().open, 0);
    }
}
