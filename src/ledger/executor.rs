//! Transfer Executor
//!
//! One attempt is a read-validate-mutate-commit cycle inside a serializable
//! transaction holding the accounts relation lock:
//!
//! 1. read source balance and currency
//! 2. parse and check the amount against the balance
//! 3. read destination currency and compare
//! 4. debit, credit, append the transfer record
//! 5. commit
//!
//! A serialization conflict anywhere discards the attempt and restarts it.
//! Every other failure rolls back and is returned to the caller.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::error::{StoreErrorKind, WalletError};
use super::retry::{RetryPolicy, run_with_retry};
use super::store::{LedgerStore, LedgerTx, settle};
use super::types::{NewTransfer, TransferReceipt, TransferStatus, parse_amount};

pub struct TransferExecutor {
    store: Arc<dyn LedgerStore>,
    policy: RetryPolicy,
}

impl TransferExecutor {
    pub fn new(store: Arc<dyn LedgerStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Move `amount` from one account to another.
    pub async fn transfer(
        &self,
        from: &str,
        to: &str,
        amount: &str,
    ) -> Result<TransferReceipt, WalletError> {
        if from == to {
            return Err(WalletError::SameAccount);
        }

        let receipt = run_with_retry(&self.policy, "transfer", move |attempt| {
            self.attempt(from, to, amount, attempt)
        })
        .await?;

        info!(
            transfer_id = receipt.transfer_id,
            from = %receipt.from_account,
            to = %receipt.to_account,
            amount = %receipt.amount,
            currency = %receipt.currency,
            attempts = receipt.attempts,
            "Transfer committed"
        );
        Ok(receipt)
    }

    async fn attempt(
        &self,
        from: &str,
        to: &str,
        amount: &str,
        attempt: u32,
    ) -> Result<TransferReceipt, WalletError> {
        debug!(from, to, amount, attempt, "Transfer attempt");
        let mut tx = self.store.begin().await?;
        let outcome = transfer_in_tx(tx.as_mut(), from, to, amount, attempt).await;
        settle(tx, outcome).await
    }
}

async fn transfer_in_tx(
    tx: &mut dyn LedgerTx,
    from: &str,
    to: &str,
    raw_amount: &str,
    attempt: u32,
) -> Result<TransferReceipt, WalletError> {
    tx.set_serializable().await?;
    tx.lock_accounts().await?;

    let (balance, from_currency) = tx
        .fetch_balance(from)
        .await?
        .ok_or_else(|| WalletError::SourceNotFound(from.to_string()))?;

    let amount = parse_amount(raw_amount)?;
    if balance < amount {
        return Err(WalletError::InsufficientBalance {
            account: from.to_string(),
            balance,
            requested: amount,
        });
    }

    let to_currency = tx
        .fetch_currency(to)
        .await?
        .ok_or_else(|| WalletError::DestinationNotFound(to.to_string()))?;
    if from_currency != to_currency {
        return Err(WalletError::CurrencyMismatch {
            from_currency,
            to_currency,
        });
    }

    debit(tx, from, balance, amount).await?;
    if tx.adjust_balance(to, amount).await? == 0 {
        return Err(WalletError::DestinationNotFound(to.to_string()));
    }

    let timestamp = Utc::now();
    let transfer_id = tx
        .append_transfer(&NewTransfer {
            from_account: from.to_string(),
            to_account: to.to_string(),
            amount,
            currency: from_currency.clone(),
            timestamp,
        })
        .await?;

    Ok(TransferReceipt {
        status: TransferStatus::Success,
        transfer_id,
        from_account: from.to_string(),
        to_account: to.to_string(),
        amount,
        currency: from_currency,
        timestamp,
        attempts: attempt,
    })
}

/// Debit `account`. A balance check violation raised by the store is
/// reported as insufficient balance.
async fn debit(
    tx: &mut dyn LedgerTx,
    account: &str,
    balance: Decimal,
    amount: Decimal,
) -> Result<(), WalletError> {
    match tx.adjust_balance(account, -amount).await {
        Ok(0) => Err(WalletError::SourceNotFound(account.to_string())),
        Ok(_) => Ok(()),
        Err(e) if e.kind == StoreErrorKind::ConstraintViolation => {
            Err(WalletError::InsufficientBalance {
                account: account.to_string(),
                balance,
                requested: amount,
            })
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::error::StoreError;
    use crate::ledger::memory::{InMemoryLedgerStore, StoreOp};
    use crate::ledger::types::Account;
    use rust_decimal_macros::dec;

    fn seeded() -> InMemoryLedgerStore {
        InMemoryLedgerStore::with_accounts([
            Account::new("bob123", dec!(100), "USD"),
            Account::new("alice456", dec!(50), "USD"),
            Account::new("carol789", dec!(20), "EUR"),
        ])
    }

    fn executor(store: &InMemoryLedgerStore) -> TransferExecutor {
        TransferExecutor::new(Arc::new(store.clone()), RetryPolicy::unbounded())
    }

    #[tokio::test]
    async fn test_successful_transfer() {
        let store = seeded();
        let receipt = executor(&store)
            .transfer("bob123", "alice456", "30")
            .await
            .unwrap();

        assert_eq!(receipt.status, TransferStatus::Success);
        assert_eq!(receipt.amount, dec!(30));
        assert_eq!(receipt.currency, "USD");
        assert_eq!(receipt.attempts, 1);
        assert_eq!(store.balance_of("bob123"), Some(dec!(70)));
        assert_eq!(store.balance_of("alice456"), Some(dec!(80)));

        let transfers = store.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].transfer_id, receipt.transfer_id);
    }

    #[tokio::test]
    async fn test_same_account_never_touches_store() {
        let store = seeded();
        assert!(matches!(
            executor(&store).transfer("bob123", "bob123", "1").await,
            Err(WalletError::SameAccount)
        ));
        assert_eq!(store.stats().begun, 0);
    }

    #[tokio::test]
    async fn test_validation_order() {
        let store = seeded();
        let exec = executor(&store);

        // Missing source is reported before the amount is looked at
        assert!(matches!(
            exec.transfer("nobody", "alice456", "abc").await,
            Err(WalletError::SourceNotFound(id)) if id == "nobody"
        ));
        assert!(matches!(
            exec.transfer("bob123", "alice456", "abc").await,
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            exec.transfer("bob123", "alice456", "-3").await,
            Err(WalletError::InvalidAmount(_))
        ));
        // Balance is checked before the destination
        assert!(matches!(
            exec.transfer("bob123", "nobody", "1000").await,
            Err(WalletError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            exec.transfer("bob123", "nobody", "10").await,
            Err(WalletError::DestinationNotFound(id)) if id == "nobody"
        ));
        assert!(matches!(
            exec.transfer("bob123", "carol789", "10").await,
            Err(WalletError::CurrencyMismatch { .. })
        ));

        assert_eq!(store.balance_of("bob123"), Some(dec!(100)));
        assert!(store.transfers().is_empty());
        assert_eq!(store.stats().committed, 0);
        assert_eq!(store.stats().open, 0);
    }

    #[tokio::test]
    async fn test_whole_balance_can_be_moved() {
        let store = seeded();
        executor(&store)
            .transfer("alice456", "bob123", "50")
            .await
            .unwrap();
        assert_eq!(store.balance_of("alice456"), Some(dec!(0)));
        assert_eq!(store.balance_of("bob123"), Some(dec!(150)));
    }

    #[tokio::test]
    async fn test_debit_constraint_maps_to_insufficient_balance() {
        let store = seeded();
        store.inject_fault(StoreOp::AdjustBalance, StoreErrorKind::ConstraintViolation, 1);

        assert!(matches!(
            executor(&store).transfer("bob123", "alice456", "10").await,
            Err(WalletError::InsufficientBalance { .. })
        ));
        assert_eq!(store.balance_of("bob123"), Some(dec!(100)));
    }

    #[tokio::test]
    async fn test_conflict_on_commit_restarts_attempt() {
        let store = seeded();
        store.inject_fault(StoreOp::Commit, StoreErrorKind::Conflict, 2);

        let receipt = executor(&store)
            .transfer("bob123", "alice456", "30")
            .await
            .unwrap();
        assert_eq!(receipt.attempts, 3);
        assert_eq!(store.balance_of("bob123"), Some(dec!(70)));
        assert_eq!(store.transfers().len(), 1);
        // Sequence values consumed by the discarded attempts are not reused
        assert_eq!(receipt.transfer_id, 3);
    }

    #[tokio::test]
    async fn test_append_failure_rolls_back_debit_and_credit() {
        let store = seeded();
        store.inject_fault(StoreOp::AppendTransfer, StoreErrorKind::Fatal, 1);

        let err = executor(&store)
            .transfer("bob123", "alice456", "30")
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Store(StoreError { kind: StoreErrorKind::Fatal, .. })));
        assert_eq!(store.balance_of("bob123"), Some(dec!(100)));
        assert_eq!(store.balance_of("alice456"), Some(dec!(50)));
        assert_eq!(store.stats().open, 0);
    }
}
