//! Wallet behavior against the in-memory ledger store
//!
//! Covers balance conservation, exactly-once recording, rejection paths,
//! conflict retry and concurrent callers without needing a live database.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use wallet_ledger::ledger::{
    Account, InMemoryLedgerStore, RelationNames, RetryPolicy, StoreErrorKind, StoreOp,
    TransferStatus, WalletError,
};
use wallet_ledger::middleware::{InstrumentedWallet, LoggingWallet, WalletMetrics};
use wallet_ledger::service::{Wallet, WalletService};

/// Helper: bob123 (100 USD), alice456 (50 USD), carol789 (75 EUR)
fn seeded_store() -> InMemoryLedgerStore {
    InMemoryLedgerStore::with_accounts([
        Account::new("bob123", dec!(100), "USD"),
        Account::new("alice456", dec!(50), "USD"),
        Account::new("carol789", dec!(75), "EUR"),
    ])
}

fn wallet_with(store: &InMemoryLedgerStore, policy: RetryPolicy) -> Wallet {
    Wallet::new(Arc::new(store.clone()), RelationNames::default(), policy)
}

fn wallet(store: &InMemoryLedgerStore) -> Wallet {
    wallet_with(store, RetryPolicy::default())
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(max_attempts)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(2))
}

// ========================================================================
// Scenario
// ========================================================================

#[tokio::test]
async fn test_bob_pays_alice_then_alice_overdraws() {
    let store = seeded_store();
    let wallet = wallet(&store);

    let receipt = wallet.transfer("bob123", "alice456", "30").await.unwrap();
    assert_eq!(receipt.status, TransferStatus::Success);
    assert_eq!(store.balance_of("bob123"), Some(dec!(70)));
    assert_eq!(store.balance_of("alice456"), Some(dec!(80)));
    assert_eq!(store.transfers().len(), 1);

    let err = wallet
        .transfer("alice456", "bob123", "1000")
        .await
        .unwrap_err();
    match err {
        WalletError::InsufficientBalance {
            account,
            balance,
            requested,
        } => {
            assert_eq!(account, "alice456");
            assert_eq!(balance, dec!(80));
            assert_eq!(requested, dec!(1000));
        }
        other => panic!("expected InsufficientBalance, got {:?}", other),
    }
    assert_eq!(store.balance_of("bob123"), Some(dec!(70)));
    assert_eq!(store.balance_of("alice456"), Some(dec!(80)));
    assert_eq!(store.transfers().len(), 1);

    let transfers = wallet.list_ledger("Transfers").await.unwrap();
    assert_eq!(transfers.len(), 1);
    assert!(transfers[0].starts_with(
        "Transfer #1  from: bob123  to:  alice456 in the amount of 30.000000 USD at "
    ));
}

// ========================================================================
// Ledger invariants
// ========================================================================

#[tokio::test]
async fn test_conservation_and_exactly_once_recording() {
    let store = seeded_store();
    let wallet = wallet(&store);

    for (from, to, amount) in [
        ("bob123", "alice456", dec!(12.5)),
        ("alice456", "bob123", dec!(0.000001)),
        ("bob123", "alice456", dec!(87.5)),
    ] {
        let before_from = store.balance_of(from).unwrap();
        let before_to = store.balance_of(to).unwrap();
        let records_before = store.transfers().len();

        let receipt = wallet
            .transfer(from, to, &amount.to_string())
            .await
            .unwrap();

        let after_from = store.balance_of(from).unwrap();
        let after_to = store.balance_of(to).unwrap();
        assert_eq!(after_from, before_from - amount);
        assert_eq!(after_to, before_to + amount);
        assert_eq!(after_from + after_to, before_from + before_to);

        let transfers = store.transfers();
        assert_eq!(transfers.len(), records_before + 1);
        let recorded = transfers.last().unwrap();
        assert_eq!(recorded.transfer_id, receipt.transfer_id);
        assert_eq!(recorded.from_account, from);
        assert_eq!(recorded.to_account, to);
        assert_eq!(recorded.amount, amount);
        assert_eq!(recorded.currency, "USD");
    }
}

#[tokio::test]
async fn test_self_transfer_rejected_for_any_input() {
    let store = seeded_store();
    let wallet = wallet(&store);

    for (account, amount) in [("bob123", "10"), ("nobody", "abc"), ("alice456", "-1")] {
        assert!(matches!(
            wallet.transfer(account, account, amount).await,
            Err(WalletError::SameAccount)
        ));
    }
    assert_eq!(store.stats().begun, 0);
    assert_eq!(store.balance_of("bob123"), Some(dec!(100)));
}

#[tokio::test]
async fn test_currency_mismatch_leaves_balances_unchanged() {
    let store = seeded_store();
    let wallet = wallet(&store);

    match wallet.transfer("bob123", "carol789", "10").await {
        Err(WalletError::CurrencyMismatch {
            from_currency,
            to_currency,
        }) => {
            assert_eq!(from_currency, "USD");
            assert_eq!(to_currency, "EUR");
        }
        other => panic!("expected CurrencyMismatch, got {:?}", other),
    }
    assert_eq!(store.balance_of("bob123"), Some(dec!(100)));
    assert_eq!(store.balance_of("carol789"), Some(dec!(75)));
    assert!(store.transfers().is_empty());
}

#[tokio::test]
async fn test_accounts_listing_is_ordered() {
    let store = seeded_store();
    let records = wallet(&store).list_ledger("Accounts").await.unwrap();
    assert_eq!(
        records,
        vec![
            "Account: alice456  Balance = 50.000000 USD  Initial Balance = 50.000000",
            "Account: bob123  Balance = 100.000000 USD  Initial Balance = 100.000000",
            "Account: carol789  Balance = 75.000000 EUR  Initial Balance = 75.000000",
        ]
    );
}

#[tokio::test]
async fn test_empty_ledger_and_unknown_relation() {
    let empty = InMemoryLedgerStore::new();
    let wallet = wallet(&empty);
    assert!(matches!(
        wallet.list_ledger("Accounts").await,
        Err(WalletError::NoAccountsDefined)
    ));
    assert!(matches!(
        wallet.list_ledger("Transfers").await,
        Err(WalletError::NoTransfersDefined)
    ));

    let store = seeded_store();
    let wallet = wallet_with(&store, RetryPolicy::default());
    wallet.transfer("bob123", "alice456", "1").await.unwrap();
    // Unknown relation names are served as the transfer history
    assert_eq!(
        wallet.list_ledger("Ledger").await.unwrap(),
        wallet.list_ledger("Transfers").await.unwrap()
    );
}

// ========================================================================
// Conflict retry
// ========================================================================

#[tokio::test]
async fn test_conflicts_are_absorbed_and_effects_discarded() {
    let store = seeded_store();
    let wallet = wallet_with(&store, RetryPolicy::unbounded());
    // Balance updates lose the race three times
    store.inject_fault(StoreOp::AdjustBalance, StoreErrorKind::Conflict, 3);

    let receipt = wallet.transfer("bob123", "alice456", "30").await.unwrap();
    assert!(receipt.attempts > 1);
    assert_eq!(store.balance_of("bob123"), Some(dec!(70)));
    assert_eq!(store.balance_of("alice456"), Some(dec!(80)));
    assert_eq!(store.transfers().len(), 1);

    let stats = store.stats();
    assert_eq!(stats.committed, 1);
    assert_eq!(stats.rolled_back, u64::from(receipt.attempts) - 1);
    assert_eq!(stats.open, 0);
}

#[tokio::test]
async fn test_exhausted_retries_is_terminal() {
    let store = seeded_store();
    let wallet = wallet_with(&store, fast_policy(3));
    store.inject_fault(StoreOp::Lock, StoreErrorKind::Conflict, 10);

    match wallet.transfer("bob123", "alice456", "30").await {
        Err(WalletError::ExhaustedRetries { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last.kind, StoreErrorKind::Conflict);
        }
        other => panic!("expected ExhaustedRetries, got {:?}", other),
    }
    assert_eq!(store.stats().begun, 3);
    assert_eq!(store.stats().open, 0);
    assert_eq!(store.balance_of("bob123"), Some(dec!(100)));

    store.clear_faults();
    wallet.transfer("bob123", "alice456", "30").await.unwrap();
}

#[tokio::test]
async fn test_non_conflict_failures_are_not_retried() {
    let store = seeded_store();
    let wallet = wallet_with(&store, RetryPolicy::unbounded());

    for (op, kind) in [
        (StoreOp::Begin, StoreErrorKind::Transient),
        (StoreOp::FetchAccount, StoreErrorKind::Fatal),
        (StoreOp::AppendTransfer, StoreErrorKind::ConstraintViolation),
        (StoreOp::Commit, StoreErrorKind::Transient),
    ] {
        store.inject_fault(op, kind, 1);
        match wallet.transfer("bob123", "alice456", "30").await {
            Err(WalletError::Store(e)) => assert_eq!(e.kind, kind, "{op:?}"),
            other => panic!("expected Store error for {op:?}, got {:?}", other),
        }
    }

    // Every attempt either never began or was rolled back
    let stats = store.stats();
    assert_eq!(stats.begun, 3);
    assert_eq!(stats.committed, 0);
    assert_eq!(stats.open, 0);
    assert_eq!(store.balance_of("bob123"), Some(dec!(100)));
    assert!(store.transfers().is_empty());
}

#[tokio::test]
async fn test_every_exit_path_releases_the_transaction() {
    let store = seeded_store();
    let wallet = wallet(&store);

    let _ = wallet.transfer("bob123", "alice456", "30").await;
    let _ = wallet.transfer("nobody", "alice456", "30").await;
    let _ = wallet.transfer("bob123", "nobody", "30").await;
    let _ = wallet.transfer("bob123", "alice456", "x").await;
    let _ = wallet.transfer("bob123", "alice456", "5000").await;
    let _ = wallet.transfer("bob123", "carol789", "1").await;
    let _ = wallet.list_ledger("Accounts").await;

    let stats = store.stats();
    assert_eq!(stats.open, 0);
    assert_eq!(stats.begun, stats.committed + stats.rolled_back);
}

// ========================================================================
// Concurrency
// ========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_round_trip_preserves_balances() {
    const N: usize = 20;
    let store = InMemoryLedgerStore::with_accounts([
        Account::new("x", dec!(100), "USD"),
        Account::new("y", dec!(100), "USD"),
    ]);
    let wallet = Arc::new(wallet(&store));

    let mut handles = Vec::with_capacity(N);
    for i in 0..N {
        let wallet = Arc::clone(&wallet);
        let (from, to) = if i % 2 == 0 { ("x", "y") } else { ("y", "x") };
        handles.push(tokio::spawn(async move {
            wallet.transfer(from, to, "10").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.balance_of("x"), Some(dec!(100)));
    assert_eq!(store.balance_of("y"), Some(dec!(100)));

    let transfers = store.transfers();
    assert_eq!(transfers.len(), N);
    let mut ids: Vec<i64> = transfers.iter().map(|t| t.transfer_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), N);
    assert_eq!(store.stats().open, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_drain_never_overdraws() {
    let store = InMemoryLedgerStore::with_accounts([
        Account::new("x", dec!(100), "USD"),
        Account::new("y", dec!(0), "USD"),
    ]);
    let wallet = Arc::new(wallet(&store));

    // 15 callers race for 10 withdrawals worth of funds
    let handles: Vec<_> = (0..15)
        .map(|_| {
            let wallet = Arc::clone(&wallet);
            tokio::spawn(async move { wallet.transfer("x", "y", "10").await })
        })
        .collect();

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(WalletError::InsufficientBalance { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }

    assert_eq!(ok, 10);
    assert_eq!(insufficient, 5);
    assert_eq!(store.balance_of("x"), Some(Decimal::ZERO));
    assert_eq!(store.balance_of("y"), Some(dec!(100)));
    assert_eq!(store.transfers().len(), 10);
}

// ========================================================================
// Decorators
// ========================================================================

#[tokio::test]
async fn test_decorated_wallet_behaves_like_core() {
    let store = seeded_store();
    let metrics = Arc::new(WalletMetrics::new());
    let wallet: Arc<dyn WalletService> = Arc::new(InstrumentedWallet::new(
        Arc::clone(&metrics),
        LoggingWallet::new(wallet(&store)),
    ));

    wallet.transfer("bob123", "alice456", "30").await.unwrap();
    assert!(matches!(
        wallet.transfer("alice456", "bob123", "1000").await,
        Err(WalletError::InsufficientBalance { .. })
    ));
    assert_eq!(wallet.list_ledger("Transfers").await.unwrap().len(), 1);

    assert_eq!(metrics.request_count("transfer", false), 1);
    assert_eq!(metrics.request_count("transfer", true), 1);
    assert_eq!(metrics.request_count("list_ledger", false), 1);
    assert_eq!(store.balance_of("bob123"), Some(dec!(70)));
}
