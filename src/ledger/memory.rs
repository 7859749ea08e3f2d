//! In-memory ledger store
//!
//! Behaves like the PostgreSQL adapter as far as the wallet can observe:
//! - the accounts relation lock is a single async mutex held until the
//!   transaction ends
//! - writes are staged on a private snapshot and published on commit; a
//!   commit whose snapshot went stale fails with a serialization conflict
//! - negative balances are rejected like a CHECK constraint
//! - transfer ids come from a sequence that is not rolled back
//!
//! Faults can be injected per operation so tests can drive the retry loop.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::OwnedMutexGuard;

use super::error::{StoreError, StoreErrorKind};
use super::store::{LedgerStore, LedgerTx};
use super::types::{Account, NewTransfer, TransferRecord};

/// Store operation a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Begin,
    Ping,
    SetSerializable,
    Lock,
    FetchAccount,
    AdjustBalance,
    AppendTransfer,
    ListAccounts,
    ListTransfers,
    Commit,
}

/// Transaction counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    /// Transactions neither committed, rolled back nor dropped
    pub open: u64,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<String, Account>,
    transfers: Vec<TransferRecord>,
    /// Bumped by every published write
    version: u64,
}

#[derive(Debug)]
struct Fault {
    kind: StoreErrorKind,
    remaining: u32,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<LedgerState>,
    relation_lock: Arc<tokio::sync::Mutex<()>>,
    next_transfer_id: AtomicI64,
    faults: Mutex<HashMap<StoreOp, Fault>>,
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    open: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn take_fault(&self, op: StoreOp) -> Result<(), StoreError> {
        let mut faults = lock(&self.faults);
        let Some(fault) = faults.get_mut(&op) else {
            return Ok(());
        };
        fault.remaining -= 1;
        let kind = fault.kind;
        if fault.remaining == 0 {
            faults.remove(&op);
        }
        Err(injected(kind, op))
    }
}

fn injected(kind: StoreErrorKind, op: StoreOp) -> StoreError {
    let err = StoreError::new(kind, format!("injected {kind} fault on {op:?}"));
    match kind {
        StoreErrorKind::Conflict => err.with_sql_state("40001"),
        StoreErrorKind::ConstraintViolation => err.with_sql_state("23514"),
        StoreErrorKind::Transient => err.with_sql_state("08006"),
        _ => err,
    }
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LedgerState::default()),
                relation_lock: Arc::new(tokio::sync::Mutex::new(())),
                next_transfer_id: AtomicI64::new(1),
                faults: Mutex::new(HashMap::new()),
                begun: AtomicU64::new(0),
                committed: AtomicU64::new(0),
                rolled_back: AtomicU64::new(0),
                open: AtomicU64::new(0),
            }),
        }
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let store = Self::new();
        for account in accounts {
            store.insert_account(account);
        }
        store
    }

    /// Insert or replace an account outside any transaction
    pub fn insert_account(&self, account: Account) {
        let mut state = lock(&self.shared.state);
        state.accounts.insert(account.account_id.clone(), account);
        state.version += 1;
    }

    pub fn balance_of(&self, account_id: &str) -> Option<Decimal> {
        lock(&self.shared.state)
            .accounts
            .get(account_id)
            .map(|a| a.balance)
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        lock(&self.shared.state).transfers.clone()
    }

    /// Fail the next `times` calls of `op` with an error of `kind`
    pub fn inject_fault(&self, op: StoreOp, kind: StoreErrorKind, times: u32) {
        let mut faults = lock(&self.shared.faults);
        if times == 0 {
            faults.remove(&op);
        } else {
            faults.insert(
                op,
                Fault {
                    kind,
                    remaining: times,
                },
            );
        }
    }

    pub fn clear_faults(&self) {
        lock(&self.shared.faults).clear();
    }

    pub fn stats(&self) -> TxStats {
        TxStats {
            begun: self.shared.begun.load(Ordering::SeqCst),
            committed: self.shared.committed.load(Ordering::SeqCst),
            rolled_back: self.shared.rolled_back.load(Ordering::SeqCst),
            open: self.shared.open.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        self.shared.take_fault(StoreOp::Begin)?;
        self.shared.begun.fetch_add(1, Ordering::SeqCst);
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryLedgerTx {
            shared: Arc::clone(&self.shared),
            relation_guard: None,
            staged: None,
            finished: false,
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.shared.take_fault(StoreOp::Ping)
    }
}

/// Private working copy of the ledger.
#[derive(Debug)]
struct Staged {
    base_version: u64,
    state: LedgerState,
    dirty: bool,
}

/// Open in-memory transaction.
pub struct InMemoryLedgerTx {
    shared: Arc<Shared>,
    relation_guard: Option<OwnedMutexGuard<()>>,
    staged: Option<Staged>,
    finished: bool,
}

impl InMemoryLedgerTx {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.finished {
            Err(StoreError::fatal("transaction already finished"))
        } else {
            Ok(())
        }
    }

    /// Snapshot taken by the first statement that touches data
    fn staged(&mut self) -> &mut Staged {
        let shared = &self.shared;
        self.staged.get_or_insert_with(|| {
            let state = lock(&shared.state).clone();
            Staged {
                base_version: state.version,
                state,
                dirty: false,
            }
        })
    }

    fn finish(&mut self, committed: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.staged = None;
        self.relation_guard = None;
        if committed {
            self.shared.committed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.shared.rolled_back.fetch_add(1, Ordering::SeqCst);
        }
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for InMemoryLedgerTx {
    fn drop(&mut self) {
        self.finish(false);
    }
}

#[async_trait]
impl LedgerTx for InMemoryLedgerTx {
    async fn set_serializable(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.shared.take_fault(StoreOp::SetSerializable)?;
        if self.staged.is_some() || self.relation_guard.is_some() {
            return Err(StoreError::fatal(
                "SET TRANSACTION ISOLATION LEVEL must be called before any query",
            )
            .with_sql_state("25001"));
        }
        Ok(())
    }

    async fn lock_accounts(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.shared.take_fault(StoreOp::Lock)?;
        if self.relation_guard.is_none() {
            let guard = Arc::clone(&self.shared.relation_lock).lock_owned().await;
            self.relation_guard = Some(guard);
        }
        Ok(())
    }

    async fn fetch_balance(
        &mut self,
        account_id: &str,
    ) -> Result<Option<(Decimal, String)>, StoreError> {
        self.ensure_open()?;
        self.shared.take_fault(StoreOp::FetchAccount)?;
        Ok(self
            .staged()
            .state
            .accounts
            .get(account_id)
            .map(|a| (a.balance, a.currency.clone())))
    }

    async fn fetch_currency(&mut self, account_id: &str) -> Result<Option<String>, StoreError> {
        self.ensure_open()?;
        self.shared.take_fault(StoreOp::FetchAccount)?;
        Ok(self
            .staged()
            .state
            .accounts
            .get(account_id)
            .map(|a| a.currency.clone()))
    }

    async fn adjust_balance(&mut self, account_id: &str, delta: Decimal) -> Result<u64, StoreError> {
        self.ensure_open()?;
        self.shared.take_fault(StoreOp::AdjustBalance)?;
        let staged = self.staged();
        let Some(account) = staged.state.accounts.get_mut(account_id) else {
            return Ok(0);
        };
        let updated = account.balance + delta;
        if updated < Decimal::ZERO {
            return Err(StoreError::constraint(format!(
                "new row for account {account_id} violates check constraint \"balance_nonnegative\""
            ))
            .with_sql_state("23514"));
        }
        account.balance = updated;
        staged.dirty = true;
        Ok(1)
    }

    async fn append_transfer(&mut self, transfer: &NewTransfer) -> Result<i64, StoreError> {
        self.ensure_open()?;
        self.shared.take_fault(StoreOp::AppendTransfer)?;
        let transfer_id = self.shared.next_transfer_id.fetch_add(1, Ordering::SeqCst);
        let staged = self.staged();
        staged.state.transfers.push(TransferRecord {
            transfer_id,
            from_account: transfer.from_account.clone(),
            to_account: transfer.to_account.clone(),
            amount: transfer.amount,
            currency: transfer.currency.clone(),
            timestamp: transfer.timestamp,
        });
        staged.dirty = true;
        Ok(transfer_id)
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        self.ensure_open()?;
        self.shared.take_fault(StoreOp::ListAccounts)?;
        Ok(self.staged().state.accounts.values().cloned().collect())
    }

    async fn list_transfers(&mut self) -> Result<Vec<TransferRecord>, StoreError> {
        self.ensure_open()?;
        self.shared.take_fault(StoreOp::ListTransfers)?;
        let mut transfers = self.staged().state.transfers.clone();
        transfers.sort_by_key(|t| t.transfer_id);
        Ok(transfers)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        if let Err(e) = self.shared.take_fault(StoreOp::Commit) {
            self.finish(false);
            return Err(e);
        }

        let published = match self.staged.take().filter(|s| s.dirty) {
            Some(staged) => {
                let mut state = lock(&self.shared.state);
                if state.version == staged.base_version {
                    state.accounts = staged.state.accounts;
                    state.transfers = staged.state.transfers;
                    state.version += 1;
                    true
                } else {
                    false
                }
            }
            None => true,
        };

        self.finish(published);
        if published {
            Ok(())
        } else {
            Err(StoreError::conflict(
                "could not serialize access due to read/write dependencies among transactions",
            )
            .with_sql_state("40001"))
        }
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.finish(false);
        Ok(())
    }
}
