//! Ledger core
//!
//! Account balances and the append-only transfer history, kept consistent
//! under concurrent callers by the transactional store behind [`LedgerStore`].

pub mod conflict;
pub mod error;
pub mod executor;
pub mod memory;
pub mod postgres;
pub mod reader;
pub mod retry;
pub mod store;
pub mod types;

pub use conflict::{Classification, classify};
pub use error::{ErrorCategory, StoreError, StoreErrorKind, WalletError};
pub use executor::TransferExecutor;
pub use memory::{InMemoryLedgerStore, StoreOp, TxStats};
pub use postgres::PgLedgerStore;
pub use reader::LedgerReader;
pub use retry::RetryPolicy;
pub use store::{LedgerStore, LedgerTx, RelationNames};
pub use types::{AMOUNT_SCALE, Account, LedgerKind, NewTransfer, TransferReceipt, TransferRecord, TransferStatus};
