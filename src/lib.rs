//! Wallet ledger service
//!
//! Per-account balances and an append-only transfer history on a shared
//! transactional store, safe under concurrent callers and any number of
//! service replicas.
//!
//! # Modules
//!
//! - [`ledger`] - Ledger core: store port and adapters, reader, executor, retry
//! - [`service`] - `WalletService` facade
//! - [`middleware`] - Logging and instrumentation decorators
//! - [`gateway`] - HTTP transport
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod middleware;
pub mod service;

pub use ledger::{
    Account, LedgerStore, RetryPolicy, TransferReceipt, TransferRecord, TransferStatus,
    WalletError,
};
pub use service::{Wallet, WalletService};
