//! Facade decorators
//!
//! Each decorator wraps any [`WalletService`](crate::service::WalletService)
//! and is itself one, so layers compose:
//!
//! ```text
//! InstrumentedWallet(LoggingWallet(Wallet))
//! ```

pub mod instrumentation;
pub mod logging;
pub mod metrics;

pub use instrumentation::InstrumentedWallet;
pub use logging::LoggingWallet;
pub use metrics::WalletMetrics;

/// Method label for `list_ledger` calls
pub const METHOD_LIST_LEDGER: &str = "list_ledger";
/// Method label for `transfer` calls
pub const METHOD_TRANSFER: &str = "transfer";
