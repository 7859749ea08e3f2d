//! Ledger Error Types
//!
//! Two layers:
//! - [`StoreError`]: what a store adapter reports, already classified by kind
//! - [`WalletError`]: what the wallet facade reports to its callers

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use super::conflict::{Classification, classify};

/// Structured classification of a store failure.
///
/// Adapters map their native errors onto these kinds so the retry loop never
/// has to look at store-specific error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// Serialization failure: the transaction lost a race and may be retried
    Conflict,
    /// A row the statement required does not exist
    NotFound,
    /// A CHECK / UNIQUE / FK constraint rejected the statement
    ConstraintViolation,
    /// Connectivity, pool exhaustion, deadlock, lock timeout, admin shutdown
    Transient,
    /// Anything else
    Fatal,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::Conflict => "conflict",
            StoreErrorKind::NotFound => "not found",
            StoreErrorKind::ConstraintViolation => "constraint violation",
            StoreErrorKind::Transient => "transient",
            StoreErrorKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store failure with its classification and the underlying detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("store {kind} error: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
    /// SQLSTATE reported by the database, when there is one
    pub sql_state: Option<String>,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql_state: None,
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Conflict, message)
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::ConstraintViolation, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Transient, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Fatal, message)
    }
}

/// Coarse grouping of wallet errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    BusinessRule,
    Conflict,
    Infrastructure,
}

/// Wallet facade error types
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    // === Validation Errors ===
    #[error("the source account is the same as the destination account")]
    SameAccount,

    #[error("invalid transfer amount: {0}")]
    InvalidAmount(String),

    // === Not Found Errors ===
    #[error("the source account {0} does not exist")]
    SourceNotFound(String),

    #[error("the destination account {0} does not exist")]
    DestinationNotFound(String),

    #[error("there are no defined accounts")]
    NoAccountsDefined,

    #[error("there are no defined transfers")]
    NoTransfersDefined,

    // === Business Rule Errors ===
    #[error("balance of account {account} ({balance}) is insufficient for a transfer of {requested}")]
    InsufficientBalance {
        account: String,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("currency mismatch: source account holds {from_currency}, destination holds {to_currency}")]
    CurrencyMismatch {
        from_currency: String,
        to_currency: String,
    },

    // === Conflict (absorbed by the retry loop) ===
    #[error("serialization conflict: {0}")]
    Conflict(StoreError),

    #[error("gave up after {attempts} conflicting attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: StoreError },

    // === Infrastructure ===
    #[error("{0}")]
    Store(StoreError),
}

impl WalletError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::SameAccount => "SAME_ACCOUNT",
            WalletError::InvalidAmount(_) => "INVALID_AMOUNT",
            WalletError::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            WalletError::DestinationNotFound(_) => "DESTINATION_NOT_FOUND",
            WalletError::NoAccountsDefined => "NO_ACCOUNTS_DEFINED",
            WalletError::NoTransfersDefined => "NO_TRANSFERS_DEFINED",
            WalletError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            WalletError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            WalletError::Conflict(_) => "CONFLICT",
            WalletError::ExhaustedRetries { .. } => "EXHAUSTED_RETRIES",
            WalletError::Store(_) => "STORE_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            WalletError::SameAccount | WalletError::InvalidAmount(_) => ErrorCategory::Validation,
            WalletError::SourceNotFound(_)
            | WalletError::DestinationNotFound(_)
            | WalletError::NoAccountsDefined
            | WalletError::NoTransfersDefined => ErrorCategory::NotFound,
            WalletError::InsufficientBalance { .. } | WalletError::CurrencyMismatch { .. } => {
                ErrorCategory::BusinessRule
            }
            WalletError::Conflict(_) => ErrorCategory::Conflict,
            WalletError::ExhaustedRetries { .. } | WalletError::Store(_) => {
                ErrorCategory::Infrastructure
            }
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            WalletError::SameAccount | WalletError::InvalidAmount(_) => 400,
            WalletError::SourceNotFound(_)
            | WalletError::DestinationNotFound(_)
            | WalletError::NoAccountsDefined
            | WalletError::NoTransfersDefined => 404,
            WalletError::InsufficientBalance { .. } | WalletError::CurrencyMismatch { .. } => 422,
            WalletError::Conflict(_) => 409,
            WalletError::ExhaustedRetries { .. } => 503,
            WalletError::Store(e) if e.kind == StoreErrorKind::Transient => 503,
            WalletError::Store(_) => 500,
        }
    }

    #[inline]
    pub fn is_conflict(&self) -> bool {
        matches!(self, WalletError::Conflict(_))
    }
}

impl From<StoreError> for WalletError {
    fn from(e: StoreError) -> Self {
        match classify(&e) {
            Classification::Conflict => WalletError::Conflict(e),
            Classification::Terminal => WalletError::Store(e),
        }
    }
}
