//! Ledger domain types
//!
//! Rows of the two relations, the transfer receipt returned to callers and
//! the human-readable record format used by ledger listings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::WalletError;

/// Row of the accounts relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub balance: Decimal,
    pub currency: String,
    /// Historical reference value, never mutated
    pub initial_balance: Decimal,
}

impl Account {
    pub fn new(account_id: impl Into<String>, balance: Decimal, currency: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            balance,
            currency: currency.into(),
            initial_balance: balance,
        }
    }

    /// Listing record, e.g.
    /// `Account: bob123  Balance = 70.000000 USD  Initial Balance = 100.000000`
    pub fn to_record(&self) -> String {
        format!(
            "Account: {}  Balance = {:.6} {}  Initial Balance = {:.6}",
            self.account_id, self.balance, self.currency, self.initial_balance
        )
    }
}

/// Row of the transfers relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub transfer_id: i64,
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

impl TransferRecord {
    /// Listing record, e.g.
    /// `Transfer #1  from: bob123  to:  alice456 in the amount of 30.000000 USD at 2024-05-01T10:00:00Z`
    pub fn to_record(&self) -> String {
        format!(
            "Transfer #{}  from: {}  to:  {} in the amount of {:.6} {} at {}",
            self.transfer_id,
            self.from_account,
            self.to_account,
            self.amount,
            self.currency,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Transfer row about to be appended; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

/// Which relation a ledger listing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    Accounts,
    Transfers,
}

impl LedgerKind {
    /// Resolve a requested relation name.
    ///
    /// Anything that is not the accounts relation is served as a transfers
    /// listing; the second value is `false` when the name matched neither
    /// relation.
    pub fn resolve(requested: &str, accounts_relation: &str, transfers_relation: &str) -> (Self, bool) {
        if requested.eq_ignore_ascii_case(accounts_relation) {
            (LedgerKind::Accounts, true)
        } else {
            let recognized = requested.eq_ignore_ascii_case(transfers_relation);
            (LedgerKind::Transfers, recognized)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Accounts => "accounts",
            LedgerKind::Transfers => "transfers",
        }
    }
}

impl fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-visible transfer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Success,
    Error,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Success => "success",
            TransferStatus::Error => "error",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub status: TransferStatus,
    pub transfer_id: i64,
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    /// Number of attempts it took, conflicts included
    pub attempts: u32,
}

/// Decimal places the store keeps for balances and amounts
/// (`NUMERIC(20, 6)` in `schema/ledger.sql`).
pub const AMOUNT_SCALE: u32 = 6;

/// Parse a transfer amount. Non-numeric and non-positive values are rejected,
/// as are amounts finer than [`AMOUNT_SCALE`]: the store would round the debit
/// and the credit independently.
pub fn parse_amount(raw: &str) -> Result<Decimal, WalletError> {
    let trimmed = raw.trim();
    let amount = Decimal::from_str(trimmed)
        .map_err(|_| WalletError::InvalidAmount(format!("'{}' is not a number", raw)))?;
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(format!(
            "'{}' must be greater than zero",
            raw
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(WalletError::InvalidAmount(format!(
            "'{}' has more than {} decimal places",
            raw, AMOUNT_SCALE
        )));
    }
    Ok(amount)
}
