//! Request / response bodies of the wallet HTTP API

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ledger::{TransferReceipt, TransferStatus, WalletError};

/// Ledger listing response
///
/// `v` holds the formatted records; on failure it is empty and `err` / `code`
/// describe the error.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LedgerResponse {
    #[schema(example = json!(["Account: alice456  Balance = 80.000000 USD  Initial Balance = 50.000000"]))]
    pub v: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "NO_ACCOUNTS_DEFINED")]
    pub code: Option<String>,
}

impl LedgerResponse {
    pub fn records(v: Vec<String>) -> Self {
        Self {
            v,
            err: None,
            code: None,
        }
    }

    pub fn error(e: &WalletError) -> Self {
        Self {
            v: Vec::new(),
            err: Some(e.to_string()),
            code: Some(e.code().to_string()),
        }
    }
}

/// Transfer request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitTransferRequest {
    #[schema(example = "bob123")]
    pub from: String,
    #[schema(example = "alice456")]
    pub to: String,
    /// Decimal amount; JSON strings and numbers are both accepted
    #[serde(deserialize_with = "string_or_number")]
    #[schema(value_type = String, example = "30")]
    pub amount: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "amount must be a string or a number, got {other}"
        ))),
    }
}

/// Transfer response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitTransferResponse {
    /// `success` or `error`
    #[schema(example = "success")]
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "INSUFFICIENT_BALANCE")]
    pub code: Option<String>,
}

impl SubmitTransferResponse {
    pub fn success(receipt: &TransferReceipt) -> Self {
        Self {
            result: receipt.status.to_string(),
            transfer_id: Some(receipt.transfer_id),
            err: None,
            code: None,
        }
    }

    pub fn error(err: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            result: TransferStatus::Error.to_string(),
            transfer_id: None,
            err: Some(err.into()),
            code: Some(code.into()),
        }
    }
}

impl From<&WalletError> for SubmitTransferResponse {
    fn from(e: &WalletError) -> Self {
        Self::error(e.to_string(), e.code())
    }
}

/// Health check response data
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_u64)]
    pub timestamp_ms: u64,
}

/// Body returned for a request with the wrong HTTP method
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerbError {
    #[schema(example = "Verb can only be \"GET\" for endpoint \"/accounts\"")]
    pub err: String,
}
