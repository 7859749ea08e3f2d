use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::ledger::{RelationNames, RetryPolicy};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL, takes precedence over the individual fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub accounts_table: String,
    pub transfers_table: String,
    pub transfer_sequence: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "wallet".to_string(),
            sslmode: "disable".to_string(),
            accounts_table: "accounts".to_string(),
            transfers_table: "transfers".to_string(),
            transfer_sequence: "payment_counter".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 3000,
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl DatabaseConfig {
    /// Relation and sequence names are spliced into SQL text, so only plain
    /// identifiers are accepted.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (field, name) in [
            ("accounts_table", &self.accounts_table),
            ("transfers_table", &self.transfers_table),
            ("transfer_sequence", &self.transfer_sequence),
        ] {
            if !is_identifier(name) {
                bail!("database.{field} must be a plain SQL identifier, got {name:?}");
            }
        }
        if self.accounts_table.eq_ignore_ascii_case(&self.transfers_table) {
            bail!("database.accounts_table and database.transfers_table must differ");
        }
        if self.max_connections == 0 {
            bail!("database.max_connections must be at least 1");
        }
        Ok(())
    }

    pub fn relation_names(&self) -> RelationNames {
        RelationNames {
            accounts: self.accounts_table.clone(),
            transfers: self.transfers_table.clone(),
            transfer_sequence: self.transfer_sequence.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// `None` retries conflicts forever
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        let backoff = RetryPolicy::unbounded().with_backoff(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        );
        match self.max_attempts {
            Some(max) => backoff.with_max_attempts(max),
            None => backoff,
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(content).context("Failed to parse config yaml")?;
        config.database.validate()?;
        Ok(config)
    }
}
