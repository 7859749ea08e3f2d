//! PostgreSQL ledger store
//!
//! Every call checks one connection out of the pool for the lifetime of a
//! single transaction. Relation names come from validated configuration;
//! all values are bound parameters.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{PgConnection, Postgres, Row, Transaction};

use super::error::{StoreError, StoreErrorKind};
use super::store::{LedgerStore, LedgerTx, RelationNames};
use super::types::{Account, NewTransfer, TransferRecord};
use crate::config::DatabaseConfig;

/// Map a PostgreSQL SQLSTATE onto a store error kind.
pub fn kind_for_sql_state(code: &str) -> StoreErrorKind {
    match code {
        // serialization_failure
        "40001" => StoreErrorKind::Conflict,
        // deadlock_detected, lock_not_available, admin/crash shutdown, cannot_connect_now,
        // too_many_connections
        "40P01" | "55P03" | "57P01" | "57P02" | "57P03" | "53300" => StoreErrorKind::Transient,
        c if c.starts_with("23") => StoreErrorKind::ConstraintViolation,
        c if c.starts_with("08") => StoreErrorKind::Transient,
        _ => StoreErrorKind::Fatal,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned());
                let kind = code
                    .as_deref()
                    .map(kind_for_sql_state)
                    .unwrap_or(StoreErrorKind::Fatal);
                let err = StoreError::new(kind, db.message());
                match code {
                    Some(code) => err.with_sql_state(code),
                    None => err,
                }
            }
            sqlx::Error::RowNotFound => StoreError::new(StoreErrorKind::NotFound, e.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::transient(e.to_string()),
            _ => StoreError::fatal(e.to_string()),
        }
    }
}

/// SQL text, rendered once per store.
#[derive(Debug)]
struct Statements {
    lock_accounts: String,
    fetch_balance: String,
    fetch_currency: String,
    adjust_balance: String,
    append_transfer: String,
    list_accounts: String,
    list_transfers: String,
}

impl Statements {
    fn new(names: &RelationNames) -> Self {
        let accounts = &names.accounts;
        let transfers = &names.transfers;
        Self {
            lock_accounts: format!("LOCK TABLE {accounts} IN SHARE ROW EXCLUSIVE MODE"),
            fetch_balance: format!(
                "SELECT balance, currency FROM {accounts} WHERE accountid = $1"
            ),
            fetch_currency: format!("SELECT currency FROM {accounts} WHERE accountid = $1"),
            adjust_balance: format!(
                "UPDATE {accounts} SET balance = balance + $1 WHERE accountid = $2"
            ),
            append_transfer: format!(
                "INSERT INTO {transfers} (transid, from_account, to_account, amount, currency, ttime)
                 VALUES (nextval('{}'), $1, $2, $3, $4, $5)
                 RETURNING transid",
                names.transfer_sequence
            ),
            list_accounts: format!(
                "SELECT accountid, balance, currency, initialbalance FROM {accounts} ORDER BY accountid"
            ),
            list_transfers: format!(
                "SELECT transid, from_account, to_account, amount, currency, ttime
                 FROM {transfers} ORDER BY transid"
            ),
        }
    }
}

/// PostgreSQL implementation of [`LedgerStore`].
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    sql: Arc<Statements>,
}

impl PgLedgerStore {
    /// Create the connection pool described by `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = match &config.url {
            Some(url) => PgConnectOptions::from_str(url)?,
            None => {
                let ssl_mode = PgSslMode::from_str(&config.sslmode)?;
                PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.port)
                    .username(&config.user)
                    .password(&config.password)
                    .database(&config.dbname)
                    .ssl_mode(ssl_mode)
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_with(options)
            .await?;

        tracing::info!(
            accounts = %config.accounts_table,
            transfers = %config.transfers_table,
            "PostgreSQL connection pool established"
        );
        Ok(Self::from_pool(pool, config.relation_names()))
    }

    pub fn from_pool(pool: PgPool, names: RelationNames) -> Self {
        Self {
            pool,
            sql: Arc::new(Statements::new(&names)),
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx {
            tx: Some(tx),
            sql: Arc::clone(&self.sql),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open PostgreSQL transaction. sqlx rolls back on drop if not finished.
pub struct PgLedgerTx {
    tx: Option<Transaction<'static, Postgres>>,
    sql: Arc<Statements>,
}

fn live<'a>(
    tx: &'a mut Option<Transaction<'static, Postgres>>,
) -> Result<&'a mut PgConnection, StoreError> {
    tx.as_deref_mut()
        .ok_or_else(|| StoreError::fatal("transaction already finished"))
}

fn row_to_account(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        account_id: row.try_get("accountid")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        initial_balance: row.try_get("initialbalance")?,
    })
}

fn row_to_transfer(row: &PgRow) -> Result<TransferRecord, sqlx::Error> {
    Ok(TransferRecord {
        transfer_id: row.try_get("transid")?,
        from_account: row.try_get("from_account")?,
        to_account: row.try_get("to_account")?,
        amount: row.try_get("amount")?,
        currency: row.try_get("currency")?,
        timestamp: row.try_get::<DateTime<Utc>, _>("ttime")?,
    })
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn set_serializable(&mut self) -> Result<(), StoreError> {
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(live(&mut self.tx)?)
            .await?;
        Ok(())
    }

    async fn lock_accounts(&mut self) -> Result<(), StoreError> {
        sqlx::query(&self.sql.lock_accounts)
            .execute(live(&mut self.tx)?)
            .await?;
        Ok(())
    }

    async fn fetch_balance(
        &mut self,
        account_id: &str,
    ) -> Result<Option<(Decimal, String)>, StoreError> {
        let row = sqlx::query(&self.sql.fetch_balance)
            .bind(account_id)
            .fetch_optional(live(&mut self.tx)?)
            .await?;

        match row {
            Some(row) => Ok(Some((row.try_get("balance")?, row.try_get("currency")?))),
            None => Ok(None),
        }
    }

    async fn fetch_currency(&mut self, account_id: &str) -> Result<Option<String>, StoreError> {
        let currency = sqlx::query_scalar::<_, String>(&self.sql.fetch_currency)
            .bind(account_id)
            .fetch_optional(live(&mut self.tx)?)
            .await?;
        Ok(currency)
    }

    async fn adjust_balance(&mut self, account_id: &str, delta: Decimal) -> Result<u64, StoreError> {
        let result = sqlx::query(&self.sql.adjust_balance)
            .bind(delta)
            .bind(account_id)
            .execute(live(&mut self.tx)?)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_transfer(&mut self, transfer: &NewTransfer) -> Result<i64, StoreError> {
        let transfer_id = sqlx::query_scalar::<_, i64>(&self.sql.append_transfer)
            .bind(&transfer.from_account)
            .bind(&transfer.to_account)
            .bind(transfer.amount)
            .bind(&transfer.currency)
            .bind(transfer.timestamp)
            .fetch_one(live(&mut self.tx)?)
            .await?;
        Ok(transfer_id)
    }

    async fn list_accounts(&mut self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query(&self.sql.list_accounts)
            .fetch_all(live(&mut self.tx)?)
            .await?;
        let accounts = rows
            .iter()
            .map(row_to_account)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    async fn list_transfers(&mut self) -> Result<Vec<TransferRecord>, StoreError> {
        let rows = sqlx::query(&self.sql.list_transfers)
            .fetch_all(live(&mut self.tx)?)
            .await?;
        let transfers = rows
            .iter()
            .map(row_to_transfer)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transfers)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::fatal("transaction already finished"))?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => {
                tx.rollback().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}
