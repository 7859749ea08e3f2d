//! Wallet funds transfer service
//!
//! ```text
//! HTTP ──▶ InstrumentedWallet ──▶ LoggingWallet ──▶ Wallet ──▶ LedgerStore
//!                                                   reader       (PostgreSQL)
//!                                                   executor
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rust_decimal::Decimal;

use wallet_ledger::config::AppConfig;
use wallet_ledger::gateway::{self, state::AppState};
use wallet_ledger::ledger::{Account, InMemoryLedgerStore, LedgerStore, PgLedgerStore};
use wallet_ledger::logging::init_logging;
use wallet_ledger::middleware::{InstrumentedWallet, LoggingWallet, WalletMetrics};
use wallet_ledger::service::Wallet;

#[derive(Parser, Debug)]
#[command(name = "wallet_ledger", version, about = "Wallet funds transfer service")]
struct Cli {
    /// YAML configuration file
    #[arg(long, default_value = "config/dev.yaml")]
    config: PathBuf,

    /// Listen port, overrides gateway.port
    #[arg(long)]
    port: Option<u16>,

    /// Serve a seeded in-memory ledger instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

fn demo_store() -> InMemoryLedgerStore {
    InMemoryLedgerStore::with_accounts([
        Account::new("bob123", Decimal::from(100), "USD"),
        Account::new("alice456", Decimal::from(50), "USD"),
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let _guard = init_logging(&config);
    tracing::info!(config = %cli.config.display(), "Starting wallet service");

    let store: Arc<dyn LedgerStore> = if cli.in_memory {
        tracing::warn!("Using in-memory ledger, state is lost on exit");
        Arc::new(demo_store())
    } else {
        let store = PgLedgerStore::connect(&config.database)
            .await
            .context("Failed to connect to database")?;
        Arc::new(store)
    };

    let names = config.database.relation_names();
    let metrics = Arc::new(WalletMetrics::new());
    let wallet = InstrumentedWallet::new(
        Arc::clone(&metrics),
        LoggingWallet::new(Wallet::new(
            Arc::clone(&store),
            names.clone(),
            config.retry.policy(),
        )),
    );

    let state = Arc::new(AppState::new(Arc::new(wallet), metrics, store, names));
    gateway::run_server(&config.gateway, state).await
}
