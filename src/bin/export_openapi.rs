//! Export the wallet OpenAPI document
//!
//! Usage:
//!   cargo run --bin export_openapi > openapi.json
//!   cargo run --bin export_openapi -- --output docs/openapi.json

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use utoipa::OpenApi;
use wallet_ledger::gateway::openapi::ApiDoc;

#[derive(Parser, Debug)]
#[command(about = "Write the wallet OpenAPI document as JSON")]
struct Args {
    /// Destination file, stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to serialize OpenAPI document")?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("OpenAPI document exported to: {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
