//! LedgerLens CLI - Bank statement insights
//!
//! Usage:
//!   ledgerlens classify --file CSV    Classify statement rows
//!   ledgerlens evaluate --file CSV    Flag unusual transactions
//!   ledgerlens profile --file CSV     Show the spending profile
//!   ledgerlens recurring --file CSV   List recurring payments

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref(), cli.preset.as_deref())?;

    match cli.command {
        Commands::Classify {
            file,
            customer,
            json,
        } => commands::cmd_classify(&config, &file, customer.as_deref(), json),
        Commands::Evaluate {
            file,
            customer,
            user,
            json,
            min_severity,
        } => commands::cmd_evaluate(
            &config,
            &file,
            customer.as_deref(),
            &user,
            json,
            &min_severity,
        ),
        Commands::Profile { file, json } => commands::cmd_profile(&config, &file, json),
        Commands::Recurring { file, json } => commands::cmd_recurring(&config, &file, json),
        Commands::Index {
            file,
            store,
            source,
        } => commands::cmd_index(&config, &file, &store, source.as_deref()).await,
        Commands::Search {
            query,
            store,
            top_k,
            source,
        } => commands::cmd_search(&config, &query, &store, top_k, source.as_deref()).await,
    }
}
