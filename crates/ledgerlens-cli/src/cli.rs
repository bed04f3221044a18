//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// LedgerLens - Understand your bank statement
#[derive(Parser)]
#[command(name = "ledgerlens")]
#[command(about = "Bank statement classification and spending insights", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Engine config file (defaults to the user override, then built-in values)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Threshold preset: default, conservative, aggressive
    #[arg(long, global = true)]
    pub preset: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify every row of a statement CSV
    Classify {
        /// Statement CSV
        #[arg(short, long)]
        file: PathBuf,

        /// Account holder name, enables self-transfer detection by name
        #[arg(short, long)]
        customer: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Classify, profile and evaluate a statement for unusual activity
    Evaluate {
        /// Statement CSV
        #[arg(short, long)]
        file: PathBuf,

        /// Account holder name, enables self-transfer detection by name
        #[arg(short, long)]
        customer: Option<String>,

        /// User id recorded on each result
        #[arg(short, long, default_value = "default")]
        user: String,

        /// Print JSON instead of alerts
        #[arg(long)]
        json: bool,

        /// Lowest severity to show: info, low, medium, high, critical
        #[arg(long, default_value = "low")]
        min_severity: String,
    },

    /// Show the spending profile built from a statement
    Profile {
        /// Statement CSV
        #[arg(short, long)]
        file: PathBuf,

        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// List recurring payments found in a statement
    Recurring {
        /// Statement CSV
        #[arg(short, long)]
        file: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Embed statement narrations into a chunk store (needs Ollama)
    Index {
        /// Statement CSV
        #[arg(short, long)]
        file: PathBuf,

        /// Chunk store database
        #[arg(long, default_value = "ledgerlens-chunks.db")]
        store: PathBuf,

        /// Source id for the stored chunks (defaults to the file name)
        #[arg(long)]
        source: Option<String>,
    },

    /// Search indexed narrations by similarity (needs Ollama)
    Search {
        /// Text to search for
        query: String,

        /// Chunk store database
        #[arg(long, default_value = "ledgerlens-chunks.db")]
        store: PathBuf,

        /// Number of results
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Only search chunks from this source
        #[arg(long)]
        source: Option<String>,
    },
}
