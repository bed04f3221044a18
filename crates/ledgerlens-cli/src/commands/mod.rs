//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `statement` - Classification, profile and recurring payment views
//! - `evaluate` - Anomaly evaluation and alerts
//! - `index` - Embedding narrations into the chunk store and searching it
//!
//! Shared helpers for loading config and statements live here.

pub mod evaluate;
pub mod index;
pub mod statement;

// Re-export command functions for main.rs
pub use evaluate::*;
pub use index::*;
pub use statement::*;

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use ledgerlens_core::{
    config::{EngineConfig, Preset},
    parse::read_raw_csv,
    ClassifiedTransaction, Classifier,
};

/// Load the engine config, applying a `--preset` override
pub fn load_config(path: Option<&Path>, preset: Option<&str>) -> Result<EngineConfig> {
    let preset = preset
        .map(|p| p.parse::<Preset>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()?;
    let config = EngineConfig::load(path, preset).context("Failed to load engine config")?;
    config.validate().context("Invalid engine config")?;
    Ok(config)
}

/// Classifier for the `--customer` flag, falling back to the configured name
pub fn classifier_for(config: &EngineConfig, customer: Option<&str>) -> Classifier {
    match customer.or(config.customer_name.as_deref()) {
        Some(name) => Classifier::with_customer(name),
        None => Classifier::new(),
    }
}

/// Read a statement CSV and classify every row, with recurring detection
pub fn load_statement(file: &Path, classifier: &Classifier) -> Result<Vec<ClassifiedTransaction>> {
    let csv_file =
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?;
    let rows = read_raw_csv(csv_file)
        .with_context(|| format!("Failed to read statement: {}", file.display()))?;
    Ok(classifier.classify_all(&rows))
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
