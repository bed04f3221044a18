//! Anomaly evaluation command

use std::path::Path;

use anyhow::{Context, Result};
use ledgerlens_core::{
    anomaly::{format_inr, AnomalyRecord, Severity},
    config::EngineConfig,
    AnomalyEngine, CancelToken,
};

use super::{classifier_for, load_statement, truncate};

pub fn cmd_evaluate(
    config: &EngineConfig,
    file: &Path,
    customer: Option<&str>,
    user: &str,
    json: bool,
    min_severity: &str,
) -> Result<()> {
    let min_severity: Severity = min_severity.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let classifier = classifier_for(config, customer);
    let txs = load_statement(file, &classifier)?;

    let mut engine = AnomalyEngine::new(config.clone()).context("Failed to build engine")?;
    engine.update_profile(&txs);
    let records = engine
        .evaluate_batch(&txs, user, &CancelToken::new())
        .context("Evaluation failed")?;

    let shown: Vec<&AnomalyRecord> = select(&records, min_severity);

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    println!(
        "🔍 Evaluated {} transactions ({} preset)",
        records.len(),
        config.preset
    );

    if shown.is_empty() {
        println!();
        println!("✅ Nothing unusual at {} severity or above.", min_severity);
        return Ok(());
    }

    for record in &shown {
        let Some(tx) = txs.iter().find(|t| t.id == record.transaction_id) else {
            continue;
        };
        let Some(alert) = &record.alert else {
            continue;
        };
        println!();
        println!(
            "{} [{}] {}",
            severity_icon(alert.severity),
            alert.severity,
            alert.title
        );
        println!(
            "   {}  {}  {}",
            tx.raw.date,
            format_inr(tx.raw.amount()),
            truncate(tx.narration(), 60)
        );
        println!("   {}", alert.message);
        if let Some(action) = &alert.action {
            println!("   → {}", action);
        }
        println!(
            "   score {:.1}, confidence {:.0}%",
            record.result.final_score,
            alert.confidence * 100.0
        );
    }

    println!();
    println!(
        "⚠️  {} of {} transactions flagged at {} or above.",
        shown.len(),
        records.len(),
        min_severity
    );
    Ok(())
}

/// Records with signals at or above `min`, most severe first, input order
/// within a tier
pub fn select(records: &[AnomalyRecord], min: Severity) -> Vec<&AnomalyRecord> {
    let mut shown: Vec<&AnomalyRecord> = records
        .iter()
        .filter(|r| !r.result.signals.is_empty() && r.result.severity >= min)
        .collect();
    shown.sort_by(|a, b| b.result.severity.cmp(&a.result.severity));
    shown
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🚨",
        Severity::High => "🔴",
        Severity::Medium => "🟠",
        Severity::Low => "🟡",
        Severity::Info => "ℹ️",
    }
}
