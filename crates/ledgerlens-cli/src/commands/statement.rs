//! Statement views: classification, profile and recurring payments

use std::path::Path;

use anyhow::Result;
use ledgerlens_core::{
    anomaly::format_inr, config::EngineConfig, models::RecurringRecord,
    profile::CategoryProfile, RecurringDetector, UserProfile,
};

use super::{classifier_for, load_statement, truncate};

pub fn cmd_classify(
    config: &EngineConfig,
    file: &Path,
    customer: Option<&str>,
    json: bool,
) -> Result<()> {
    let classifier = classifier_for(config, customer);
    let txs = load_statement(file, &classifier)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&txs)?);
        return Ok(());
    }

    println!("📋 {} transactions", txs.len());
    println!();
    println!(
        "{:<10}  {:>12}  {:<12}  {:<16}  {:<24}  NARRATION",
        "DATE", "AMOUNT", "METHOD", "CATEGORY", "COUNTERPARTY"
    );
    for tx in &txs {
        let amount = if tx.is_credit() {
            format!("+{}", format_inr(tx.deposit()))
        } else {
            format!("-{}", format_inr(tx.withdrawal()))
        };
        let mut category = tx.category.to_string();
        if tx.is_recurring {
            category.push_str(" ↻");
        }
        println!(
            "{:<10}  {:>12}  {:<12}  {:<16}  {:<24}  {}",
            tx.raw.date,
            amount,
            tx.method.to_string(),
            category,
            truncate(tx.counterparty().unwrap_or("-"), 24),
            truncate(tx.narration(), 48)
        );
    }

    let unexplained = txs
        .iter()
        .filter(|t| t.classification_meta.reason.starts_with("No matching"))
        .count();
    if unexplained > 0 {
        println!();
        println!("   {} rows did not match any category rule", unexplained);
    }
    Ok(())
}

pub fn cmd_profile(config: &EngineConfig, file: &Path, json: bool) -> Result<()> {
    let txs = load_statement(file, &classifier_for(config, None))?;
    let profile = UserProfile::build(&txs);

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    if profile.is_empty() {
        println!("No spending found in {}", file.display());
        return Ok(());
    }

    println!("📊 Spending profile");
    println!("   ─────────────────────────────");
    println!("   Expenses:        {}", profile.expense_count);
    println!("   Total spend:     {}", format_inr(profile.total_spend));
    println!("   Daily average:   {}", format_inr(profile.avg_daily_spend));
    println!("   Weekly average:  {}", format_inr(profile.avg_weekly_spend));
    println!("   Monthly average: {}", format_inr(profile.avg_monthly_spend));
    println!("   Median payment:  {}", format_inr(profile.overall.median));
    println!();
    println!("   By category:");
    let mut categories: Vec<_> = profile.categories.iter().collect();
    let total = |c: &CategoryProfile| c.mean * c.count as f64;
    categories.sort_by(|a, b| total(b.1).total_cmp(&total(a.1)));
    for (category, stats) in categories {
        println!(
            "     {:<16} {:>4} × avg {:>10}   total {}",
            category.label(),
            stats.count,
            format_inr(stats.mean),
            format_inr(total(stats))
        );
    }

    let mut merchants: Vec<_> = profile.merchant_frequency.iter().collect();
    merchants.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !merchants.is_empty() {
        println!();
        println!("   Most frequent payees:");
        for (merchant, count) in merchants.into_iter().take(10) {
            println!("     {:<28} {}", truncate(merchant, 28), count);
        }
    }

    if !profile.monthly_income.is_empty() {
        println!();
        println!("   Income by month:");
        for (month, income) in &profile.monthly_income {
            println!("     {}  {}", month, format_inr(*income));
        }
    }
    if profile.rejected_rows > 0 {
        println!();
        println!(
            "   ⚠️  {} expense rows skipped (unreadable dates)",
            profile.rejected_rows
        );
    }
    Ok(())
}

pub fn cmd_recurring(config: &EngineConfig, file: &Path, json: bool) -> Result<()> {
    let txs = load_statement(file, &classifier_for(config, None))?;
    let groups = RecurringDetector::new().detect(&txs);

    if json {
        let records: Vec<RecurringRecord> =
            txs.iter().filter_map(RecurringRecord::from_transaction).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "groups": groups.values().collect::<Vec<_>>(),
                "records": records,
            }))?
        );
        return Ok(());
    }

    if groups.is_empty() {
        println!("No recurring payments found.");
        return Ok(());
    }

    println!("🔁 {} recurring payment groups", groups.len());
    println!();
    for group in groups.values() {
        let interval = group
            .median_interval_days
            .map(|d| format!("every ~{:.0} days", d))
            .unwrap_or_else(|| "irregular".to_string());
        println!(
            "   {:<28} {:<10} {:>3} × {:>10}  {}",
            truncate(&group.counterparty, 28),
            group.pattern.as_str(),
            group.occurrences,
            format_inr(group.average_amount),
            interval
        );
    }

    let keyword_only = txs
        .iter()
        .filter(|t| {
            t.recurring_meta
                .as_ref()
                .is_some_and(|m| m.keyword_match && m.occurrences == 0)
        })
        .count();
    if keyword_only > 0 {
        println!();
        println!(
            "   {} more transactions name a standing instruction (EMI, SIP, NACH...)",
            keyword_only
        );
    }
    Ok(())
}
