//! User behaviour profile
//!
//! Built once per batch from the classified history and then shared read-only
//! by every detector.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dates;
use crate::models::{Category, ClassifiedTransaction};

/// Summary statistics over a set of amounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountStats {
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

impl AmountStats {
    pub fn from_amounts(amounts: &[f64]) -> Self {
        if amounts.is_empty() {
            return Self::default();
        }
        let mut sorted = amounts.to_vec();
        sorted.sort_by(f64::total_cmp);
        let (mean, std_dev) = moments(&sorted);
        Self {
            mean,
            std_dev,
            median: median_sorted(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p95: percentile_sorted(&sorted, 0.95),
            p99: percentile_sorted(&sorted, 0.99),
            count: sorted.len(),
        }
    }
}

/// Per-category distribution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryProfile {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

impl CategoryProfile {
    pub fn from_amounts(amounts: &[f64]) -> Self {
        if amounts.is_empty() {
            return Self::default();
        }
        let mut sorted = amounts.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let (mean, std_dev) = moments(&sorted);
        let q1 = sorted[n / 4];
        let q3 = sorted[((3 * n) / 4).min(n - 1)];
        Self {
            mean,
            median: median_sorted(&sorted),
            std_dev,
            q1,
            q3,
            iqr: q3 - q1,
            p95: percentile_sorted(&sorted, 0.95),
            p99: percentile_sorted(&sorted, 0.99),
            count: n,
        }
    }

    /// z-score of `amount`, zero when the spread is zero
    pub fn z_score(&self, amount: f64) -> f64 {
        if self.std_dev > 0.0 {
            (amount - self.mean) / self.std_dev
        } else {
            0.0
        }
    }

    /// Tukey fences `[Q1 - k·IQR, Q3 + k·IQR]`
    pub fn tukey_bounds(&self, k: f64) -> (f64, f64) {
        (self.q1 - k * self.iqr, self.q3 + k * self.iqr)
    }
}

/// Behavioural baseline for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub overall: AmountStats,
    pub total_spend: f64,
    pub avg_daily_spend: f64,
    pub avg_weekly_spend: f64,
    pub avg_monthly_spend: f64,
    pub merchant_frequency: BTreeMap<String, usize>,
    pub merchant_amounts: BTreeMap<String, Vec<f64>>,
    /// Hour of day (0-23) → expense count
    pub hour_histogram: BTreeMap<u32, usize>,
    /// Day of week (0 = Monday) → expense count
    pub weekday_histogram: BTreeMap<u32, usize>,
    pub expense_count: usize,
    pub transaction_days: usize,
    pub categories: BTreeMap<Category, CategoryProfile>,
    /// `YYYY-MM` → credited income (refunds and own transfers excluded)
    pub monthly_income: BTreeMap<String, f64>,
    /// Expense rows skipped because their date did not parse
    pub rejected_rows: usize,
}

impl UserProfile {
    pub fn build(history: &[ClassifiedTransaction]) -> Self {
        let mut profile = Self::default();
        let mut amounts = Vec::new();
        let mut per_category: BTreeMap<Category, Vec<f64>> = BTreeMap::new();
        let mut days: Vec<NaiveDate> = Vec::new();

        for tx in history {
            let Some(ts) = dates::parse_timestamp(&tx.raw.date) else {
                if tx.withdrawal() > 0.0 {
                    profile.rejected_rows += 1;
                }
                continue;
            };

            if tx.deposit() > 0.0 && tx.category != Category::Refund && !tx.is_self_transfer() {
                *profile
                    .monthly_income
                    .entry(ts.format("%Y-%m").to_string())
                    .or_default() += tx.deposit();
            }

            let amount = tx.withdrawal();
            if amount <= 0.0 {
                continue;
            }
            amounts.push(amount);
            per_category.entry(tx.category).or_default().push(amount);
            if let Some(party) = tx.counterparty() {
                *profile.merchant_frequency.entry(party.to_string()).or_default() += 1;
                profile
                    .merchant_amounts
                    .entry(party.to_string())
                    .or_default()
                    .push(amount);
            }
            *profile.hour_histogram.entry(ts.hour()).or_default() += 1;
            *profile
                .weekday_histogram
                .entry(ts.weekday().num_days_from_monday())
                .or_default() += 1;
            days.push(ts.date());
        }

        if profile.rejected_rows > 0 {
            warn!(
                rejected = profile.rejected_rows,
                "Skipped expense rows with unparseable dates"
            );
        }
        if amounts.is_empty() {
            return profile;
        }

        profile.overall = AmountStats::from_amounts(&amounts);
        profile.expense_count = amounts.len();
        profile.total_spend = amounts.iter().sum();

        days.sort();
        let span = match (days.first(), days.last()) {
            (Some(first), Some(last)) => (*last - *first).num_days().max(1),
            _ => 1,
        };
        days.dedup();
        profile.transaction_days = days.len();
        profile.avg_daily_spend = profile.total_spend / span as f64;
        profile.avg_weekly_spend = profile.avg_daily_spend * 7.0;
        profile.avg_monthly_spend = profile.avg_daily_spend * 30.0;

        for list in profile.merchant_amounts.values_mut() {
            list.sort_by(f64::total_cmp);
        }
        profile.categories = per_category
            .into_iter()
            .map(|(c, list)| (c, CategoryProfile::from_amounts(&list)))
            .collect();

        debug!(
            expenses = profile.expense_count,
            days = profile.transaction_days,
            avg_daily = profile.avg_daily_spend,
            "Built user profile"
        );
        profile
    }

    /// No expense row was accepted
    pub fn is_empty(&self) -> bool {
        self.expense_count == 0
    }

    pub fn category(&self, category: Category) -> Option<&CategoryProfile> {
        self.categories.get(&category)
    }

    pub fn merchant_count(&self, merchant: &str) -> usize {
        self.merchant_frequency.get(merchant).copied().unwrap_or(0)
    }

    /// Mean monthly income over every month except `month` (`YYYY-MM`)
    pub fn average_monthly_income_excluding(&self, month: &str) -> Option<f64> {
        let others: Vec<f64> = self
            .monthly_income
            .iter()
            .filter(|(m, _)| m.as_str() != month)
            .map(|(_, v)| *v)
            .collect();
        if others.is_empty() {
            None
        } else {
            Some(others.iter().sum::<f64>() / others.len() as f64)
        }
    }
}

/// Mean and population standard deviation
fn moments(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Value at index floor(p·n), clamped to the last element
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let idx = ((p * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::models::RawTransaction;

    fn row(date: &str, narration: &str, withdrawal: f64, deposit: f64) -> RawTransaction {
        RawTransaction {
            date: date.to_string(),
            narration: narration.to_string(),
            cheque_ref: String::new(),
            value_date: date.to_string(),
            withdrawal,
            deposit,
            closing_balance: 0.0,
        }
    }

    #[test]
    fn test_amount_stats() {
        let stats = AmountStats::from_amounts(&[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.median, 25.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
        // floor(0.95 * 4) = 3
        assert_eq!(stats.p95, 40.0);
        assert!((stats.std_dev - 11.180339887).abs() < 1e-6);
    }

    #[test]
    fn test_category_quartiles() {
        let c = CategoryProfile::from_amounts(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(c.q1, 3.0);
        assert_eq!(c.q3, 7.0);
        assert_eq!(c.iqr, 4.0);
        assert_eq!(c.tukey_bounds(1.5), (-3.0, 13.0));
    }

    #[test]
    fn test_build_profile() {
        let classifier = Classifier::new();
        let history: Vec<_> = [
            row("01/03/2024", "UPI-SWIGGY-swiggy@icici-1", 400.0, 0.0),
            row("02/03/2024", "UPI-SWIGGY-swiggy@icici-2", 600.0, 0.0),
            row("11/03/2024", "UPI-BIGBASKET-bb@icici-3", 2000.0, 0.0),
            row("12/03/2024", "SALARY MARCH", 0.0, 50_000.0),
        ]
        .iter()
        .map(|r| classifier.classify(r))
        .collect();

        let profile = UserProfile::build(&history);
        assert_eq!(profile.expense_count, 3);
        assert_eq!(profile.total_spend, 3000.0);
        // Span 1 → 11 March is 10 days
        assert_eq!(profile.avg_daily_spend, 300.0);
        assert_eq!(profile.avg_weekly_spend, 2100.0);
        assert_eq!(profile.transaction_days, 3);
        assert_eq!(profile.merchant_count("SWIGGY"), 2);
        assert_eq!(
            profile.category(Category::FoodDelivery).map(|c| c.count),
            Some(2)
        );
        assert_eq!(profile.monthly_income.get("2024-03"), Some(&50_000.0));
        // 1 March 2024 was a Friday
        assert_eq!(profile.weekday_histogram.get(&4), Some(&1));
    }

    #[test]
    fn test_bad_dates_are_skipped() {
        let classifier = Classifier::new();
        let history: Vec<_> = [
            row("not a date", "UPI-SWIGGY-1", 400.0, 0.0),
            row("also bad", "UPI-SWIGGY-2", 500.0, 0.0),
        ]
        .iter()
        .map(|r| classifier.classify(r))
        .collect();

        let profile = UserProfile::build(&history);
        assert!(profile.is_empty());
        assert_eq!(profile.rejected_rows, 2);
    }

    #[test]
    fn test_average_income_excludes_month() {
        let mut profile = UserProfile::default();
        profile.monthly_income.insert("2024-01".into(), 100.0);
        profile.monthly_income.insert("2024-02".into(), 200.0);
        profile.monthly_income.insert("2024-03".into(), 10.0);
        assert_eq!(profile.average_monthly_income_excluding("2024-03"), Some(150.0));
        assert_eq!(UserProfile::default().average_monthly_income_excluding("2024-03"), None);
    }
}
