//! Income disruption: month-to-date income far below the usual pace

use chrono::{Datelike, NaiveDate};

use super::{Detector, DetectorKind};
use crate::anomaly::types::{AnomalySignal, SignalCode, TransactionContext};
use crate::config::Thresholds;
use crate::dates;
use crate::models::{Category, ClassifiedTransaction};
use crate::profile::UserProfile;
use crate::Result;

/// Below this share of the expected income the disruption is severe
const SEVERE_RATIO: f64 = 0.10;

pub struct IncomeDetector {
    thresholds: Thresholds,
}

impl IncomeDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

impl Detector for IncomeDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Income
    }

    fn detect(
        &self,
        ctx: &TransactionContext<'_>,
        profile: &UserProfile,
    ) -> Result<Vec<AnomalySignal>> {
        // A "now" fallback date says nothing about the month
        if ctx.tx.deposit() <= 0.0 || !ctx.timestamp_parsed {
            return Ok(Vec::new());
        }
        let today = ctx.timestamp.date();
        if today.day() < self.thresholds.income_check_min_day {
            return Ok(Vec::new());
        }
        let month = today.format("%Y-%m").to_string();
        let Some(average) = profile
            .average_monthly_income_excluding(&month)
            .filter(|a| *a > 0.0)
        else {
            return Ok(Vec::new());
        };

        let earlier: f64 = ctx
            .history
            .iter()
            .filter(|h| counts_as_income(h))
            .filter(|h| {
                dates::parse_date(&h.raw.date).is_some_and(|d| {
                    d <= today && d.year() == today.year() && d.month() == today.month()
                })
            })
            .map(|h| h.deposit())
            .sum();
        let current = earlier
            + if counts_as_income(ctx.tx) {
                ctx.tx.deposit()
            } else {
                0.0
            };

        let expected = average * f64::from(today.day()) / f64::from(days_in_month(today));
        let ratio = current / expected;
        if ratio >= self.thresholds.income_ratio_threshold {
            return Ok(Vec::new());
        }

        let score = if ratio < SEVERE_RATIO { 90.0 } else { 80.0 };
        Ok(vec![AnomalySignal::new(
            SignalCode::IncomeDisruption,
            score,
            format!(
                "Income so far this month is {:.0}, {:.0}% of the usual {:.0} by this date",
                current,
                ratio * 100.0,
                expected
            ),
        )
        .with_meta("month_to_date", current)
        .with_meta("expected_by_now", expected.round())
        .with_meta("ratio", (ratio * 1000.0).round() / 1000.0)])
    }
}

fn counts_as_income(tx: &ClassifiedTransaction) -> bool {
    tx.deposit() > 0.0 && tx.category != Category::Refund && !tx.is_self_transfer()
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::test_support::{context_for, credit};

    fn salary_history() -> Vec<ClassifiedTransaction> {
        (1..=5)
            .map(|m| credit(&format!("01/{:02}/2024", m), "SALARY CREDIT ACME CORP", 100_000.0))
            .collect()
    }

    fn detect(tx: &ClassifiedTransaction, history: &[ClassifiedTransaction]) -> Vec<AnomalySignal> {
        let profile = UserProfile::build(history);
        let detector = IncomeDetector::new(Thresholds::default());
        context_for(tx, history, |ctx| detector.detect(ctx, &profile).unwrap())
    }

    #[test]
    fn test_missing_salary_late_in_month() {
        let history = salary_history();
        let tx = credit("28/06/2024", "NEFT CR-SBIN0001234-RAHUL VERMA-PAYMENT", 12_000.0);
        let signals = detect(&tx, &history);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].code, SignalCode::IncomeDisruption);
        assert_eq!(signals[0].score, 80.0);
    }

    #[test]
    fn test_tiny_income_is_severe() {
        let history = salary_history();
        let tx = credit("28/06/2024", "NEFT CR-SBIN0001234-RAHUL VERMA-PAYMENT", 500.0);
        assert_eq!(detect(&tx, &history)[0].score, 90.0);
    }

    #[test]
    fn test_early_in_month_is_quiet() {
        let history = salary_history();
        let tx = credit("10/06/2024", "NEFT CR-SBIN0001234-RAHUL VERMA-PAYMENT", 500.0);
        assert!(detect(&tx, &history).is_empty());
    }

    #[test]
    fn test_salary_on_time_is_quiet() {
        let mut history = salary_history();
        history.push(credit("01/06/2024", "SALARY CREDIT ACME CORP", 100_000.0));
        let tx = credit("28/06/2024", "NEFT CR-SBIN0001234-RAHUL VERMA-PAYMENT", 12_000.0);
        assert!(detect(&tx, &history).is_empty());
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()), 29);
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()), 31);
        assert_eq!(days_in_month(NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()), 30);
    }
}
