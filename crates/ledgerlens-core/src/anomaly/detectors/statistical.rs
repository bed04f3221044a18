//! Profile-relative amount, merchant and velocity checks

use super::{interpolate, Detector, DetectorKind};
use crate::anomaly::types::{AnomalySignal, SignalCode, TransactionContext};
use crate::config::Thresholds;
use crate::models::Category;
use crate::profile::UserProfile;
use crate::Result;

/// Entries a distribution needs before it is trusted
const MIN_SAMPLES: usize = 5;
/// Days before the transaction included in the velocity window
const SPIKE_WINDOW_DAYS: i64 = 2;

pub struct StatisticalDetector {
    thresholds: Thresholds,
}

impl StatisticalDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    fn amount_signal(
        &self,
        amount: f64,
        category: Category,
        profile: &UserProfile,
    ) -> Option<AnomalySignal> {
        let t = &self.thresholds;

        if let Some(cat) = profile.category(category).filter(|c| c.count >= MIN_SAMPLES) {
            let z = cat.z_score(amount).abs();
            let (_, upper) = cat.tukey_bounds(t.iqr_multiplier);
            let label = category.label();

            let (code, score, why) = if amount > cat.p99 || z >= t.z_score_critical {
                let score = interpolate(z, t.z_score_critical, t.z_score_critical + 3.0, 92.0, 95.0);
                (SignalCode::UnusualAmount, score, "is higher than almost all of your")
            } else if amount > cat.p95 || z >= t.z_score_high {
                let score = interpolate(z, t.z_score_high, t.z_score_critical, 75.0, 80.0);
                (SignalCode::AmountSpike, score, "is in the top 5% of your")
            } else if amount > upper || z >= t.z_score_medium {
                (SignalCode::AmountSpike, 60.0, "is well above your usual")
            } else if z >= t.z_score_low {
                (SignalCode::AmountSpike, 40.0, "is above your usual")
            } else {
                return None;
            };
            return Some(
                AnomalySignal::new(code, score, format!("{:.0} {} {} spending", amount, why, label))
                    .with_meta("z_score", (z * 100.0).round() / 100.0)
                    .with_meta("category_mean", cat.mean)
                    .with_meta("p95", cat.p95)
                    .with_meta("p99", cat.p99),
            );
        }

        let overall = &profile.overall;
        if overall.count < MIN_SAMPLES {
            return None;
        }
        let (code, score) = if amount > overall.p99 {
            (SignalCode::UnusualAmount, 92.0)
        } else if amount > overall.p95 {
            (SignalCode::AmountSpike, 75.0)
        } else {
            return None;
        };
        Some(
            AnomalySignal::new(
                code,
                score,
                format!("{:.0} is among your largest payments", amount),
            )
            .with_meta("p95", overall.p95)
            .with_meta("p99", overall.p99),
        )
    }

    fn merchant_signal(
        &self,
        ctx: &TransactionContext<'_>,
        amount: f64,
        profile: &UserProfile,
    ) -> Option<AnomalySignal> {
        let party = ctx.tx.counterparty()?;
        let avg_daily = profile.avg_daily_spend;
        if avg_daily <= 0.0 {
            return None;
        }
        // New means unseen before this transaction; later rows in the batch do not count
        let seen_before = ctx.history.iter().any(|h| h.counterparty() == Some(party));
        let frequency = profile.merchant_count(party);
        let multiple = amount / avg_daily;

        if !seen_before && multiple > self.thresholds.new_merchant_multiplier {
            Some(
                AnomalySignal::new(
                    SignalCode::NewMerchant,
                    65.0,
                    format!("First payment to {} is {:.1}× your daily spend", party, multiple),
                )
                .with_meta("merchant", party)
                .with_meta("daily_multiple", (multiple * 10.0).round() / 10.0),
            )
        } else if frequency == 1 && multiple > self.thresholds.rare_merchant_multiplier {
            Some(
                AnomalySignal::new(
                    SignalCode::RareMerchant,
                    45.0,
                    format!("{} is rarely paid and this is {:.1}× your daily spend", party, multiple),
                )
                .with_meta("merchant", party)
                .with_meta("daily_multiple", (multiple * 10.0).round() / 10.0),
            )
        } else {
            None
        }
    }

    fn velocity_signal(
        &self,
        ctx: &TransactionContext<'_>,
        amount: f64,
        profile: &UserProfile,
    ) -> Option<AnomalySignal> {
        let expected = profile.avg_daily_spend * (SPIKE_WINDOW_DAYS + 1) as f64;
        if expected <= 0.0 {
            return None;
        }
        let recent: f64 = amount
            + ctx
                .history
                .iter()
                .filter(|h| h.withdrawal() > 0.0)
                .filter(|h| {
                    ctx.days_since(h)
                        .is_some_and(|d| (0..=SPIKE_WINDOW_DAYS).contains(&d))
                })
                .map(|h| h.withdrawal())
                .sum::<f64>();
        let ratio = recent / expected;
        let multiplier = self.thresholds.spending_spike_multiplier;
        if ratio <= multiplier {
            return None;
        }
        let score = (60.0 + (ratio - multiplier) * 10.0).min(85.0);
        Some(
            AnomalySignal::new(
                SignalCode::SpendingSpike,
                score,
                format!("Spent {:.0} in three days, {:.1}× the usual pace", recent, ratio),
            )
            .with_meta("recent_spend", recent)
            .with_meta("expected_spend", expected),
        )
    }
}

impl Detector for StatisticalDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Statistical
    }

    fn detect(
        &self,
        ctx: &TransactionContext<'_>,
        profile: &UserProfile,
    ) -> Result<Vec<AnomalySignal>> {
        let amount = ctx.tx.withdrawal();
        if amount < self.thresholds.min_amount || profile.is_empty() {
            return Ok(Vec::new());
        }

        let mut signals = Vec::new();
        signals.extend(self.amount_signal(amount, ctx.tx.category, profile));
        if !ctx.cancel.is_cancelled() {
            signals.extend(self.merchant_signal(ctx, amount, profile));
        }
        if !ctx.cancel.is_cancelled() {
            signals.extend(self.velocity_signal(ctx, amount, profile));
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::test_support::{context_for, debit};
    use crate::models::ClassifiedTransaction;

    /// Fifteen grocery runs, one every four days, 1000..1140
    fn grocery_history() -> Vec<ClassifiedTransaction> {
        (0..15)
            .map(|i| {
                let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i * 4);
                debit(
                    &day.format("%d/%m/%Y").to_string(),
                    &format!("UPI-BIGBASKET-bigbasket@icici-{}", i),
                    1000.0 + (i as f64) * 10.0,
                )
            })
            .collect()
    }

    fn detect(tx: &ClassifiedTransaction, history: &[ClassifiedTransaction]) -> Vec<AnomalySignal> {
        let profile = UserProfile::build(history);
        let detector = StatisticalDetector::new(Thresholds::default());
        context_for(tx, history, |ctx| detector.detect(ctx, &profile).unwrap())
    }

    #[test]
    fn test_typical_amount_is_quiet() {
        let history = grocery_history();
        let tx = debit("05/03/2024", "UPI-BIGBASKET-bigbasket@icici-99", 1070.0);
        assert!(detect(&tx, &history).is_empty());
    }

    #[test]
    fn test_extreme_amount_is_unusual() {
        let history = grocery_history();
        let tx = debit("05/03/2024", "UPI-BIGBASKET-bigbasket@icici-99", 9000.0);
        let signals = detect(&tx, &history);
        let unusual = signals
            .iter()
            .find(|s| s.code == SignalCode::UnusualAmount)
            .unwrap();
        assert!(unusual.score >= 92.0 && unusual.score <= 95.0);
    }

    #[test]
    fn test_new_merchant() {
        let history = grocery_history();
        // avg daily spend is about 290
        let tx = debit("05/03/2024", "UPI-CROMA-croma@hdfcbank-1", 4000.0);
        let signals = detect(&tx, &history);
        assert!(signals.iter().any(|s| s.code == SignalCode::NewMerchant));
    }

    #[test]
    fn test_new_merchant_that_recurs_later_in_batch() {
        let history = grocery_history();
        let tx = debit("05/03/2024", "UPI-CROMA-croma@hdfcbank-1", 4000.0);
        let later = debit("09/03/2024", "UPI-CROMA-croma@hdfcbank-2", 1000.0);

        let mut batch = history.clone();
        batch.push(tx.clone());
        batch.push(later);
        let profile = UserProfile::build(&batch);
        assert_eq!(profile.merchant_count(tx.counterparty().unwrap()), 2);

        let detector = StatisticalDetector::new(Thresholds::default());
        let signals = context_for(&tx, &history, |ctx| detector.detect(ctx, &profile).unwrap());
        assert!(signals.iter().any(|s| s.code == SignalCode::NewMerchant));
    }

    #[test]
    fn test_known_merchant_is_not_new() {
        let mut history = grocery_history();
        history.push(debit("01/03/2024", "UPI-CROMA-croma@hdfcbank-0", 500.0));
        let tx = debit("05/03/2024", "UPI-CROMA-croma@hdfcbank-1", 4000.0);
        let signals = detect(&tx, &history);
        assert!(!signals.iter().any(|s| s.code == SignalCode::NewMerchant));
    }

    #[test]
    fn test_spending_spike() {
        let mut history = grocery_history();
        history.push(debit("04/03/2024", "UPI-CROMA-croma@hdfcbank-1", 3000.0));
        let tx = debit("05/03/2024", "UPI-CROMA-croma@hdfcbank-2", 3000.0);
        let signals = detect(&tx, &history);
        let spike = signals
            .iter()
            .find(|s| s.code == SignalCode::SpendingSpike)
            .unwrap();
        assert!(spike.score >= 60.0 && spike.score <= 85.0);
    }

    #[test]
    fn test_empty_profile_is_quiet() {
        let tx = debit("05/03/2024", "UPI-CROMA-croma@hdfcbank-1", 90_000.0);
        assert!(detect(&tx, &[]).is_empty());
    }
}
