//! Fixed-threshold amount rules

use super::{interpolate, Detector, DetectorKind};
use crate::anomaly::types::{AnomalySignal, SignalCode, TransactionContext};
use crate::config::Thresholds;
use crate::models::Category;
use crate::profile::UserProfile;
use crate::Result;

pub struct RuleDetector {
    thresholds: Thresholds,
}

impl RuleDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    fn high_amount(&self, amount: f64) -> Option<AnomalySignal> {
        let t = &self.thresholds;
        let score = if amount >= t.very_large_amount_threshold {
            (60.0 + 30.0 * (amount / t.very_large_amount_threshold - 1.0)).min(90.0)
        } else if amount >= t.large_amount_threshold {
            interpolate(
                amount,
                t.large_amount_threshold,
                t.very_large_amount_threshold,
                40.0,
                70.0,
            )
        } else {
            return None;
        };
        Some(
            AnomalySignal::new(
                SignalCode::HighAmount,
                score,
                format!("Payment of {:.0} is above the large-amount limit", amount),
            )
            .with_meta("amount", amount)
            .with_meta("threshold", t.large_amount_threshold),
        )
    }

    fn round_amount(&self, amount: f64, category: Category) -> Option<AnomalySignal> {
        // Other covers the unknown and empty categories
        let is_round = amount >= self.thresholds.round_amount_min && amount % 1000.0 == 0.0;
        (is_round && category == Category::Other).then(|| {
            AnomalySignal::new(
                SignalCode::RoundAmount,
                55.0,
                format!("Round amount of {:.0} with no clear purpose", amount),
            )
            .with_meta("amount", amount)
        })
    }

    fn unknown_merchant(&self, amount: f64, merchant: &str) -> Option<AnomalySignal> {
        let threshold = self.thresholds.unknown_merchant_threshold;
        let unknown = merchant.is_empty() || merchant.eq_ignore_ascii_case("UNKNOWN");
        (unknown && amount >= threshold).then(|| {
            let score = interpolate(amount, threshold, threshold * 5.0, 30.0, 65.0);
            AnomalySignal::new(
                SignalCode::UnknownMerchant,
                score,
                format!("Payment of {:.0} to an unidentified recipient", amount),
            )
            .with_meta("amount", amount)
        })
    }
}

impl Detector for RuleDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Rule
    }

    fn detect(
        &self,
        ctx: &TransactionContext<'_>,
        _profile: &UserProfile,
    ) -> Result<Vec<AnomalySignal>> {
        let amount = ctx.tx.withdrawal();
        if amount < self.thresholds.min_amount {
            return Ok(Vec::new());
        }

        let mut signals = Vec::new();
        let checks: [&dyn Fn() -> Option<AnomalySignal>; 3] = [
            &|| self.high_amount(amount),
            &|| self.round_amount(amount, ctx.tx.category),
            &|| self.unknown_merchant(amount, &ctx.tx.merchant),
        ];
        for check in checks {
            if ctx.cancel.is_cancelled() {
                break;
            }
            signals.extend(check());
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::test_support::{context_for, debit};

    fn detect(narration: &str, amount: f64) -> Vec<AnomalySignal> {
        let tx = debit("10/06/2024", narration, amount);
        let detector = RuleDetector::new(Thresholds::default());
        context_for(&tx, &[], |ctx| {
            detector.detect(ctx, &UserProfile::default()).unwrap()
        })
    }

    #[test]
    fn test_small_debit_ignored() {
        assert!(detect("UPI-SOMEONE-x@ybl-1", 900.0).is_empty());
    }

    #[test]
    fn test_high_amount_bands() {
        let detector = RuleDetector::new(Thresholds::default());
        assert_eq!(detector.high_amount(50_000.0).unwrap().score, 40.0);
        assert_eq!(detector.high_amount(75_000.0).unwrap().score, 55.0);
        assert_eq!(detector.high_amount(100_000.0).unwrap().score, 60.0);
        assert_eq!(detector.high_amount(150_000.0).unwrap().score, 75.0);
        assert_eq!(detector.high_amount(500_000.0).unwrap().score, 90.0);
        assert!(detector.high_amount(49_999.0).is_none());
    }

    #[test]
    fn test_round_amount_only_for_unclear_category() {
        let signals = detect("CASH DEPOSIT MACHINE TXN 0042", 60_000.0);
        assert!(signals.iter().any(|s| s.code == SignalCode::RoundAmount));

        let signals = detect("UPI-CROMA-croma@hdfcbank-9", 60_000.0);
        assert!(!signals.iter().any(|s| s.code == SignalCode::RoundAmount));
    }

    #[test]
    fn test_unknown_merchant() {
        let detector = RuleDetector::new(Thresholds::default());
        let s = detector.unknown_merchant(20_000.0, "").unwrap();
        assert_eq!(s.score, 30.0);
        assert!(detector.unknown_merchant(200_000.0, "UNKNOWN").unwrap().score == 65.0);
        assert!(detector.unknown_merchant(20_000.0, "CROMA").is_none());
    }

    #[test]
    fn test_cancelled_returns_no_more_signals() {
        let tx = debit("10/06/2024", "CASH DEPOSIT MACHINE TXN 0042", 600_000.0);
        let detector = RuleDetector::new(Thresholds::default());
        let signals = context_for(&tx, &[], |ctx| {
            ctx.cancel.cancel();
            detector.detect(ctx, &UserProfile::default()).unwrap()
        });
        assert!(signals.is_empty());
    }
}
