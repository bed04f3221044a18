//! Multi-transaction patterns over the recent history
//!
//! - repeated large transfers to one beneficiary
//! - high-value payments that keep recurring outside known schedules
//! - unusually large bill payments

use super::{Detector, DetectorKind};
use crate::anomaly::types::{AnomalySignal, SignalCode, TransactionContext};
use crate::classify::normalize::Narration;
use crate::config::Thresholds;
use crate::models::{Category, ClassifiedTransaction, Method};
use crate::profile::UserProfile;
use crate::Result;

/// Amount spread for "the same" recurring payment
const RECURRING_TOLERANCE: f64 = 0.10;
/// Prior matches needed for a high-value recurring signal
const RECURRING_MIN_PRIORS: usize = 2;
const RECURRING_LARGE: f64 = 50_000.0;

/// Legitimate schedules that never raise a recurring signal
const SCHEDULED_WORDS: &[&str] = &[
    "EMI",
    "LOAN",
    "CRED",
    "CREDIT CARD",
    "RENT",
    "INSURANCE",
    "PREMIUM",
    "SIP",
];
const BILL_WORDS: &[&str] = &["BILL", "BBPS", "BILLPAY", "POSTPAID", "UTILITY", "BILLDESK"];

pub struct PatternDetector {
    thresholds: Thresholds,
}

impl PatternDetector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    fn large_transfers(&self, ctx: &TransactionContext<'_>, amount: f64) -> Option<AnomalySignal> {
        let t = &self.thresholds;
        let target = ctx.tx.target()?;
        if amount < t.large_transfer_min {
            return None;
        }

        let priors: Vec<&ClassifiedTransaction> = ctx
            .history
            .iter()
            .filter(|h| h.target() == Some(target) && h.withdrawal() >= t.large_transfer_min)
            .filter(|h| {
                ctx.days_since(h)
                    .is_some_and(|d| (0..=t.large_transfer_window_days).contains(&d))
            })
            .collect();
        let count = priors.len() + 1;
        let cumulative = amount + priors.iter().map(|h| h.withdrawal()).sum::<f64>();
        if count < 2 || cumulative < t.large_transfer_cumulative {
            return None;
        }

        let score = if count >= 3 {
            90.0
        } else if cumulative >= 2.0 * t.large_transfer_cumulative {
            85.0
        } else {
            75.0
        };
        Some(
            AnomalySignal::new(
                SignalCode::MultipleLargeTransfers,
                score,
                format!(
                    "{} transfers totalling {:.0} to {} within {} days",
                    count, cumulative, target, t.large_transfer_window_days
                ),
            )
            .with_meta("beneficiary", target)
            .with_meta("transfer_count", count)
            .with_meta("cumulative_amount", cumulative),
        )
    }

    fn high_value_recurring(
        &self,
        ctx: &TransactionContext<'_>,
        narration: &Narration,
        amount: f64,
    ) -> Option<AnomalySignal> {
        if amount < self.thresholds.recurring_high_value_min || is_scheduled(ctx.tx, narration) {
            return None;
        }
        let target = ctx.tx.target()?;
        let priors = ctx
            .history
            .iter()
            .filter(|h| h.target() == Some(target) && h.withdrawal() > 0.0)
            .filter(|h| (h.withdrawal() - amount).abs() <= RECURRING_TOLERANCE * amount)
            .count();
        if priors < RECURRING_MIN_PRIORS {
            return None;
        }
        let score = if amount >= RECURRING_LARGE { 70.0 } else { 60.0 };
        Some(
            AnomalySignal::new(
                SignalCode::HighValueRecurring,
                score,
                format!(
                    "Payment of {:.0} to {} repeats {} earlier payments",
                    amount, target, priors
                ),
            )
            .with_meta("beneficiary", target)
            .with_meta("prior_count", priors),
        )
    }

    fn large_bill(
        &self,
        tx: &ClassifiedTransaction,
        narration: &Narration,
        amount: f64,
    ) -> Option<AnomalySignal> {
        let limit = self.thresholds.large_bill_amount;
        let bill_like = tx.category == Category::BillsUtilities
            || tx.method == Method::BillPaid
            || narration.first_word(BILL_WORDS).is_some();
        if amount < limit || !bill_like {
            return None;
        }
        let score = if amount >= 2.0 * limit { 75.0 } else { 65.0 };
        Some(
            AnomalySignal::new(
                SignalCode::LargeBillPayment,
                score,
                format!("Bill payment of {:.0} is far above a typical bill", amount),
            )
            .with_meta("amount", amount),
        )
    }
}

fn is_scheduled(tx: &ClassifiedTransaction, narration: &Narration) -> bool {
    matches!(tx.category, Category::Loan)
        || matches!(tx.method, Method::Emi | Method::Insurance | Method::Sip)
        || narration.first_word(SCHEDULED_WORDS).is_some()
}

impl Detector for PatternDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Pattern
    }

    fn detect(
        &self,
        ctx: &TransactionContext<'_>,
        _profile: &UserProfile,
    ) -> Result<Vec<AnomalySignal>> {
        let amount = ctx.tx.withdrawal();
        if amount <= 0.0 {
            return Ok(Vec::new());
        }
        let narration = Narration::parse(ctx.tx.narration());

        let mut signals = Vec::new();
        signals.extend(self.large_transfers(ctx, amount));
        if !ctx.cancel.is_cancelled() {
            signals.extend(self.high_value_recurring(ctx, &narration, amount));
        }
        if !ctx.cancel.is_cancelled() {
            signals.extend(self.large_bill(ctx.tx, &narration, amount));
        }
        Ok(signals)
    }
}
