//! Repeated-payment detection

use super::{Detector, DetectorKind};
use crate::anomaly::types::{AnomalySignal, SignalCode, TransactionContext};
use crate::config::Thresholds;
use crate::profile::UserProfile;
use crate::Result;

pub struct DuplicateDetector {
    thresholds: Thresholds,
    scan_window: usize,
}

impl DuplicateDetector {
    pub fn new(thresholds: Thresholds, scan_window: usize) -> Self {
        Self {
            thresholds,
            scan_window,
        }
    }
}

impl Detector for DuplicateDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Duplicate
    }

    /// Emits at most one signal: same-day matches win over older ones
    fn detect(
        &self,
        ctx: &TransactionContext<'_>,
        _profile: &UserProfile,
    ) -> Result<Vec<AnomalySignal>> {
        let amount = ctx.tx.withdrawal();
        let Some(party) = ctx.tx.counterparty() else {
            return Ok(Vec::new());
        };
        if amount <= 0.0 {
            return Ok(Vec::new());
        }

        let tolerance = self.thresholds.duplicate_amount_tolerance;
        let window = self.thresholds.duplicate_time_window_days;
        let start = ctx.history.len().saturating_sub(self.scan_window);

        let mut closest: Option<(i64, &str)> = None;
        for prior in ctx.history[start..].iter().rev() {
            if ctx.cancel.is_cancelled() {
                break;
            }
            if prior.withdrawal() <= 0.0 || prior.counterparty() != Some(party) {
                continue;
            }
            let delta = (prior.withdrawal() - amount).abs();
            if delta > tolerance * prior.withdrawal().max(amount) {
                continue;
            }
            let Some(days) = ctx.days_since(prior).map(i64::abs) else {
                continue;
            };
            if days <= window && closest.map_or(true, |(d, _)| days < d) {
                closest = Some((days, prior.id.as_str()));
            }
        }

        let Some((days, matched_id)) = closest else {
            return Ok(Vec::new());
        };
        let (score, explanation) = if days == 0 {
            (85.0, format!("Same payment of {:.0} to {} already made today", amount, party))
        } else {
            (
                60.0,
                format!("Same payment of {:.0} to {} made {} day(s) ago", amount, party, days),
            )
        };
        Ok(vec![AnomalySignal::new(
            SignalCode::DuplicatePayment,
            score,
            explanation,
        )
        .with_meta("matched_transaction_id", matched_id)
        .with_meta("days_apart", days)])
    }
}
