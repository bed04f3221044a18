//! Signal aggregation
//!
//! Combines detector signals into one score the way a bank rates a case:
//! the strongest signal dominates, the total adds diminishing weight and
//! the number of independent signals adds a little.
//!
//! ```text
//! final = 0.6·max + 0.3·ln(sum + 1)·20 + 0.1·min(n·10, 50)
//! ```

use std::collections::BTreeMap;

use super::suppress::SuppressionRule;
use super::types::{AnomalyResult, AnomalySignal, Severity};

const TOP_SIGNALS: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer;

impl Scorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, mut signals: Vec<AnomalySignal>) -> AnomalyResult {
        if signals.is_empty() {
            return AnomalyResult::empty("Nothing unusual about this transaction");
        }

        signals.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.code.cmp(&b.code)));

        let n = signals.len() as f64;
        let max = signals[0].score;
        let sum: f64 = signals.iter().map(|s| s.score).sum();
        let count_score = (n * 10.0).min(50.0);
        let log_sum = (sum + 1.0).ln() * 20.0;
        let final_score = round_to(
            (0.6 * max + 0.3 * log_sum + 0.1 * count_score).min(100.0),
            2,
        );

        let mut per_category: BTreeMap<_, usize> = BTreeMap::new();
        for s in &signals {
            *per_category.entry(s.category).or_default() += 1;
        }
        let mut confidence = sum / n / 100.0;
        if signals.len() >= 2 {
            confidence *= 1.2;
        }
        if per_category.values().copied().max().unwrap_or(0) >= 2 {
            confidence *= 1.1;
        }
        let confidence = round_to(confidence.min(1.0), 3);

        let mut risk_flags = Vec::new();
        for s in signals.iter().filter(|s| s.severity >= Severity::High) {
            let flag = s.code.risk_flag();
            if !risk_flags.contains(&flag) {
                risk_flags.push(flag);
            }
        }

        let top_signals: Vec<AnomalySignal> = signals.iter().take(TOP_SIGNALS).cloned().collect();
        let explanation = top_signals
            .iter()
            .map(|s| s.explanation.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        AnomalyResult {
            signals,
            final_score,
            severity: Severity::from_score(final_score),
            top_signals,
            explanation,
            confidence,
            risk_flags,
            suppressed: false,
        }
    }

    /// Hold the result and every signal at or below the rule's ceiling
    pub fn apply_cap(&self, result: &mut AnomalyResult, rule: &SuppressionRule) {
        let cap = rule.max_severity;
        if cap >= Severity::Critical {
            return;
        }
        for s in result.signals.iter_mut().chain(result.top_signals.iter_mut()) {
            s.severity = s.severity.min(cap);
        }
        if result.severity > cap {
            result.severity = cap;
            result.final_score = cap.canonical_score();
            let why = rule.reason.as_deref().unwrap_or("trusted transaction");
            result.explanation = format!("Held at {} ({}). {}", cap, why, result.explanation);
        }
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::types::{RiskFlag, SignalCode};

    #[test]
    fn test_no_signals_is_info() {
        let result = Scorer::new().score(Vec::new());
        assert_eq!(result.final_score, 0.0);
        assert_eq!(result.severity, Severity::Info);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_single_signal_formula() {
        let result = Scorer::new().score(vec![AnomalySignal::new(
            SignalCode::IncomeDisruption,
            80.0,
            "low income",
        )]);
        // 48 + 0.3·ln(81)·20 + 1
        assert_eq!(result.final_score, 75.37);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.confidence, 0.8);
        assert_eq!(result.risk_flags, vec![RiskFlag::IncomeDisruption]);
    }

    #[test]
    fn test_ordering_and_top_signals() {
        let result = Scorer::new().score(vec![
            AnomalySignal::new(SignalCode::RareMerchant, 45.0, "rare"),
            AnomalySignal::new(SignalCode::MultipleLargeTransfers, 90.0, "many"),
            AnomalySignal::new(SignalCode::HighValueRecurring, 60.0, "again"),
            AnomalySignal::new(SignalCode::SpendingSpike, 62.0, "fast"),
        ]);
        let codes: Vec<_> = result.top_signals.iter().map(|s| s.code).collect();
        assert_eq!(
            codes,
            vec![
                SignalCode::MultipleLargeTransfers,
                SignalCode::SpendingSpike,
                SignalCode::HighValueRecurring
            ]
        );
        assert_eq!(result.explanation, "many; fast; again");
        assert!(result.final_score <= 100.0);
        assert_eq!(result.risk_flags, vec![RiskFlag::BeneficiaryConcentration]);
    }

    #[test]
    fn test_confidence_boosts() {
        let result = Scorer::new().score(vec![
            AnomalySignal::new(SignalCode::HighAmount, 50.0, "a"),
            AnomalySignal::new(SignalCode::RoundAmount, 50.0, "b"),
        ]);
        // 0.5 · 1.2 · 1.1
        assert_eq!(result.confidence, 0.66);
    }

    #[test]
    fn test_cap_downgrades_everything() {
        let scorer = Scorer::new();
        let mut result = scorer.score(vec![AnomalySignal::new(
            SignalCode::HighAmount,
            90.0,
            "Large payment",
        )]);
        assert_eq!(result.severity, Severity::High);

        let rule = SuppressionRule {
            skip: false,
            max_severity: Severity::Low,
            reason: Some("transfer between your own accounts".into()),
        };
        scorer.apply_cap(&mut result, &rule);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.final_score, 30.0);
        assert!(result.signals.iter().all(|s| s.severity <= Severity::Low));
        assert!(result.top_signals.iter().all(|s| s.severity <= Severity::Low));
        assert!(result.explanation.starts_with("Held at low"));
    }
}
