//! Recurring payment detection
//!
//! Transactions are fingerprinted by direction, counterparty and an amount
//! bucket. Buckets are built greedily over sorted amounts: a bucket is anchored
//! at its smallest amount and takes every amount within 10% of the anchor.
//! Groups with at least three members are recurring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::normalize::Narration;
use crate::dates;
use crate::models::{ClassifiedTransaction, RecurringMeta, RecurringPattern};

/// Amount spread allowed inside one bucket
const BUCKET_TOLERANCE: f64 = 0.10;
/// Members needed before a group counts as recurring
const MIN_OCCURRENCES: usize = 3;

const RECURRENCE_WORDS: &[&str] = &[
    "INSTALLMENT",
    "EMI",
    "SIP",
    "RECURRING",
    "SUBSCRIPTION",
    "AUTO DEBIT",
    "STANDING INSTRUCTION",
    "NACH",
    "ECS",
];

/// A detected recurring group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringGroup {
    pub signature: String,
    pub counterparty: String,
    pub pattern: RecurringPattern,
    pub occurrences: usize,
    pub median_interval_days: Option<f64>,
    pub average_amount: f64,
    pub transaction_ids: Vec<String>,
}

/// Groups a transaction history into recurring payments
#[derive(Debug, Clone, Copy, Default)]
pub struct RecurringDetector;

impl RecurringDetector {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint every transaction that has a counterparty.
    ///
    /// Returned vector is parallel to `txs`.
    pub fn signatures(&self, txs: &[ClassifiedTransaction]) -> Vec<Option<String>> {
        let mut by_key: BTreeMap<(&'static str, &str), Vec<usize>> = BTreeMap::new();
        for (i, tx) in txs.iter().enumerate() {
            if let Some(party) = tx.counterparty() {
                by_key.entry((direction(tx), party)).or_default().push(i);
            }
        }

        let mut out = vec![None; txs.len()];
        for ((dir, party), mut indices) in by_key {
            indices.sort_by(|&a, &b| {
                amount(&txs[a])
                    .total_cmp(&amount(&txs[b]))
                    .then_with(|| txs[a].id.cmp(&txs[b].id))
            });
            let mut anchor: Option<f64> = None;
            for i in indices {
                let a = amount(&txs[i]);
                let current = match anchor {
                    Some(x) if a <= x * (1.0 + BUCKET_TOLERANCE) => x,
                    _ => {
                        anchor = Some(a);
                        a
                    }
                };
                out[i] = Some(format!("{}|{}|{:.0}", dir, party, current));
            }
        }
        out
    }

    /// Detect recurring groups, keyed by signature
    pub fn detect(&self, txs: &[ClassifiedTransaction]) -> BTreeMap<String, RecurringGroup> {
        group_by_signature(txs, &self.signatures(txs))
    }

    /// Detect groups and mark matching transactions as recurring
    pub fn apply(&self, txs: &mut [ClassifiedTransaction]) -> BTreeMap<String, RecurringGroup> {
        let signatures = self.signatures(txs);
        let groups = group_by_signature(txs, &signatures);

        for (tx, sig) in txs.iter_mut().zip(signatures) {
            let keyword_match = has_recurrence_keyword(tx.narration());
            let group = sig.as_ref().and_then(|s| groups.get(s));

            tx.is_recurring = keyword_match || group.is_some();
            tx.recurring_meta = tx.is_recurring.then(|| RecurringMeta {
                signature: group.map(|g| g.signature.clone()).unwrap_or_default(),
                pattern: group.map(|g| g.pattern),
                occurrences: group.map(|g| g.occurrences).unwrap_or(0),
                median_interval_days: group.and_then(|g| g.median_interval_days),
                average_amount: group.map(|g| g.average_amount),
                keyword_match,
            });
        }
        groups
    }
}

/// Build recurring groups from signatures parallel to `txs`
fn group_by_signature(
    txs: &[ClassifiedTransaction],
    signatures: &[Option<String>],
) -> BTreeMap<String, RecurringGroup> {
    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, sig) in signatures.iter().enumerate() {
        if let Some(sig) = sig {
            members.entry(sig.as_str()).or_default().push(i);
        }
    }

    let mut groups = BTreeMap::new();
    for (sig, indices) in members {
        if indices.len() < MIN_OCCURRENCES {
            continue;
        }
        let mut days: Vec<_> = indices
            .iter()
            .filter_map(|&i| dates::parse_date(&txs[i].raw.date))
            .collect();
        days.sort();
        let mut gaps: Vec<f64> = days
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days() as f64)
            .collect();
        let median_interval_days = median(&mut gaps);
        let pattern = median_interval_days
            .map(RecurringPattern::from_interval)
            .unwrap_or(RecurringPattern::Irregular);

        let total: f64 = indices.iter().map(|&i| amount(&txs[i])).sum();
        let mut transaction_ids: Vec<String> =
            indices.iter().map(|&i| txs[i].id.clone()).collect();
        transaction_ids.sort();

        let counterparty = txs[indices[0]].counterparty().unwrap_or_default().to_string();
        debug!(
            signature = sig,
            occurrences = indices.len(),
            pattern = pattern.as_str(),
            "Recurring group detected"
        );
        groups.insert(
            sig.to_string(),
            RecurringGroup {
                signature: sig.to_string(),
                counterparty,
                pattern,
                occurrences: indices.len(),
                median_interval_days,
                average_amount: total / indices.len() as f64,
                transaction_ids,
            },
        );
    }
    groups
}

/// Narration names an explicit recurrence mechanism
pub fn has_recurrence_keyword(narration: &str) -> bool {
    Narration::parse(narration).first_word(RECURRENCE_WORDS).is_some()
}

fn direction(tx: &ClassifiedTransaction) -> &'static str {
    if tx.raw.withdrawal > 0.0 {
        "DR"
    } else {
        "CR"
    }
}

fn amount(tx: &ClassifiedTransaction) -> f64 {
    tx.raw.amount()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::models::RawTransaction;

    fn row(date: &str, narration: &str, withdrawal: f64) -> RawTransaction {
        RawTransaction {
            date: date.to_string(),
            narration: narration.to_string(),
            cheque_ref: String::new(),
            value_date: date.to_string(),
            withdrawal,
            deposit: 0.0,
            closing_balance: 0.0,
        }
    }

    fn netflix_history() -> Vec<ClassifiedTransaction> {
        let classifier = Classifier::new();
        ["05/01/2024", "05/02/2024", "05/03/2024", "05/04/2024"]
            .iter()
            .enumerate()
            .map(|(i, d)| {
                classifier.classify(&row(
                    d,
                    &format!("UPI-NETFLIX-netflix@hdfcbank-{}", i),
                    649.0,
                ))
            })
            .collect()
    }

    #[test]
    fn test_monthly_group_detected() {
        let mut txs = netflix_history();
        let groups = RecurringDetector::new().apply(&mut txs);

        assert_eq!(groups.len(), 1);
        let group = groups.values().next().unwrap();
        assert_eq!(group.occurrences, 4);
        assert_eq!(group.pattern, RecurringPattern::Monthly);
        assert!(txs.iter().all(|t| t.is_recurring));
        assert_eq!(
            txs[0].recurring_meta.as_ref().unwrap().pattern,
            Some(RecurringPattern::Monthly)
        );
    }

    #[test]
    fn test_amount_bucket_splits_groups() {
        let classifier = Classifier::new();
        let txs: Vec<_> = [500.0, 520.0, 540.0, 2000.0, 2100.0]
            .iter()
            .enumerate()
            .map(|(i, a)| {
                classifier.classify(&row(
                    &format!("{:02}/01/2024", i + 1),
                    &format!("UPI-ZEPTO-zepto@ybl-{}", i),
                    *a,
                ))
            })
            .collect();
        let groups = RecurringDetector::new().detect(&txs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.values().next().unwrap().occurrences, 3);
    }

    #[test]
    fn test_keyword_alone_marks_recurring() {
        let classifier = Classifier::new();
        let mut txs = vec![classifier.classify(&row(
            "10/01/2024",
            "NACH DR HDFC MF SIP 001",
            5000.0,
        ))];
        RecurringDetector::new().apply(&mut txs);
        assert!(txs[0].is_recurring);
        let meta = txs[0].recurring_meta.as_ref().unwrap();
        assert!(meta.keyword_match);
        assert!(meta.signature.is_empty());
    }

    #[test]
    fn test_detection_is_idempotent() {
        let mut txs = netflix_history();
        let detector = RecurringDetector::new();
        let first = detector.apply(&mut txs);
        let second = detector.apply(&mut txs);
        assert_eq!(first, second);
    }

    #[test]
    fn test_apply_matches_detect() {
        let mut txs = netflix_history();
        let detector = RecurringDetector::new();
        let detected = detector.detect(&txs);
        let applied = detector.apply(&mut txs);
        assert_eq!(detected, applied);
        let group = applied.values().next().unwrap();
        assert!(txs
            .iter()
            .all(|t| t.recurring_meta.as_ref().unwrap().signature == group.signature));
    }

    #[test]
    fn test_two_occurrences_are_not_recurring() {
        let mut txs = netflix_history();
        txs.truncate(2);
        let groups = RecurringDetector::new().apply(&mut txs);
        assert!(groups.is_empty());
        assert!(!txs[0].is_recurring);
    }
}
