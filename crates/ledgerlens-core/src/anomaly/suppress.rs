//! Trusted-transaction suppression
//!
//! Decides, before any detector runs, whether a transaction is skipped
//! outright or evaluated with a severity ceiling.

use crate::classify::normalize::Narration;
use crate::models::{Category, ClassifiedTransaction, Method};

use super::types::Severity;

/// Debits below this never reach the detectors
const SMALL_DEBIT_LIMIT: f64 = 1_000.0;

/// Canonical merchants of regulated utilities
const UTILITY_MERCHANTS: &[&str] = &[
    "INDRAPRASTHA GAS",
    "MAHANAGAR GAS",
    "BSES",
    "TATA POWER",
    "ADANI ELECTRICITY",
    "AIRTEL",
    "VODAFONE IDEA",
    "JIO",
    "BSNL",
];

const UTILITY_WORDS: &[&str] = &[
    "ELECTRICITY",
    "POWER",
    "GAS",
    "WATER",
    "BROADBAND",
    "POSTPAID",
    "PREPAID",
    "RECHARGE",
    "DTH",
    "MOBILE",
];

const CARD_PAYMENT_WORDS: &[&str] = &["CRED", "CREDIT CARD", "CC PAYMENT", "CARD PAYMENT"];

/// Outcome of the suppression check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionRule {
    pub skip: bool,
    pub max_severity: Severity,
    pub reason: Option<String>,
}

impl SuppressionRule {
    /// Evaluate normally
    pub fn none() -> Self {
        Self {
            skip: false,
            max_severity: Severity::Critical,
            reason: None,
        }
    }

    fn skip(reason: &str) -> Self {
        Self {
            skip: true,
            max_severity: Severity::Info,
            reason: Some(reason.to_string()),
        }
    }

    pub fn is_capped(&self) -> bool {
        self.max_severity < Severity::Critical
    }

    /// Lower the ceiling, keeping the reason of the strictest cap
    fn cap(&mut self, severity: Severity, reason: &str) {
        if severity < self.max_severity {
            self.max_severity = severity;
            self.reason = Some(reason.to_string());
        }
    }
}

/// Trusted-transaction policy
#[derive(Debug, Clone, Copy, Default)]
pub struct Suppressor;

impl Suppressor {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, tx: &ClassifiedTransaction) -> SuppressionRule {
        let narration = Narration::parse(tx.narration());

        if tx.is_credit() && matches!(tx.category, Category::Refund | Category::Income) {
            return SuppressionRule::skip("Credit from a refund or income source");
        }
        if UTILITY_MERCHANTS.contains(&tx.merchant.as_str()) {
            return SuppressionRule::skip("Payment to a known utility provider");
        }
        if tx.category == Category::BillsUtilities && narration.first_word(UTILITY_WORDS).is_some()
        {
            return SuppressionRule::skip("Utility bill payment");
        }
        if tx.withdrawal() > 0.0 && tx.withdrawal() < SMALL_DEBIT_LIMIT {
            return SuppressionRule::skip("Small everyday payment");
        }

        let mut rule = SuppressionRule::none();
        if tx.category == Category::Income || tx.method == Method::Salary {
            rule.cap(Severity::Info, "regular income");
        }
        if tx.is_self_transfer() && tx.category == Category::Investment {
            rule.cap(Severity::Low, "transfer between your own accounts");
        }
        if tx.merchant == "CRED" || narration.first_word(CARD_PAYMENT_WORDS).is_some() {
            rule.cap(Severity::Medium, "credit card bill payment");
        }
        if matches!(tx.category, Category::BillsUtilities | Category::Loan)
            || matches!(tx.method, Method::Emi | Method::Rd | Method::Sip)
        {
            rule.cap(Severity::Medium, "scheduled payment");
        }
        rule
    }
}
