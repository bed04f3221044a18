//! Signal, result and context types shared by detectors and the engine.
//!
//! This module depends only on the data models so detectors never need to
//! reach into the engine.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::models::ClassifiedTransaction;

/// Bucketed score tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Band a score: ≥90 Critical, ≥70 High, ≥45 Medium, ≥20 Low
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Critical
        } else if score >= 70.0 {
            Self::High
        } else if score >= 45.0 {
            Self::Medium
        } else if score >= 20.0 {
            Self::Low
        } else {
            Self::Info
        }
    }

    /// Representative score used when a result is capped to this tier
    pub fn canonical_score(&self) -> f64 {
        match self {
            Self::Critical => 95.0,
            Self::High => 80.0,
            Self::Medium => 60.0,
            Self::Low => 30.0,
            Self::Info => 10.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of evidence a signal is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalCategory {
    Amount,
    Frequency,
    Behavior,
    Merchant,
    Pattern,
    #[serde(rename = "ML")]
    Ml,
}

/// Enumerated signal codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalCode {
    HighAmount,
    AmountSpike,
    UnusualAmount,
    RoundAmount,
    NewMerchant,
    RareMerchant,
    UnknownMerchant,
    DuplicatePayment,
    SpendingSpike,
    MultipleLargeTransfers,
    HighValueRecurring,
    LargeBillPayment,
    IncomeDisruption,
    MlAnomaly,
}

impl SignalCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighAmount => "HIGH_AMOUNT",
            Self::AmountSpike => "AMOUNT_SPIKE",
            Self::UnusualAmount => "UNUSUAL_AMOUNT",
            Self::RoundAmount => "ROUND_AMOUNT",
            Self::NewMerchant => "NEW_MERCHANT",
            Self::RareMerchant => "RARE_MERCHANT",
            Self::UnknownMerchant => "UNKNOWN_MERCHANT",
            Self::DuplicatePayment => "DUPLICATE_PAYMENT",
            Self::SpendingSpike => "SPENDING_SPIKE",
            Self::MultipleLargeTransfers => "MULTIPLE_LARGE_TRANSFERS",
            Self::HighValueRecurring => "HIGH_VALUE_RECURRING",
            Self::LargeBillPayment => "LARGE_BILL_PAYMENT",
            Self::IncomeDisruption => "INCOME_DISRUPTION",
            Self::MlAnomaly => "ML_ANOMALY",
        }
    }

    pub fn category(&self) -> SignalCategory {
        match self {
            Self::HighAmount | Self::AmountSpike | Self::UnusualAmount | Self::RoundAmount => {
                SignalCategory::Amount
            }
            Self::NewMerchant | Self::RareMerchant | Self::UnknownMerchant => {
                SignalCategory::Merchant
            }
            Self::DuplicatePayment | Self::SpendingSpike => SignalCategory::Frequency,
            Self::MultipleLargeTransfers | Self::HighValueRecurring | Self::LargeBillPayment => {
                SignalCategory::Pattern
            }
            Self::IncomeDisruption => SignalCategory::Behavior,
            Self::MlAnomaly => SignalCategory::Ml,
        }
    }

    /// Abstract flag raised when a signal with this code is High or Critical
    pub fn risk_flag(&self) -> RiskFlag {
        match self {
            Self::HighAmount => RiskFlag::LargeAmount,
            Self::AmountSpike | Self::UnusualAmount => RiskFlag::UnusualAmount,
            Self::RoundAmount => RiskFlag::RoundAmount,
            Self::NewMerchant | Self::RareMerchant => RiskFlag::NewCounterparty,
            Self::UnknownMerchant => RiskFlag::UnknownCounterparty,
            Self::DuplicatePayment => RiskFlag::DuplicateTransaction,
            Self::SpendingSpike => RiskFlag::SpendingVelocity,
            Self::MultipleLargeTransfers => RiskFlag::BeneficiaryConcentration,
            Self::HighValueRecurring => RiskFlag::RecurringHighValue,
            Self::LargeBillPayment => RiskFlag::LargeBillPayment,
            Self::IncomeDisruption => RiskFlag::IncomeDisruption,
            Self::MlAnomaly => RiskFlag::ModelFlagged,
        }
    }
}

impl std::fmt::Display for SignalCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Abstract tags summarizing why a result scored high
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFlag {
    LargeAmount,
    UnusualAmount,
    RoundAmount,
    NewCounterparty,
    UnknownCounterparty,
    DuplicateTransaction,
    SpendingVelocity,
    BeneficiaryConcentration,
    RecurringHighValue,
    LargeBillPayment,
    IncomeDisruption,
    ModelFlagged,
}

/// One atomic piece of evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySignal {
    pub code: SignalCode,
    pub category: SignalCategory,
    /// 0..=100
    pub score: f64,
    pub severity: Severity,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AnomalySignal {
    pub fn new(code: SignalCode, score: f64, explanation: impl Into<String>) -> Self {
        let score = score.clamp(0.0, 100.0);
        Self {
            code,
            category: code.category(),
            score,
            severity: Severity::from_score(score),
            explanation: explanation.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Aggregated outcome for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub signals: Vec<AnomalySignal>,
    /// 0..=100
    pub final_score: f64,
    pub severity: Severity,
    pub top_signals: Vec<AnomalySignal>,
    pub explanation: String,
    /// 0..=1
    pub confidence: f64,
    pub risk_flags: Vec<RiskFlag>,
    /// Set when the suppressor skipped detection
    #[serde(default)]
    pub suppressed: bool,
}

impl AnomalyResult {
    /// Result for a transaction with nothing to report
    pub fn empty(explanation: impl Into<String>) -> Self {
        Self {
            signals: Vec::new(),
            final_score: 0.0,
            severity: Severity::Info,
            top_signals: Vec::new(),
            explanation: explanation.into(),
            confidence: 1.0,
            risk_flags: Vec::new(),
            suppressed: false,
        }
    }

    pub fn has_signal(&self, code: SignalCode) -> bool {
        self.signals.iter().any(|s| s.code == code)
    }
}

/// Everything a detector may look at for one transaction
#[derive(Debug, Clone, Copy)]
pub struct TransactionContext<'a> {
    pub tx: &'a ClassifiedTransaction,
    /// Recent transactions, oldest first, never including `tx`
    pub history: &'a [ClassifiedTransaction],
    pub timestamp: NaiveDateTime,
    /// False when `timestamp` is the "now" fallback
    pub timestamp_parsed: bool,
    pub user_id: &'a str,
    pub cancel: &'a CancelToken,
}

impl<'a> TransactionContext<'a> {
    /// Days from `other`'s date to this transaction's date, `None` if unparseable
    pub fn days_since(&self, other: &ClassifiedTransaction) -> Option<i64> {
        let then = crate::dates::parse_timestamp(&other.raw.date)?;
        Some((self.timestamp.date() - then.date()).num_days())
    }
}
