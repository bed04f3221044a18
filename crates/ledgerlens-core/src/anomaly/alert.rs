//! User-facing alert text
//!
//! Alerts read as short insights about the user's own money, compared to
//! their own baseline. The words "anomaly", "risk" and "fraud" never reach
//! the user; [`AlertFormatter`] rewrites them if a merchant name or signal
//! explanation carries one.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::{AnomalyResult, AnomalySignal, Severity, SignalCode};
use crate::models::ClassifiedTransaction;
use crate::profile::UserProfile;

const LAKH: f64 = 100_000.0;
const CRORE: f64 = 10_000_000.0;

/// Rendered alert for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub confidence: f64,
    /// Suggested next step, Medium severity and above
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

pub struct AlertFormatter {
    forbidden: Regex,
}

impl Default for AlertFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertFormatter {
    pub fn new() -> Self {
        Self {
            forbidden: Regex::new(r"(?i)\b(anomal\w*|risk\w*|fraud\w*)\b").expect("valid regex"),
        }
    }

    /// `None` when the result carries no signals
    pub fn format(
        &self,
        result: &AnomalyResult,
        tx: &ClassifiedTransaction,
        profile: &UserProfile,
    ) -> Option<Alert> {
        let top = result.top_signals.first().or(result.signals.first())?;
        let amount = tx.raw.amount();
        let party = tx
            .target()
            .map(title_case)
            .unwrap_or_else(|| "this payee".to_string());

        let title = title_for(top, tx, &party, amount);
        let mut message = message_for(top, &party, amount);
        if let Some(baseline) = baseline(tx, profile) {
            message.push(' ');
            message.push_str(&baseline);
        }
        let action = (result.severity >= Severity::Medium).then(|| action_for(top.code));

        Some(Alert {
            title: self.sanitize(&title),
            message: self.sanitize(&message),
            severity: result.severity,
            confidence: result.confidence,
            action: action.map(|a| self.sanitize(a)),
        })
    }

    fn sanitize(&self, text: &str) -> String {
        self.forbidden.replace_all(text, "unusual").into_owned()
    }
}

fn title_for(top: &AnomalySignal, tx: &ClassifiedTransaction, party: &str, amount: f64) -> String {
    let label = tx.category.label();
    match top.code {
        SignalCode::HighAmount => format!("Large payment of {}", format_inr_compact(amount)),
        SignalCode::AmountSpike => format!("Higher than usual {} spend", label),
        SignalCode::UnusualAmount => format!("One of your biggest {} payments", label),
        SignalCode::RoundAmount => format!("Round-figure payment of {}", format_inr_compact(amount)),
        SignalCode::NewMerchant => format!("First payment to {}", party),
        SignalCode::RareMerchant => format!("Payment to {}, a payee you rarely use", party),
        SignalCode::UnknownMerchant => "Payment to an unnamed recipient".to_string(),
        SignalCode::DuplicatePayment => format!("Repeat payment to {}?", party),
        SignalCode::SpendingSpike => "Your spending picked up".to_string(),
        SignalCode::MultipleLargeTransfers => format!("Several large transfers to {}", party),
        SignalCode::HighValueRecurring => format!("Repeating {} payment to {}", format_inr_compact(amount), party),
        SignalCode::LargeBillPayment => format!("Bill of {} is larger than usual", format_inr_compact(amount)),
        SignalCode::IncomeDisruption => "Income is behind this month".to_string(),
        SignalCode::MlAnomaly => "This payment stands out".to_string(),
    }
}

fn message_for(top: &AnomalySignal, party: &str, amount: f64) -> String {
    let meta_f64 = |key: &str| top.metadata.get(key).and_then(|v| v.as_f64());
    match top.code {
        SignalCode::DuplicatePayment => match meta_f64("days_apart") {
            Some(d) if d >= 1.0 => format!(
                "You paid {} to {} {:.0} day(s) earlier too.",
                format_inr(amount),
                party,
                d
            ),
            _ => format!("You paid {} to {} earlier today too.", format_inr(amount), party),
        },
        SignalCode::MultipleLargeTransfers => {
            let total = meta_f64("cumulative_amount").unwrap_or(amount);
            let count = meta_f64("transfer_count").unwrap_or(2.0);
            format!(
                "{} transfers to {} add up to {} this week.",
                count,
                party,
                format_inr(total)
            )
        }
        SignalCode::IncomeDisruption => {
            let current = meta_f64("month_to_date").unwrap_or(amount);
            let expected = meta_f64("expected_by_now").unwrap_or(0.0);
            format!(
                "You have received {} so far this month, against about {} by this date in a usual month.",
                format_inr(current),
                format_inr(expected)
            )
        }
        SignalCode::SpendingSpike => {
            let recent = meta_f64("recent_spend").unwrap_or(amount);
            format!("You spent {} over the last three days.", format_inr(recent))
        }
        _ => format!("You paid {} to {}.", format_inr(amount), party),
    }
}

/// Compare the amount to the user's own history
fn baseline(tx: &ClassifiedTransaction, profile: &UserProfile) -> Option<String> {
    let amount = tx.withdrawal();
    if amount <= 0.0 || profile.avg_daily_spend <= 0.0 {
        return None;
    }
    let multiple = amount / profile.avg_daily_spend;
    let mut text = format!("That is {:.1}× your typical daily spend", multiple);
    if profile
        .category(tx.category)
        .is_some_and(|c| c.count >= 5 && amount >= c.p99)
    {
        text.push_str(" and in the top 1% of your transactions in this category");
    }
    text.push('.');
    Some(text)
}

fn action_for(code: SignalCode) -> &'static str {
    match code {
        SignalCode::DuplicatePayment => "Check whether both payments were intended.",
        SignalCode::MultipleLargeTransfers => "Confirm each transfer was meant for this account.",
        SignalCode::IncomeDisruption => "Check with your employer or payer whether a credit is pending.",
        SignalCode::UnknownMerchant | SignalCode::NewMerchant => {
            "Make sure you recognise this payee."
        }
        SignalCode::SpendingSpike => "Look over this week's spending against your budget.",
        _ => "Review this payment in your statement.",
    }
}

/// Indian digit grouping: ₹1,25,000
pub fn format_inr(amount: f64) -> String {
    let rupees = amount.abs().round() as u64;
    let digits = rupees.to_string();
    let grouped = if digits.len() <= 3 {
        digits
    } else {
        let (head, last3) = digits.split_at(digits.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 2 {
            groups.push(&head[end - 2..end]);
            end -= 2;
        }
        groups.push(&head[..end]);
        groups.reverse();
        format!("{},{}", groups.join(","), last3)
    };
    let sign = if amount < 0.0 && rupees > 0 { "-" } else { "" };
    format!("{}₹{}", sign, grouped)
}

/// Short form for titles: ₹5 lakh, ₹1.2 crore
pub fn format_inr_compact(amount: f64) -> String {
    let abs = amount.abs();
    let (value, unit) = if abs >= CRORE {
        (abs / CRORE, "crore")
    } else if abs >= LAKH {
        (abs / LAKH, "lakh")
    } else {
        return format_inr(amount);
    };
    let number = format!("{:.2}", value);
    let number = number.trim_end_matches('0').trim_end_matches('.');
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}₹{} {}", sign, number, unit)
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::scorer::Scorer;
    use crate::anomaly::test_support::{credit, debit};

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(0.0), "₹0");
        assert_eq!(format_inr(999.0), "₹999");
        assert_eq!(format_inr(1_250.0), "₹1,250");
        assert_eq!(format_inr(125_000.0), "₹1,25,000");
        assert_eq!(format_inr(12_345_678.0), "₹1,23,45,678");
        assert_eq!(format_inr(-40_000.0), "-₹40,000");
    }

    #[test]
    fn test_format_inr_compact() {
        assert_eq!(format_inr_compact(500_000.0), "₹5 lakh");
        assert_eq!(format_inr_compact(125_000.0), "₹1.25 lakh");
        assert_eq!(format_inr_compact(12_000_000.0), "₹1.2 crore");
        assert_eq!(format_inr_compact(60_000.0), "₹60,000");
    }

    #[test]
    fn test_no_signals_no_alert() {
        let tx = debit("10/06/2024", "UPI-CROMA-croma@hdfcbank-1", 5_000.0);
        let result = Scorer::new().score(Vec::new());
        assert!(AlertFormatter::new()
            .format(&result, &tx, &UserProfile::default())
            .is_none());
    }

    #[test]
    fn test_transfer_alert() {
        let tx = debit(
            "05/06/2024",
            "IMPS-412345678901-RAVI KUMAR-SBIN0001234-XXXXXX1234-TRANSFER",
            40_000.0,
        );
        let signal = AnomalySignal::new(SignalCode::MultipleLargeTransfers, 90.0, "x")
            .with_meta("transfer_count", 3)
            .with_meta("cumulative_amount", 120_000.0);
        let result = Scorer::new().score(vec![signal]);
        let alert = AlertFormatter::new()
            .format(&result, &tx, &UserProfile::default())
            .unwrap();
        assert_eq!(alert.title, "Several large transfers to Ravi Kumar");
        assert!(alert.message.contains("₹1,20,000"));
        assert!(alert.action.is_some());
    }

    #[test]
    fn test_baseline_phrase() {
        let mut profile = UserProfile::default();
        profile.avg_daily_spend = 1_000.0;
        let tx = debit("10/06/2024", "UPI-CROMA-croma@hdfcbank-1", 1_400.0);
        assert_eq!(
            baseline(&tx, &profile).as_deref(),
            Some("That is 1.4× your typical daily spend.")
        );
    }

    #[test]
    fn test_low_severity_has_no_action() {
        let tx = debit("10/06/2024", "UPI-CROMA-croma@hdfcbank-1", 20_000.0);
        let result = Scorer::new().score(vec![AnomalySignal::new(
            SignalCode::RareMerchant,
            25.0,
            "rare",
        )]);
        assert!(result.severity < Severity::Medium);
        let alert = AlertFormatter::new()
            .format(&result, &tx, &UserProfile::default())
            .unwrap();
        assert!(alert.action.is_none());
    }

    #[test]
    fn test_forbidden_words_removed() {
        let tx = credit("28/06/2024", "NEFT CR-SBIN0001234-RISKY FRAUDCO-PAYMENT", 12_000.0);
        let result = Scorer::new().score(vec![AnomalySignal::new(
            SignalCode::NewMerchant,
            65.0,
            "new",
        )]);
        let alert = AlertFormatter::new()
            .format(&result, &tx, &UserProfile::default())
            .unwrap();
        for text in [&alert.title, &alert.message] {
            let lower = text.to_lowercase();
            assert!(!lower.contains("risk"));
            assert!(!lower.contains("fraud"));
            assert!(!lower.contains("anomal"));
        }
    }
}
