//! Transaction classification
//!
//! Turns a raw statement row into a [`ClassifiedTransaction`]:
//!
//! 1. [`normalize`] canonicalizes the narration and finds the gateway
//! 2. [`method`] picks the payment rail
//! 3. [`merchant`] extracts merchant and beneficiary names
//! 4. [`category`] runs the layered category rules
//!
//! The [`Classifier`] then applies self-transfer detection, method-driven
//! overrides and the credit safeguard, in that order. Classification is
//! total: anything unrecognized ends up as `Other` with a reason.

pub mod category;
pub mod merchant;
pub mod method;
pub mod normalize;

use tracing::debug;

use crate::dates;
use crate::models::{
    Category, ClassificationMetadata, ClassifiedTransaction, Method, RawTransaction, RULE_VERSION,
};
use crate::recurring::RecurringDetector;
use category::{CategoryClassifier, CategoryInput, CategoryResult};
use merchant::{Extraction, MerchantExtractor};
use method::MethodClassifier;
use normalize::Narration;

const SELF_TRANSFER_CONFIDENCE: f64 = 0.98;
const SELF_TRANSFER_ROUND_MIN: f64 = 10_000.0;
const SELF_TRANSFER_ANY_MIN: f64 = 50_000.0;

const REFUND_WORDS: &[&str] = &["REFUND", "CASHBACK", "REVERSAL", "RETURN"];
const ULIP_WORDS: &[&str] = &["ULIP", "ENDOWMENT", "UNIT LINKED"];
const INVESTMENT_CREDIT_WORDS: &[&str] = &[
    "SIP",
    "MUTUAL FUND",
    "MF",
    "REDEMPTION",
    "DIVIDEND",
    "ZERODHA",
    "GROWW",
    "UPSTOX",
    "CLEARING",
    "NSDL",
    "CDSL",
    "MATURITY",
];

/// Classifies statement rows
pub struct Classifier {
    method: MethodClassifier,
    merchant: MerchantExtractor,
    category: CategoryClassifier,
    customer_name: Option<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            method: MethodClassifier::new(),
            merchant: MerchantExtractor::new(),
            category: CategoryClassifier::new(),
            customer_name: None,
        }
    }

    /// Classifier that knows the account holder's name, enabling the
    /// name-based self-transfer checks
    pub fn with_customer(name: impl Into<String>) -> Self {
        let name = normalize::normalize(&name.into());
        Self {
            customer_name: (!name.is_empty()).then_some(name),
            ..Self::new()
        }
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_name.as_deref()
    }

    /// Classify one row. Recurrence is left unset; use [`Classifier::classify_all`]
    /// to get recurring detection across the batch.
    pub fn classify(&self, raw: &RawTransaction) -> ClassifiedTransaction {
        let narration = Narration::parse(&raw.narration);
        let method_match = self.method.classify(&narration);
        let method = method_match.method;
        let extraction = self.merchant.extract(&narration, method);
        let amount = raw.amount();

        let result = self.category.classify(&CategoryInput {
            narration: &narration,
            method,
            amount,
            extraction: &extraction,
        });

        let mut meta = ClassificationMetadata {
            confidence: result.confidence,
            matched_keywords: Vec::new(),
            gateway: narration.gateway.unwrap_or_default().to_string(),
            channel: method,
            rule_version: RULE_VERSION.to_string(),
            reason: result.reason.clone(),
            self_transfer: false,
            date_parsed: dates::parse_date(&raw.date).is_some(),
        };
        if !method_match.keyword.is_empty() {
            meta.push_keyword(method_match.keyword.clone());
        }
        for k in &result.matched_keywords {
            meta.push_keyword(k.clone());
        }

        let mut category = result.category;

        if let Some(evidence) = self.self_transfer(&narration, method, &extraction, amount) {
            category = Category::Investment;
            meta.confidence = SELF_TRANSFER_CONFIDENCE;
            meta.self_transfer = true;
            meta.reason = format!("Transfer between own accounts ({})", evidence);
            meta.push_keyword(evidence);
        } else {
            category = self.apply_method_overrides(raw, &narration, method, category, &result, &mut meta);
        }

        category = safeguard_credit(raw, &narration, &extraction, category, &mut meta);

        let mut is_income = raw.is_credit() && !meta.self_transfer;
        if method.is_income_method() && raw.deposit > 0.0 {
            category = Category::Income;
            is_income = true;
        }

        debug!(
            method = %method,
            category = %category,
            confidence = meta.confidence,
            "Classified transaction"
        );

        ClassifiedTransaction {
            id: raw.transaction_id(),
            raw: raw.clone(),
            method,
            merchant: extraction.merchant,
            beneficiary: extraction.beneficiary,
            category,
            is_income,
            is_recurring: false,
            classification_meta: meta,
            recurring_meta: None,
        }
    }

    /// Classify a batch and mark recurring transactions
    pub fn classify_all(&self, raws: &[RawTransaction]) -> Vec<ClassifiedTransaction> {
        let mut txs: Vec<_> = raws.iter().map(|r| self.classify(r)).collect();
        RecurringDetector::new().apply(&mut txs);
        txs
    }

    /// Self-transfer checks, in order. Returns the evidence that fired.
    fn self_transfer(
        &self,
        n: &Narration,
        method: Method,
        extraction: &Extraction,
        amount: f64,
    ) -> Option<String> {
        let beneficiary = extraction.beneficiary.as_str();
        if !method.is_bank_transfer() || beneficiary.is_empty() {
            return None;
        }

        if n.has_token("OWN") {
            return Some("OWN".to_string());
        }

        if let Some(customer) = &self.customer_name {
            if let Some(first) = customer.split_whitespace().next() {
                if first.len() >= 3 && n.contains_word(first) {
                    return Some(first.to_string());
                }
            }
            if n.contains(customer) {
                return Some(customer.clone());
            }
            if same_words(beneficiary, customer) {
                return Some(beneficiary.to_string());
            }
        }

        let repeated = n.upper.matches(beneficiary).count() >= 2;
        let round = amount >= SELF_TRANSFER_ROUND_MIN && amount % 1000.0 == 0.0;
        if repeated && (round || amount >= SELF_TRANSFER_ANY_MIN) {
            return Some(beneficiary.to_string());
        }
        None
    }

    fn apply_method_overrides(
        &self,
        raw: &RawTransaction,
        n: &Narration,
        method: Method,
        category: Category,
        result: &CategoryResult,
        meta: &mut ClassificationMetadata,
    ) -> Category {
        let overridden = match method {
            Method::SelfTransfer => {
                meta.self_transfer = true;
                Some((Category::Investment, "Own-account transfer"))
            }
            Method::Rd | Method::Fd | Method::Sip | Method::Investment => {
                Some((Category::Investment, "Deposit scheme or investment channel"))
            }
            Method::OnlineShopping => Some((Category::Shopping, "Online purchase")),
            Method::Emi if raw.is_debit() => Some((Category::Loan, "EMI debit")),
            Method::Insurance if n.first_word(ULIP_WORDS).is_some() => {
                Some((Category::Investment, "Market-linked insurance premium"))
            }
            Method::Insurance | Method::BillPaid | Method::TaxPayment
                if category == Category::Other =>
            {
                Some((Category::BillsUtilities, "Bill paid through the bank"))
            }
            m if m.is_reversal() && raw.is_credit() => {
                Some((Category::Refund, "Reversal credited back"))
            }
            _ => None,
        };

        let overridden = overridden.or_else(|| {
            (raw.is_credit() && n.first_word(REFUND_WORDS).is_some())
                .then_some((Category::Refund, "Refund or cashback credit"))
        });

        match overridden {
            Some((new_category, reason)) if new_category != category => {
                meta.reason = format!("{} (method {})", reason, method);
                if result.is_fallback() {
                    meta.confidence = 0.7;
                }
                new_category
            }
            _ => category,
        }
    }
}

/// Credits never keep an expense category
fn safeguard_credit(
    raw: &RawTransaction,
    n: &Narration,
    extraction: &Extraction,
    category: Category,
    meta: &mut ClassificationMetadata,
) -> Category {
    if !raw.is_credit() || !category.is_expense() {
        return category;
    }
    let shopping_merchant = extraction.known.is_some_and(|k| {
        matches!(
            k.category,
            Category::Shopping | Category::FoodDelivery | Category::Groceries | Category::Travel
        )
    });
    let remapped = if shopping_merchant {
        Category::Refund
    } else if n.first_word(INVESTMENT_CREDIT_WORDS).is_some() {
        Category::Investment
    } else {
        Category::Income
    };
    meta.reason = format!("Credit re-mapped from {} to {}", category, remapped);
    remapped
}

/// Same set of name words, ignoring order
fn same_words(a: &str, b: &str) -> bool {
    let mut left: Vec<&str> = a.split_whitespace().collect();
    let mut right: Vec<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left.sort_unstable();
    right.sort_unstable();
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(narration: &str, withdrawal: f64, deposit: f64) -> RawTransaction {
        RawTransaction {
            date: "15/03/2024".to_string(),
            narration: narration.to_string(),
            cheque_ref: "0000".to_string(),
            value_date: "15/03/2024".to_string(),
            withdrawal,
            deposit,
            closing_balance: 100_000.0,
        }
    }

    #[test]
    fn test_upi_grocery() {
        let tx = Classifier::new().classify(&raw("UPI-BIGBASKET-bigbasket@icici-123-UPI", 1250.0, 0.0));
        assert_eq!(tx.method, Method::Upi);
        assert_eq!(tx.category, Category::Groceries);
        assert_eq!(tx.merchant, "BIGBASKET");
        assert!(!tx.is_income);
        assert_eq!(tx.classification_meta.rule_version, RULE_VERSION);
        assert_eq!(tx.classification_meta.matched_keywords[0], "UPI");
    }

    #[test]
    fn test_self_transfer_by_first_name() {
        let classifier = Classifier::with_customer("Kalpit Sharma");
        let tx = classifier.classify(&raw(
            "RTGS DR-HDFCR52024011512345-KALPIT SHARMA-KALPIT SHARMA-REF",
            500_000.0,
            0.0,
        ));
        assert_eq!(tx.method, Method::Rtgs);
        assert_eq!(tx.category, Category::Investment);
        assert!(tx.classification_meta.self_transfer);
        assert_eq!(tx.classification_meta.confidence, 0.98);
    }

    #[test]
    fn test_self_transfer_by_repeated_beneficiary_without_customer() {
        let tx = Classifier::new().classify(&raw(
            "NEFT DR-HDFC0001234-ANITA RAO-ANITA RAO-SAVINGS",
            20_000.0,
            0.0,
        ));
        assert!(tx.classification_meta.self_transfer);
        assert_eq!(tx.category, Category::Investment);

        // Not round and below the unconditional floor
        let tx = Classifier::new().classify(&raw(
            "NEFT DR-HDFC0001234-ANITA RAO-ANITA RAO-SAVINGS",
            20_500.0,
            0.0,
        ));
        assert!(!tx.classification_meta.self_transfer);
    }

    #[test]
    fn test_credit_refund_from_shopping_merchant() {
        let tx = Classifier::new().classify(&raw("UPI/AMAZON REFUND/998877", 0.0, 2499.0));
        assert_eq!(tx.category, Category::Refund);
        assert!(tx.is_income);
    }

    #[test]
    fn test_credit_safeguard_remaps_expense() {
        // Known shopping merchant without refund wording
        let tx = Classifier::new().classify(&raw("UPI-FLIPKART-PAYOUT@YBL-55", 0.0, 800.0));
        assert_eq!(tx.category, Category::Refund);

        // Bill keyword on a credit becomes income
        let tx = Classifier::new().classify(&raw("NEFT CR-SBIN0009999-ACME-BILL SETTLEMENT", 0.0, 5000.0));
        assert!(!tx.category.is_expense());
    }

    #[test]
    fn test_income_methods_force_income() {
        let tx = Classifier::new().classify(&raw("SALARY FOR MARCH ACME CORP", 0.0, 90_000.0));
        assert_eq!(tx.method, Method::Salary);
        assert_eq!(tx.category, Category::Income);
        assert!(tx.is_income);
    }

    #[test]
    fn test_emi_override_debit_only() {
        let tx = Classifier::new().classify(&raw("HOME LOAN REPAYMENT 0042", 32_000.0, 0.0));
        assert_eq!(tx.category, Category::Loan);
    }

    #[test]
    fn test_online_shopping_method_wins_over_keyword_category() {
        let travel = Classifier::new().classify(&raw("ONL/MAKEMYTRIP/BOOKING 8841", 6_400.0, 0.0));
        assert_eq!(travel.method, Method::OnlineShopping);
        assert_eq!(travel.category, Category::Shopping);
        assert!(travel.classification_meta.reason.starts_with("Online purchase"));

        let food = Classifier::new().classify(&raw("ONL-SWIGGY ORDER 123", 450.0, 0.0));
        assert_eq!(food.method, Method::OnlineShopping);
        assert_eq!(food.category, Category::Shopping);
    }

    #[test]
    fn test_sip_method_is_investment() {
        let tx = Classifier::new().classify(&raw("SIP HDFC MIDCAP FUND", 5_000.0, 0.0));
        assert_eq!(tx.method, Method::Sip);
        assert_eq!(tx.category, Category::Investment);
    }

    #[test]
    fn test_unparseable_date_is_flagged() {
        let mut r = raw("UPI-SWIGGY-ORDER@YBL-1", 300.0, 0.0);
        r.date = "yesterday".to_string();
        let tx = Classifier::new().classify(&r);
        assert!(!tx.classification_meta.date_parsed);
    }

    #[test]
    fn test_default_is_explained() {
        let tx = Classifier::new().classify(&raw("XYZ 0001", 3333.0, 0.0));
        assert_eq!(tx.category, Category::Other);
        assert_eq!(tx.classification_meta.confidence, 0.1);
        assert!(tx.classification_meta.reason.starts_with("No matching"));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = Classifier::with_customer("Anita Rao");
        let r = raw("IMPS-412345678901-RAVI KUMAR-SBIN0001234-XX1234", 40_000.0, 0.0);
        assert_eq!(classifier.classify(&r), classifier.classify(&r));
    }
}
