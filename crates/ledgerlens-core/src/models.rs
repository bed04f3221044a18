//! Domain models for ledgerlens

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Version of the classification rule set, stamped on every classification
pub const RULE_VERSION: &str = "2.3.0";

/// A statement row as produced by the upstream statement parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Transaction date, usually `DD/MM/YYYY`
    pub date: String,
    pub narration: String,
    #[serde(default)]
    pub cheque_ref: String,
    #[serde(default)]
    pub value_date: String,
    /// Debit amount (>= 0)
    #[serde(default)]
    pub withdrawal: f64,
    /// Credit amount (>= 0)
    #[serde(default)]
    pub deposit: f64,
    #[serde(default)]
    pub closing_balance: f64,
}

impl RawTransaction {
    /// Money came in and nothing went out
    pub fn is_credit(&self) -> bool {
        self.deposit > 0.0 && self.withdrawal == 0.0
    }

    pub fn is_debit(&self) -> bool {
        self.withdrawal > 0.0
    }

    /// The amount that moved, whichever side it was on
    pub fn amount(&self) -> f64 {
        if self.withdrawal > 0.0 {
            self.withdrawal
        } else {
            self.deposit
        }
    }

    /// Deterministic identifier used to key derived documents
    pub fn transaction_id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.date.trim().as_bytes());
        hasher.update(self.narration.as_bytes());
        hasher.update(self.withdrawal.to_be_bytes());
        hasher.update(self.deposit.to_be_bytes());
        // Distinguishes same-day rows with identical narration and amount
        hasher.update(self.cheque_ref.trim().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Payment rail a transaction moved on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "UPI")]
    Upi,
    #[serde(rename = "IMPS")]
    Imps,
    #[serde(rename = "NEFT")]
    Neft,
    #[serde(rename = "RTGS")]
    Rtgs,
    #[serde(rename = "ACH")]
    Ach,
    #[serde(rename = "EMI")]
    Emi,
    #[serde(rename = "RD")]
    Rd,
    #[serde(rename = "FD")]
    Fd,
    #[serde(rename = "SIP")]
    Sip,
    Dividend,
    Salary,
    Interest,
    Insurance,
    Investment,
    #[serde(rename = "Self_Transfer")]
    SelfTransfer,
    #[serde(rename = "ATMWithdrawal")]
    AtmWithdrawal,
    DebitCard,
    NetBanking,
    OnlineShopping,
    TaxPayment,
    Cheque,
    BillPaid,
    CardReversal,
    #[serde(rename = "IMPSReversal")]
    ImpsReversal,
    #[serde(rename = "UPIReversal")]
    UpiReversal,
    Other,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upi => "UPI",
            Self::Imps => "IMPS",
            Self::Neft => "NEFT",
            Self::Rtgs => "RTGS",
            Self::Ach => "ACH",
            Self::Emi => "EMI",
            Self::Rd => "RD",
            Self::Fd => "FD",
            Self::Sip => "SIP",
            Self::Dividend => "Dividend",
            Self::Salary => "Salary",
            Self::Interest => "Interest",
            Self::Insurance => "Insurance",
            Self::Investment => "Investment",
            Self::SelfTransfer => "Self_Transfer",
            Self::AtmWithdrawal => "ATMWithdrawal",
            Self::DebitCard => "DebitCard",
            Self::NetBanking => "NetBanking",
            Self::OnlineShopping => "OnlineShopping",
            Self::TaxPayment => "TaxPayment",
            Self::Cheque => "Cheque",
            Self::BillPaid => "BillPaid",
            Self::CardReversal => "CardReversal",
            Self::ImpsReversal => "IMPSReversal",
            Self::UpiReversal => "UPIReversal",
            Self::Other => "Other",
        }
    }

    /// Interbank transfer rails that carry a named beneficiary
    pub fn is_bank_transfer(&self) -> bool {
        matches!(self, Self::Imps | Self::Neft | Self::Rtgs)
    }

    pub fn is_reversal(&self) -> bool {
        matches!(
            self,
            Self::CardReversal | Self::ImpsReversal | Self::UpiReversal
        )
    }

    /// Methods that always denote income
    pub fn is_income_method(&self) -> bool {
        matches!(self, Self::Dividend | Self::Salary | Self::Interest)
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UPI" => Ok(Self::Upi),
            "IMPS" => Ok(Self::Imps),
            "NEFT" => Ok(Self::Neft),
            "RTGS" => Ok(Self::Rtgs),
            "ACH" => Ok(Self::Ach),
            "EMI" => Ok(Self::Emi),
            "RD" => Ok(Self::Rd),
            "FD" => Ok(Self::Fd),
            "SIP" => Ok(Self::Sip),
            "DIVIDEND" => Ok(Self::Dividend),
            "SALARY" => Ok(Self::Salary),
            "INTEREST" => Ok(Self::Interest),
            "INSURANCE" => Ok(Self::Insurance),
            "INVESTMENT" => Ok(Self::Investment),
            "SELF_TRANSFER" => Ok(Self::SelfTransfer),
            "ATMWITHDRAWAL" => Ok(Self::AtmWithdrawal),
            "DEBITCARD" => Ok(Self::DebitCard),
            "NETBANKING" => Ok(Self::NetBanking),
            "ONLINESHOPPING" => Ok(Self::OnlineShopping),
            "TAXPAYMENT" => Ok(Self::TaxPayment),
            "CHEQUE" => Ok(Self::Cheque),
            "BILLPAID" => Ok(Self::BillPaid),
            "CARDREVERSAL" => Ok(Self::CardReversal),
            "IMPSREVERSAL" => Ok(Self::ImpsReversal),
            "UPIREVERSAL" => Ok(Self::UpiReversal),
            "OTHER" => Ok(Self::Other),
            _ => Err(format!("Unknown method: {}", s)),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Spending/earning category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Income,
    Refund,
    Reimbursement,
    Investment,
    Loan,
    Shopping,
    Dining,
    Travel,
    Fuel,
    Groceries,
    #[serde(rename = "Food_Delivery")]
    FoodDelivery,
    #[serde(rename = "Bills_Utilities")]
    BillsUtilities,
    Healthcare,
    Education,
    Entertainment,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Refund => "Refund",
            Self::Reimbursement => "Reimbursement",
            Self::Investment => "Investment",
            Self::Loan => "Loan",
            Self::Shopping => "Shopping",
            Self::Dining => "Dining",
            Self::Travel => "Travel",
            Self::Fuel => "Fuel",
            Self::Groceries => "Groceries",
            Self::FoodDelivery => "Food_Delivery",
            Self::BillsUtilities => "Bills_Utilities",
            Self::Healthcare => "Healthcare",
            Self::Education => "Education",
            Self::Entertainment => "Entertainment",
            Self::Other => "Other",
        }
    }

    /// Categories that only make sense for money going out
    pub fn is_expense(&self) -> bool {
        matches!(
            self,
            Self::Shopping
                | Self::Dining
                | Self::Travel
                | Self::Fuel
                | Self::Groceries
                | Self::FoodDelivery
                | Self::BillsUtilities
                | Self::Loan
                | Self::Healthcare
                | Self::Education
                | Self::Entertainment
        )
    }

    /// Human-readable label for user-facing text
    pub fn label(&self) -> &'static str {
        match self {
            Self::FoodDelivery => "food delivery",
            Self::BillsUtilities => "bills and utilities",
            Self::Income => "income",
            Self::Refund => "refunds",
            Self::Reimbursement => "reimbursements",
            Self::Investment => "investments",
            Self::Loan => "loan repayments",
            Self::Shopping => "shopping",
            Self::Dining => "dining",
            Self::Travel => "travel",
            Self::Fuel => "fuel",
            Self::Groceries => "groceries",
            Self::Healthcare => "healthcare",
            Self::Education => "education",
            Self::Entertainment => "entertainment",
            Self::Other => "other spending",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(' ', "_").as_str() {
            "income" => Ok(Self::Income),
            "refund" => Ok(Self::Refund),
            "reimbursement" => Ok(Self::Reimbursement),
            "investment" => Ok(Self::Investment),
            "loan" => Ok(Self::Loan),
            "shopping" => Ok(Self::Shopping),
            "dining" => Ok(Self::Dining),
            "travel" => Ok(Self::Travel),
            "fuel" => Ok(Self::Fuel),
            "groceries" => Ok(Self::Groceries),
            "food_delivery" => Ok(Self::FoodDelivery),
            "bills_utilities" => Ok(Self::BillsUtilities),
            "healthcare" => Ok(Self::Healthcare),
            "education" => Ok(Self::Education),
            "entertainment" => Ok(Self::Entertainment),
            "other" | "unknown" | "" => Ok(Self::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Explainability record attached to every classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetadata {
    /// Confidence in the chosen category, in [0, 1]
    pub confidence: f64,
    /// Tokens that fired, in the order they fired
    pub matched_keywords: Vec<String>,
    /// Payment gateway token, empty when none
    pub gateway: String,
    pub channel: Method,
    pub rule_version: String,
    /// One human sentence explaining the decision
    pub reason: String,
    /// True when the self-transfer check matched
    #[serde(default)]
    pub self_transfer: bool,
    /// False when the row date could not be parsed and "now" was used instead
    #[serde(default = "default_true")]
    pub date_parsed: bool,
}

fn default_true() -> bool {
    true
}

impl ClassificationMetadata {
    /// Append a keyword if it is not already recorded
    pub fn push_keyword(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        if !self.matched_keywords.contains(&keyword) {
            self.matched_keywords.push(keyword);
        }
    }
}

/// Periodicity of a recurring group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringPattern {
    Weekly,
    Monthly,
    Yearly,
    Irregular,
}

impl RecurringPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Irregular => "irregular",
        }
    }

    /// Label a median inter-arrival gap in days
    pub fn from_interval(days: f64) -> Self {
        if (5.0..=10.0).contains(&days) {
            Self::Weekly
        } else if (25.0..=35.0).contains(&days) {
            Self::Monthly
        } else if (355.0..=375.0).contains(&days) {
            Self::Yearly
        } else {
            Self::Irregular
        }
    }
}

/// Why a transaction was marked recurring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringMeta {
    /// Fingerprint of the matching group, empty when only a keyword matched
    pub signature: String,
    pub pattern: Option<RecurringPattern>,
    pub occurrences: usize,
    pub median_interval_days: Option<f64>,
    /// Mean amount of the matching group
    pub average_amount: Option<f64>,
    /// Narration carried an explicit recurrence keyword
    pub keyword_match: bool,
}

/// A statement row after classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    pub id: String,
    #[serde(flatten)]
    pub raw: RawTransaction,
    pub method: Method,
    /// Canonical merchant, empty when none was found
    pub merchant: String,
    /// Beneficiary name for interbank transfers, empty otherwise
    pub beneficiary: String,
    pub category: Category,
    pub is_income: bool,
    pub is_recurring: bool,
    pub classification_meta: ClassificationMetadata,
    pub recurring_meta: Option<RecurringMeta>,
}

impl ClassifiedTransaction {
    pub fn is_credit(&self) -> bool {
        self.raw.is_credit()
    }

    pub fn withdrawal(&self) -> f64 {
        self.raw.withdrawal
    }

    pub fn deposit(&self) -> f64 {
        self.raw.deposit
    }

    pub fn narration(&self) -> &str {
        &self.raw.narration
    }

    /// The counterparty used for grouping: merchant, then beneficiary
    pub fn counterparty(&self) -> Option<&str> {
        if !self.merchant.is_empty() {
            Some(&self.merchant)
        } else if !self.beneficiary.is_empty() {
            Some(&self.beneficiary)
        } else {
            None
        }
    }

    /// Transfer target: beneficiary, then merchant
    pub fn target(&self) -> Option<&str> {
        if !self.beneficiary.is_empty() {
            Some(&self.beneficiary)
        } else if !self.merchant.is_empty() {
            Some(&self.merchant)
        } else {
            None
        }
    }

    pub fn is_self_transfer(&self) -> bool {
        self.classification_meta.self_transfer || self.method == Method::SelfTransfer
    }
}

/// Recurring-payment document keyed by transaction id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringRecord {
    pub transaction_id: String,
    pub signature: String,
    pub pattern: Option<RecurringPattern>,
    pub occurrences: usize,
    pub median_interval_days: Option<f64>,
    pub average_amount: Option<f64>,
    pub keyword_match: bool,
}

impl RecurringRecord {
    pub fn from_transaction(tx: &ClassifiedTransaction) -> Option<Self> {
        let meta = tx.recurring_meta.as_ref()?;
        Some(Self {
            transaction_id: tx.id.clone(),
            signature: meta.signature.clone(),
            pattern: meta.pattern,
            occurrences: meta.occurrences,
            median_interval_days: meta.median_interval_days,
            average_amount: meta.average_amount,
            keyword_match: meta.keyword_match,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(withdrawal: f64, deposit: f64) -> RawTransaction {
        RawTransaction {
            date: "01/02/2024".to_string(),
            narration: "UPI-TEST".to_string(),
            cheque_ref: "0001".to_string(),
            value_date: "01/02/2024".to_string(),
            withdrawal,
            deposit,
            closing_balance: 0.0,
        }
    }

    #[test]
    fn test_credit_detection() {
        assert!(raw(0.0, 100.0).is_credit());
        assert!(!raw(50.0, 100.0).is_credit());
        assert!(!raw(50.0, 0.0).is_credit());
    }

    #[test]
    fn test_transaction_id_is_stable() {
        let a = raw(10.0, 0.0);
        let b = raw(10.0, 0.0);
        assert_eq!(a.transaction_id(), b.transaction_id());
        assert_eq!(a.transaction_id().len(), 64);
        assert_ne!(a.transaction_id(), raw(11.0, 0.0).transaction_id());
    }

    #[test]
    fn test_expense_categories() {
        assert!(Category::FoodDelivery.is_expense());
        assert!(Category::Loan.is_expense());
        assert!(!Category::Refund.is_expense());
        assert!(!Category::Investment.is_expense());
        assert!(!Category::Other.is_expense());
    }

    #[test]
    fn test_serde_tags_are_stable() {
        assert_eq!(
            serde_json::to_string(&Category::FoodDelivery).unwrap(),
            "\"Food_Delivery\""
        );
        assert_eq!(
            serde_json::to_string(&Method::SelfTransfer).unwrap(),
            "\"Self_Transfer\""
        );
        assert_eq!(serde_json::to_string(&Method::Upi).unwrap(), "\"UPI\"");
    }

    #[test]
    fn test_unknown_collapses_to_other() {
        assert_eq!("Unknown".parse::<Category>().unwrap(), Category::Other);
        assert_eq!("".parse::<Category>().unwrap(), Category::Other);
        assert_eq!(
            "bills utilities".parse::<Category>().unwrap(),
            Category::BillsUtilities
        );
    }

    #[test]
    fn test_recurring_pattern_bands() {
        assert_eq!(RecurringPattern::from_interval(7.0), RecurringPattern::Weekly);
        assert_eq!(RecurringPattern::from_interval(30.0), RecurringPattern::Monthly);
        assert_eq!(RecurringPattern::from_interval(365.0), RecurringPattern::Yearly);
        assert_eq!(RecurringPattern::from_interval(15.0), RecurringPattern::Irregular);
    }
}
