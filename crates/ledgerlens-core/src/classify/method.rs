//! Payment rail classification
//!
//! Rules are evaluated in a fixed order and the first hit wins. The order
//! matters: insurance before dividends, ATM before debit card, and so on.

use regex::Regex;

use super::normalize::Narration;
use crate::models::Method;

const INSURERS: &[&str] = &[
    "HLIC",
    "HDFC LIFE",
    "HDFCLIFE",
    "LIC",
    "LICI",
    "MAXLIFE",
    "MAX LIFE",
    "ICICI PRU",
    "ICICIPRU",
    "SBI LIFE",
    "SBILIFE",
    "BAJAJ ALLIANZ",
    "TATA AIA",
    "KOTAK LIFE",
    "PNB METLIFE",
];
const PREMIUM_MARKERS: &[&str] = &["INST", "INSTALLMENT", "PREMIUM"];
const DIVIDEND_TOKENS: &[&str] = &["DIV", "DIVIDEND"];
const CLEARING_MARKERS: &[&str] = &[
    "INDIAN CLEARING CORPORATION",
    "INDIAN CLEARING CORP",
    "NSE CLEARING",
    "NSDL",
    "CDSL",
    "ZERODHA",
    "UPSTOX",
    "GROWW",
    "ANGEL ONE",
    "ANGELONE",
    "ICICI SECURITIES",
    "HDFC SECURITIES",
    "KOTAK SECURITIES",
];
const CLEARING_TOKENS: &[&str] = &["EBA", "SGB"];
const UPI_MARKERS: &[&str] = &[
    "UPI-", "UPI ", "UPI/", "@YBL", "@PAYTM", "@OKAXIS", "@OKHDFCBANK", "@OKICICI", "@OKSBI",
    "@IBL", "@AXL", "@APL", "@UPI", "@YESBANK", "@ICICI", "@HDFCBANK", "@SBI", "@AXISBANK",
];
const WALLETS: &[&str] = &["PHONEPE", "GPAY", "GOOGLE PAY", "BHIM", "MOBIKWIK", "PAYTM"];
const ACH_MARKERS: &[&str] = &["ACH C-", "ACH D-", "ACH CR", "ACH DR"];
const EMI_WORDS: &[&str] = &["EMI", "LOAN", "REPAYMENT"];
const ATM_TOKENS: &[&str] = &["EAW", "ATW", "NWD", "VAT", "MAT", "NFS", "CCWD", "ATM"];
const CARD_TOKENS: &[&str] = &["POS", "DC", "VPS", "IPS"];
const SALARY_WORDS: &[&str] = &["SALARY", "SAL"];
const INTEREST_MARKERS: &[&str] = &["INTEREST", "INT.PD", "INT PD", "INT.CR", "CREDIT INT"];
const CHEQUE_TOKENS: &[&str] = &["CHQ", "CHEQUE", "CLG"];
const BILL_TOKENS: &[&str] = &["BBPS", "BPAY", "RCHG", "TOP", "BIL", "PAVC"];
const TAX_TOKENS: &[&str] = &["DTAX", "IDTX"];

/// Outcome of method classification
#[derive(Debug, Clone, PartialEq)]
pub struct MethodMatch {
    pub method: Method,
    /// The keyword that decided the method, empty for the default
    pub keyword: String,
}

impl MethodMatch {
    fn new(method: Method, keyword: &str) -> Self {
        Self {
            method,
            keyword: keyword.to_string(),
        }
    }
}

/// Ordered rule set mapping a narration to its payment rail
pub struct MethodClassifier {
    emi_numbered: Regex,
    deposit_scheme: Regex,
}

impl Default for MethodClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodClassifier {
    pub fn new() -> Self {
        Self {
            emi_numbered: Regex::new(r"\bEMI\s*\d+").expect("valid regex"),
            deposit_scheme: Regex::new(r"\b(SIP|RD|FD)\b").expect("valid regex"),
        }
    }

    pub fn classify(&self, n: &Narration) -> MethodMatch {
        if let Some(m) = self.reversal(n) {
            return m;
        }

        // 1. Own-account transfers
        if let Some(t) = n.first_token(&["INF", "INFT"]) {
            return MethodMatch::new(Method::SelfTransfer, t);
        }

        // 2. Insurance premiums need both an insurer and a premium marker
        if let Some(insurer) = n.first_word(INSURERS) {
            if n.first_word(PREMIUM_MARKERS).is_some() {
                return MethodMatch::new(Method::Insurance, insurer);
            }
        }

        // 3. Dividends
        if let Some(t) = n.first_token(DIVIDEND_TOKENS) {
            return MethodMatch::new(Method::Dividend, t);
        }

        // 4. Clearing houses, depositories and brokers
        if let Some(m) = n.first_substring(CLEARING_MARKERS) {
            return MethodMatch::new(Method::Investment, m);
        }
        if let Some(t) = n.first_token(CLEARING_TOKENS) {
            return MethodMatch::new(Method::Investment, t);
        }

        // 5. Deposit schemes; UPI narrations are skipped so VPA fragments
        // like PAYTMQRD never register
        if !self.looks_like_upi(n) {
            if let Some(caps) = self.deposit_scheme.captures(&n.upper) {
                let scheme = &caps[1];
                let method = match scheme {
                    "SIP" => Method::Sip,
                    "RD" => Method::Rd,
                    _ => Method::Fd,
                };
                return MethodMatch::new(method, scheme);
            }
        }

        // 6. UPI
        if n.upper.starts_with("UPI") {
            return MethodMatch::new(Method::Upi, "UPI");
        }
        if let Some(m) = n.first_substring(UPI_MARKERS) {
            return MethodMatch::new(Method::Upi, m.trim());
        }
        if let Some(w) = n.first_word(WALLETS) {
            return MethodMatch::new(Method::Upi, w);
        }

        // 7. Interbank transfers
        for (word, method) in [
            ("IMPS", Method::Imps),
            ("NEFT", Method::Neft),
            ("RTGS", Method::Rtgs),
        ] {
            if n.contains_word(word) || n.upper.starts_with(word) {
                return MethodMatch::new(method, word);
            }
        }

        // 8. ACH mandates
        if let Some(m) = n.first_substring(ACH_MARKERS) {
            return MethodMatch::new(Method::Ach, m);
        }

        // 9. EMI, never on a bare INSTALLMENT
        if let Some(w) = n.first_word(EMI_WORDS) {
            return MethodMatch::new(Method::Emi, w);
        }
        if let Some(m) = self.emi_numbered.find(&n.upper) {
            return MethodMatch::new(Method::Emi, m.as_str());
        }

        // 10. ATM withdrawals must be checked before debit card
        if let Some(t) = n.first_token(ATM_TOKENS) {
            return MethodMatch::new(Method::AtmWithdrawal, t);
        }

        // 11. Debit card
        if let Some(t) = n.first_token(CARD_TOKENS) {
            return MethodMatch::new(Method::DebitCard, t);
        }

        // 12. Net banking
        if n.has_token("IB") || n.upper.starts_with("IB ") {
            return MethodMatch::new(Method::NetBanking, "IB");
        }
        if n.contains("ONLINE TRANSFER") {
            return MethodMatch::new(Method::NetBanking, "ONLINE TRANSFER");
        }

        // 13. Salary, interest, cheque
        if let Some(w) = n.first_word(SALARY_WORDS) {
            return MethodMatch::new(Method::Salary, w);
        }
        if let Some(m) = n.first_substring(INTEREST_MARKERS) {
            return MethodMatch::new(Method::Interest, m);
        }
        if let Some(t) = n.first_token(CHEQUE_TOKENS) {
            return MethodMatch::new(Method::Cheque, t);
        }

        // 14. ICICI shorthand
        if let Some(t) = n.first_token(BILL_TOKENS) {
            return MethodMatch::new(Method::BillPaid, t);
        }
        if n.has_token("ONL") {
            return MethodMatch::new(Method::OnlineShopping, "ONL");
        }
        if let Some(t) = n.first_token(TAX_TOKENS) {
            return MethodMatch::new(Method::TaxPayment, t);
        }

        MethodMatch::new(Method::Other, "")
    }

    fn reversal(&self, n: &Narration) -> Option<MethodMatch> {
        if n.contains("CRV POS") {
            return Some(MethodMatch::new(Method::CardReversal, "CRV POS"));
        }
        if n.contains("REV-IMPS") || n.contains("REV IMPS") {
            return Some(MethodMatch::new(Method::ImpsReversal, "REV-IMPS"));
        }
        if n.contains("REV-UPI") || n.contains("REV UPI") {
            return Some(MethodMatch::new(Method::UpiReversal, "REV-UPI"));
        }
        None
    }

    fn looks_like_upi(&self, n: &Narration) -> bool {
        n.upper.starts_with("UPI") || n.first_substring(UPI_MARKERS).is_some() || n.contains("@")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(narration: &str) -> Method {
        MethodClassifier::new()
            .classify(&Narration::parse(narration))
            .method
    }

    #[test]
    fn test_upi_and_transfers() {
        assert_eq!(method("UPI-BIGBASKET-bigbasket@icici-123-UPI"), Method::Upi);
        assert_eq!(method("IMPS-412345-RAVI KUMAR-SBIN0001234"), Method::Imps);
        assert_eq!(method("NEFT CR-HDFC0000001-ACME CORP"), Method::Neft);
        assert_eq!(
            method("RTGS DR-HDFCR52024011512345-KALPIT SHARMA-KALPIT SHARMA-REF"),
            Method::Rtgs
        );
    }

    #[test]
    fn test_rule_order_self_transfer_first() {
        assert_eq!(method("INF/INFT/0123456/SELF"), Method::SelfTransfer);
    }

    #[test]
    fn test_insurance_requires_premium_marker() {
        assert_eq!(method("ACH D- LIC PREMIUM 4455"), Method::Insurance);
        // Insurer without a premium marker falls through to ACH
        assert_eq!(method("ACH D- LIC 4455"), Method::Ach);
    }

    #[test]
    fn test_dividend_and_clearing() {
        assert_eq!(method("ACH C- INFOSYS FINAL DIV 2024"), Method::Dividend);
        assert_eq!(
            method("NEFT-INDIAN CLEARING CORPORATION-PAYOUT"),
            Method::Investment
        );
    }

    #[test]
    fn test_deposit_schemes_word_boundary() {
        assert_eq!(method("SIP HDFC MIDCAP FUND"), Method::Sip);
        assert_eq!(method("TRF TO RD 1234"), Method::Rd);
        // QR payment VPA fragment must not read as a recurring deposit
        assert_eq!(method("UPI-SHOP-PAYTMQRD@PAYTM-1"), Method::Upi);
    }

    #[test]
    fn test_emi_never_on_bare_installment() {
        assert_eq!(method("BAJAJ FIN EMI 12"), Method::Emi);
        assert_eq!(method("HOME LOAN REPAYMENT"), Method::Emi);
        assert_ne!(method("GYM INSTALLMENT 3"), Method::Emi);
    }

    #[test]
    fn test_atm_before_debit_card() {
        assert_eq!(method("NWD-512345XXXXXX1234-ATM DELHI"), Method::AtmWithdrawal);
        assert_eq!(method("POS 512345XXXXXX1234 STARBUCKS"), Method::DebitCard);
    }

    #[test]
    fn test_reversals() {
        assert_eq!(method("CRV POS 512345 AMAZON"), Method::CardReversal);
        assert_eq!(method("REV-IMPS-412345-RAVI"), Method::ImpsReversal);
        assert_eq!(method("REV-UPI-998877-SWIGGY"), Method::UpiReversal);
    }

    #[test]
    fn test_icici_shorthand_and_default() {
        assert_eq!(method("BIL/ONL/000123/AIRTEL"), Method::BillPaid);
        assert_eq!(method("ONL/AMAZON SELLER"), Method::OnlineShopping);
        assert_eq!(method("DTAX/CBDT/2024"), Method::TaxPayment);
        assert_eq!(method("SALARY FOR MARCH"), Method::Salary);
        assert_eq!(method("CASH DEPOSIT BRANCH"), Method::Other);
    }
}
