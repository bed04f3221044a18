//! Merchant and beneficiary extraction

use regex::Regex;

use super::normalize::{contains_word, normalize, Narration};
use crate::models::{Category, Method};

/// How an alias pattern is matched against the narration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasMatch {
    /// Plain substring, survives gateway prefixes like `PAYUZOMATO`
    Contains,
    /// Whole word, for short names that appear inside other words
    Word,
}

/// One row of the curated merchant table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MerchantAlias {
    pub pattern: &'static str,
    pub canonical: &'static str,
    pub category: Category,
    pub confidence: f64,
    pub matching: AliasMatch,
}

const fn alias(
    pattern: &'static str,
    canonical: &'static str,
    category: Category,
    confidence: f64,
    matching: AliasMatch,
) -> MerchantAlias {
    MerchantAlias {
        pattern,
        canonical,
        category,
        confidence,
        matching,
    }
}

use AliasMatch::{Contains, Word};
use Category::*;

/// Curated merchants. More specific patterns come first.
const ALIASES: &[MerchantAlias] = &[
    // Groceries
    alias("SWIGGY INSTAMART", "SWIGGY INSTAMART", Groceries, 0.9, Contains),
    alias("INSTAMART", "SWIGGY INSTAMART", Groceries, 0.9, Contains),
    alias("BIGBASKET", "BIGBASKET", Groceries, 0.92, Contains),
    alias("BIG BASKET", "BIGBASKET", Groceries, 0.92, Contains),
    alias("BIG BAZAAR", "BIG BAZAAR", Groceries, 0.9, Contains),
    alias("BIGBAZAAR", "BIG BAZAAR", Groceries, 0.9, Contains),
    alias("AVENUE SUPERMARTS", "DMART", Groceries, 0.9, Contains),
    alias("DMART", "DMART", Groceries, 0.9, Contains),
    alias("D MART", "DMART", Groceries, 0.9, Word),
    alias("BLINKIT", "BLINKIT", Groceries, 0.9, Contains),
    alias("GROFERS", "BLINKIT", Groceries, 0.9, Contains),
    alias("ZEPTO", "ZEPTO", Groceries, 0.9, Contains),
    alias("JIOMART", "JIOMART", Groceries, 0.9, Contains),
    alias("RELIANCE FRESH", "RELIANCE FRESH", Groceries, 0.9, Contains),
    alias("RELIANCE SMART", "RELIANCE SMART", Groceries, 0.9, Contains),
    // Food delivery
    alias("SWIGGY", "SWIGGY", FoodDelivery, 0.9, Contains),
    alias("ZOMATO", "ZOMATO", FoodDelivery, 0.9, Contains),
    alias("FAASOS", "FAASOS", FoodDelivery, 0.9, Contains),
    alias("EATSURE", "EATSURE", FoodDelivery, 0.9, Contains),
    // Shopping
    alias("AMAZON PAY", "AMAZON", Shopping, 0.7, Contains),
    alias("AMAZONPAY", "AMAZON", Shopping, 0.7, Contains),
    alias("AMAZON", "AMAZON", Shopping, 0.9, Contains),
    alias("AMZN", "AMAZON", Shopping, 0.9, Contains),
    alias("FLIPKART", "FLIPKART", Shopping, 0.9, Contains),
    alias("MYNTRA", "MYNTRA", Shopping, 0.9, Contains),
    alias("AJIO", "AJIO", Shopping, 0.9, Contains),
    alias("NYKAA", "NYKAA", Shopping, 0.9, Contains),
    alias("MEESHO", "MEESHO", Shopping, 0.9, Contains),
    alias("CROMA", "CROMA", Shopping, 0.9, Contains),
    alias("RELIANCE DIGITAL", "RELIANCE DIGITAL", Shopping, 0.9, Contains),
    alias("RELIANCE TRENDS", "RELIANCE TRENDS", Shopping, 0.9, Contains),
    alias("RELIANCE RETAIL", "RELIANCE RETAIL", Shopping, 0.85, Contains),
    alias("TANISHQ", "TANISHQ", Shopping, 0.9, Contains),
    alias("DECATHLON", "DECATHLON", Shopping, 0.9, Contains),
    alias("IKEA", "IKEA", Shopping, 0.9, Word),
    // Travel
    alias("UBER", "UBER", Travel, 0.9, Contains),
    alias("OLACABS", "OLA", Travel, 0.9, Contains),
    alias("OLA", "OLA", Travel, 0.9, Word),
    alias("RAPIDO", "RAPIDO", Travel, 0.9, Contains),
    alias("MAKEMYTRIP", "MAKEMYTRIP", Travel, 0.9, Contains),
    alias("MMT", "MAKEMYTRIP", Travel, 0.9, Word),
    alias("GOIBIBO", "GOIBIBO", Travel, 0.9, Contains),
    alias("IRCTC", "IRCTC", Travel, 0.9, Contains),
    alias("REDBUS", "REDBUS", Travel, 0.9, Contains),
    alias("INDIGO", "INDIGO", Travel, 0.9, Contains),
    // Fuel
    alias("INDIAN OIL", "INDIAN OIL", Fuel, 0.9, Contains),
    alias("IOCL", "INDIAN OIL", Fuel, 0.9, Contains),
    alias("BHARAT PETROLEUM", "BHARAT PETROLEUM", Fuel, 0.9, Contains),
    alias("BPCL", "BHARAT PETROLEUM", Fuel, 0.9, Contains),
    alias("HPCL", "HINDUSTAN PETROLEUM", Fuel, 0.9, Contains),
    // Entertainment
    alias("NETFLIX", "NETFLIX", Entertainment, 0.9, Contains),
    alias("SPOTIFY", "SPOTIFY", Entertainment, 0.9, Contains),
    alias("HOTSTAR", "HOTSTAR", Entertainment, 0.9, Contains),
    alias("BOOKMYSHOW", "BOOKMYSHOW", Entertainment, 0.9, Contains),
    alias("PVR", "PVR", Entertainment, 0.9, Word),
    // Dining
    alias("STARBUCKS", "STARBUCKS", Dining, 0.9, Contains),
    alias("MCDONALD", "MCDONALDS", Dining, 0.85, Contains),
    alias("DOMINOS", "DOMINOS", Dining, 0.85, Contains),
    alias("HALDIRAM", "HALDIRAMS", Dining, 0.85, Contains),
    // Healthcare
    alias("APOLLO PHARMACY", "APOLLO PHARMACY", Healthcare, 0.9, Contains),
    alias("PHARMEASY", "PHARMEASY", Healthcare, 0.9, Contains),
    alias("NETMEDS", "NETMEDS", Healthcare, 0.9, Contains),
    alias("1MG", "TATA 1MG", Healthcare, 0.9, Word),
    // Utilities
    alias("INDRAPRASTHA GAS", "INDRAPRASTHA GAS", BillsUtilities, 0.9, Contains),
    alias("IGL", "INDRAPRASTHA GAS", BillsUtilities, 0.9, Word),
    alias("MAHANAGAR GAS", "MAHANAGAR GAS", BillsUtilities, 0.9, Contains),
    alias("MGL", "MAHANAGAR GAS", BillsUtilities, 0.9, Word),
    alias("BSES", "BSES", BillsUtilities, 0.9, Contains),
    alias("TATA POWER", "TATA POWER", BillsUtilities, 0.9, Contains),
    alias("ADANI ELECTRICITY", "ADANI ELECTRICITY", BillsUtilities, 0.9, Contains),
    alias("AIRTEL", "AIRTEL", BillsUtilities, 0.9, Contains),
    alias("VODAFONE", "VODAFONE IDEA", BillsUtilities, 0.9, Contains),
    alias("JIO", "JIO", BillsUtilities, 0.85, Word),
    alias("CRED", "CRED", BillsUtilities, 0.85, Word),
    // Brokers
    alias("ZERODHA", "ZERODHA", Investment, 0.9, Contains),
    alias("GROWW", "GROWW", Investment, 0.9, Contains),
    alias("UPSTOX", "UPSTOX", Investment, 0.9, Contains),
];

const HONORIFICS: &[&str] = &["MR ", "MRS ", "MS ", "MR. ", "MRS. ", "MS. "];
const COMPANY_SUFFIXES: &[&str] = &[" PVT LTD", " PRIVATE LIMITED", " LIMITED", " LTD"];

/// First curated merchant found in `text`
pub fn lookup_alias(text: &str) -> Option<&'static MerchantAlias> {
    ALIASES.iter().find(|a| match a.matching {
        AliasMatch::Contains => text.contains(a.pattern),
        AliasMatch::Word => contains_word(text, a.pattern),
    })
}

/// Normalize an extracted name to its canonical form
pub fn canonicalize(name: &str) -> String {
    let mut name = normalize(name);
    if let Some(hit) = lookup_alias(&name) {
        return hit.canonical.to_string();
    }
    name = strip_honorific(&name);
    for suffix in COMPANY_SUFFIXES {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim_end().to_string();
            break;
        }
    }
    name.trim_matches(|c: char| c == '.' || c == ' ').to_string()
}

fn strip_honorific(name: &str) -> String {
    for h in HONORIFICS {
        if let Some(rest) = name.strip_prefix(h) {
            return rest.trim().to_string();
        }
    }
    name.to_string()
}

/// Result of merchant/beneficiary extraction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Canonical merchant, empty when nothing was found
    pub merchant: String,
    /// Transfer beneficiary, empty for non-transfer rails
    pub beneficiary: String,
    /// Curated table row, when the narration named a known merchant
    pub known: Option<&'static MerchantAlias>,
}

/// Pulls merchant and beneficiary names out of a narration
pub struct MerchantExtractor {
    transfer: Regex,
    imps_ref: Regex,
    upi: Regex,
    ach: Regex,
    pos: Regex,
    gateway: Regex,
}

impl Default for MerchantExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MerchantExtractor {
    pub fn new() -> Self {
        Self {
            // RTGS DR-HDFCR52024011512345-KALPIT SHARMA-...
            transfer: Regex::new(
                r"(IMPS|NEFT|RTGS)[ -](?:(CR|DR)-?)?([A-Z]{4}[A-Z0-9]*\d[A-Z0-9]*)-([A-Z .]+)-",
            )
            .expect("valid regex"),
            // IMPS-412345678901-RAVI KUMAR-SBIN0001234-...
            imps_ref: Regex::new(r"IMPS-(\d+)-([A-Z .]+)-").expect("valid regex"),
            upi: Regex::new(r"UPI[-/ ]([^-@/]+)").expect("valid regex"),
            ach: Regex::new(r"ACH [CD]R?-?\s*([A-Z][A-Z .&]*[A-Z])").expect("valid regex"),
            pos: Regex::new(r"POS\s+[0-9X*]*\s*([A-Z][A-Z .&']*[A-Z])").expect("valid regex"),
            gateway: Regex::new(
                r"(?:BILLDESK|BILLDK|PAYU|RAZP|RAZORPAY|CCAVENUE)[-* ]?([A-Z][A-Z .&]*[A-Z])",
            )
            .expect("valid regex"),
        }
    }

    pub fn extract(&self, n: &Narration, method: Method) -> Extraction {
        let known = lookup_alias(&n.upper);
        let beneficiary = if method.is_bank_transfer() {
            self.beneficiary(n).unwrap_or_default()
        } else {
            String::new()
        };

        let merchant = match known {
            Some(hit) => hit.canonical.to_string(),
            None if !beneficiary.is_empty() => canonicalize(&beneficiary),
            None => self
                .channel_merchant(n, method)
                .map(|m| canonicalize(&m))
                .unwrap_or_default(),
        };

        Extraction {
            merchant,
            beneficiary,
            known,
        }
    }

    /// Name between the IFSC-like token and the next hyphen, honorific stripped
    pub fn beneficiary(&self, n: &Narration) -> Option<String> {
        let name = if let Some(caps) = self.transfer.captures(&n.upper) {
            caps.get(4)?.as_str().to_string()
        } else {
            self.imps_ref.captures(&n.upper)?.get(2)?.as_str().to_string()
        };
        let name = strip_honorific(name.trim());
        (!name.is_empty()).then_some(name)
    }

    fn channel_merchant(&self, n: &Narration, method: Method) -> Option<String> {
        let regex = match method {
            Method::Upi | Method::UpiReversal => &self.upi,
            Method::Ach | Method::Insurance | Method::Dividend => &self.ach,
            Method::DebitCard | Method::CardReversal => &self.pos,
            _ => &self.gateway,
        };
        let found = regex
            .captures(&n.upper)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty() && m.chars().any(|c| c.is_ascii_alphabetic()));
        found.or_else(|| {
            // Gateway-prefixed merchants show up on any rail
            self.gateway
                .captures(&n.upper)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
    }
}
