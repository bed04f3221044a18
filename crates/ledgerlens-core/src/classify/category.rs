//! Layered category decision procedure
//!
//! Layers run from most to least specific and the first layer that matches
//! returns. Later layers never see a narration an earlier layer claimed, so
//! e.g. POS + restaurant is Dining and never reaches the food delivery rules.

use regex::Regex;
use tracing::trace;

use super::merchant::Extraction;
use super::normalize::{AmountPattern, Narration};
use crate::models::{Category, Method};

/// Gas payments above this are not household bills
pub const GAS_BILL_LIMIT: f64 = 25_000.0;
/// Transfers above this are never bills
pub const LARGE_TRANSFER_LIMIT: f64 = 100_000.0;
const CHARGE_LIMIT: f64 = 50.0;
const P2P_MIN: f64 = 5_000.0;
const INVESTMENT_TRANSFER_MIN: f64 = 10_000.0;
const DEFAULT_CONFIDENCE: f64 = 0.1;

const LOAN_AUTO_DEBIT: &[&str] = &["ECS EMI", "NACH EMI", "SI EMI", "AUTO EMI", "MANDATE EMI"];
const LOAN_COMPANIONS: &[&str] = &["LOAN", "ECS", "NACH", "SI", "MANDATE", "INSTALLMENT"];
const LENDERS: &[&str] = &[
    "BAJAJ FIN",
    "BAJAJ FINANCE",
    "HOME LOAN",
    "PERSONAL LOAN",
    "CAR LOAN",
    "AUTO LOAN",
    "EDUCATION LOAN",
    "LOAN REPAYMENT",
    "TATA CAPITAL",
    "LIC HOUSING",
    "FULLERTON",
    "MUTHOOT",
    "HDB FINANCIAL",
    "CAPITAL FIRST",
];
const CRED_BILL: &[&str] = &["CRED CLUB", "CREDCLUB", "CRED"];

const POS_DINING: &[&str] = &[
    "RESTAURANT", "CAFE", "COFFEE", "DHABA", "BAR", "BISTRO", "KITCHEN", "EATERY", "FOOD COURT",
    "PIZZA", "BURGER", "BAKERY", "STARBUCKS", "MCDONALD", "DOMINOS", "KFC", "HALDIRAM",
];
const POS_GROCERY: &[&str] = &[
    "SUPERMARKET", "HYPERMARKET", "MART", "GROCERY", "KIRANA", "FRESH", "PROVISION", "DMART",
];
const POS_RETAIL: &[&str] = &[
    "RETAIL", "STORE", "STORES", "PURCHASE", "SHOP", "MALL", "FASHION", "TRENDS", "LIFESTYLE",
];

const DELIVERY_GATEWAY: &[&str] = &[
    "PAYUZOMATO", "RAZPZOMATO", "RAZPSWIGGY", "PAYUSWIGGY", "BILLDKZOMATO", "CCAVENUESWIGGY",
];
const DELIVERY_APPS: &[&str] = &["ZOMATO", "SWIGGY", "FAASOS", "EATSURE", "BOX8", "FRESHMENU"];

const FUEL: &[&str] = &[
    "PETROL", "PETROLEUM", "FUEL", "DIESEL", "FILLING STATION", "HPCL", "BPCL", "IOCL",
    "INDIAN OIL", "SHELL", "NAYARA", "FUEL STATION",
];
const DINING: &[&str] = &[
    "RESTAURANT", "CAFE", "COFFEE", "DHABA", "BISTRO", "EATERY", "BAKERY", "PIZZA", "BURGER",
    "KFC", "STARBUCKS", "MCDONALD", "DOMINOS", "HALDIRAM", "BARBEQUE", "CHAAYOS",
];
const TRAVEL: &[&str] = &[
    "UBER", "OLA", "RAPIDO", "IRCTC", "MAKEMYTRIP", "GOIBIBO", "CLEARTRIP", "YATRA", "REDBUS",
    "AIRLINES", "AIRWAYS", "INDIGO", "VISTARA", "AIR INDIA", "SPICEJET", "AKASA", "RAILWAY",
    "METRO", "OYO", "HOTEL",
];
const HEALTHCARE: &[&str] = &[
    "PHARMACY", "PHARMA", "MEDICAL", "MEDICOS", "CHEMIST", "HOSPITAL", "CLINIC", "DIAGNOSTIC",
    "APOLLO", "PHARMEASY", "NETMEDS", "1MG", "MEDPLUS",
];
const GROCERIES: &[&str] = &[
    "GROCERY", "GROCERIES", "SUPERMARKET", "KIRANA", "BIGBASKET", "DMART", "BLINKIT", "ZEPTO",
    "JIOMART", "NATURES BASKET", "SPENCERS", "VEGETABLE", "FRUITS", "DAIRY",
];
const SHOPPING: &[&str] = &[
    "AMAZON", "FLIPKART", "MYNTRA", "AJIO", "NYKAA", "MEESHO", "CROMA", "TANISHQ",
    "RELIANCE DIGITAL", "SHOPPERS STOP", "LIFESTYLE", "WESTSIDE", "PANTALOONS", "DECATHLON",
    "IKEA", "JEWELLERS", "JEWELLERY", "ELECTRONICS", "FASHION", "MALL",
];

const BILL_EXCLUDED: &[&str] = &[
    "RESTAURANT", "CAFE", "HOTEL", "PHARMACY", "MEDICAL", "HOSPITAL", "JEWELLERS", "JEWELLERY",
    "MARKET", "MART", "SWIGGY", "ZOMATO", "FOOD", "BAKERY",
];
const TRUE_BILL_GATEWAYS: &[&str] = &[
    "BILLDESK", "BILLDK", "BBPS", "SBIPG", "AXISPG", "ICICIPG", "KOTAKPG", "YESPG", "WHDF",
    "PAYGOV",
];
const GENERIC_GATEWAYS: &[&str] = &[
    "PAYTM", "GPAY", "PHONEPE", "AMAZONPAY", "PAYU", "RAZORPAY", "RAZP", "CCAVENUE",
];
const BILL_KEYWORDS: &[&str] = &[
    "BILL",
    "BBPS",
    "RECHARGE",
    "UTILITY PAYMENT",
    "BILLPAY",
    "BILL PAYMENT",
    "POSTPAID",
    "PREPAID",
];
const PAYTM_UTILITY: &[&str] = &["PAYTM UTILITY", "UTILITYPAYTM"];

const ELECTRICITY: &[&str] = &[
    "ELECTRICITY", "BSES", "TATA POWER", "ADANI ELECTRICITY", "MSEDCL", "BESCOM", "TNEB",
    "TORRENT POWER", "CESC", "POWER",
];
const GAS_COMPANIES: &[&str] = &[
    "INDRAPRASTHA GAS", "IGL", "MAHANAGAR GAS", "MGL", "GUJARAT GAS", "ADANI GAS",
];
const GAS: &[&str] = &[
    "INDRAPRASTHA GAS", "IGL", "MAHANAGAR GAS", "MGL", "GUJARAT GAS", "ADANI GAS", "GAS", "LPG",
    "INDANE", "BHARATGAS",
];
const WATER: &[&str] = &["WATER", "JAL BOARD", "DJB"];
const TELECOM: &[&str] = &[
    "AIRTEL", "JIO", "VODAFONE", "BSNL", "MTNL", "BROADBAND", "FIBERNET", "MOBILE",
];
const DTH: &[&str] = &["TATA SKY", "TATAPLAY", "TATA PLAY", "DISH TV", "DISHTV", "D2H", "SUN DIRECT", "DTH"];
const TOLL: &[&str] = &["FASTAG", "TOLL", "NETC"];
const GOVERNMENT: &[&str] = &["GOVT", "GOVERNMENT", "MUNICIPAL", "MCD", "NDMC", "PASSPORT", "RTO"];
const ULIP: &[&str] = &["ULIP", "ENDOWMENT", "UNIT LINKED"];
const INSURANCE: &[&str] = &["INSURANCE", "PREMIUM", "POLICY", "LIC"];
const CREDIT_CARD: &[&str] = &["CREDIT CARD", "CC PAYMENT", "CARD PAYMENT", "CCPAY", "CC BILL"];
const GATEWAY_LOAN: &[&str] = &["EMI", "LOAN"];
const HOUSING: &[&str] = &["MAINTENANCE", "SOCIETY", "HOUSING", "APARTMENT", "RENT"];
const TAX: &[&str] = &["INCOME TAX", "PROPERTY TAX", "TAX", "GST", "TDS"];

const ENTERTAINMENT: &[&str] = &[
    "NETFLIX", "SPOTIFY", "HOTSTAR", "PRIME VIDEO", "BOOKMYSHOW", "PVR", "INOX", "SONYLIV",
    "ZEE5", "GAANA", "STEAM", "PLAYSTATION",
];
const DONATIONS: &[&str] = &[
    "DONATION", "TEMPLE", "CHARITY", "MANDIR", "GURUDWARA", "CHURCH", "MOSQUE", "NGO",
];
const AUTO_SERVICES: &[&str] = &[
    "AUTO PARTS", "SPARES", "SERVICE CENTER", "SERVICE CENTRE", "CAR WASH", "TYRE", "TYRES",
    "GARAGE", "MOTORS",
];
const HEALTH_SERVICES: &[&str] = &[
    "DENTAL", "EYE CARE", "PATHLAB", "PATH LAB", "THYROCARE", "LAL PATH", "PHYSIO",
];
const EDUCATION: &[&str] = &[
    "SCHOOL", "COLLEGE", "UNIVERSITY", "TUITION", "ACADEMY", "COACHING", "BYJU", "UNACADEMY",
    "UDEMY", "COURSERA", "FEES",
];

const BROKERS: &[&str] = &[
    "ZERODHA", "GROWW", "UPSTOX", "ANGEL ONE", "ANGELONE", "5PAISA", "ICICIDIRECT",
    "HDFC SEC", "KOTAK SEC", "MOTILAL",
];
const INVESTMENT_TOKENS: &[&str] = &[
    "MUTUAL FUND", "MF", "SIP", "FIXED DEPOSIT", "RECURRING DEPOSIT", "NPS", "PPF", "SGB",
];
const INVESTMENT_UPI: &[&str] = &["INDMONEY", "KUVERA", "PAYTM MONEY", "PAYTMMONEY", "ETMONEY", "MUTUAL"];
const CRYPTO: &[&str] = &["WAZIRX", "COINDCX", "COINSWITCH", "ZEBPAY", "BINANCE"];
const BANK_ENTITIES: &[&str] = &[
    "BANK", "SECURITIES", "MUTUAL FUND", "AMC", "BROKING", "ASSET MANAGEMENT",
];

const CHARGES: &[&str] = &[
    "CHARGE", "CHARGES", "CHRG", "CHGS", "FEE", "GST", "SMS", "ANNUAL FEE", "DEBIT CARD FEE",
];
const STANDING_INSTRUCTION: &[&str] = &["STANDING INSTRUCTION", "AUTOPAY", "AUTO PAY", "SI"];
const BUSINESS_WORDS: &[&str] = &[
    "STORE", "STORES", "SHOP", "ENTERPRISES", "TRADERS", "SERVICES", "MART", "CENTRE", "CENTER",
    "AGENCY", "AGENCIES", "HOTEL", "PVT", "LTD",
];

/// Everything the category layers look at
#[derive(Debug, Clone, Copy)]
pub struct CategoryInput<'a> {
    pub narration: &'a Narration,
    pub method: Method,
    /// Amount that moved, on whichever side
    pub amount: f64,
    pub extraction: &'a Extraction,
}

/// Outcome of the layered category decision
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub category: Category,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
    pub reason: String,
}

impl CategoryResult {
    fn new(category: Category, confidence: f64, keyword: &str, reason: impl Into<String>) -> Self {
        Self {
            category,
            confidence,
            matched_keywords: vec![keyword.to_string()],
            reason: reason.into(),
        }
    }

    fn fallback() -> Self {
        Self {
            category: Category::Other,
            confidence: DEFAULT_CONFIDENCE,
            matched_keywords: Vec::new(),
            reason: "No matching rule for narration".to_string(),
        }
    }

    /// True for the default result
    pub fn is_fallback(&self) -> bool {
        self.matched_keywords.is_empty() && self.reason.starts_with("No matching")
    }
}

/// Maps a normalized narration to a category
pub struct CategoryClassifier {
    emi_numbered: Regex,
    youtube: Regex,
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryClassifier {
    pub fn new() -> Self {
        Self {
            emi_numbered: Regex::new(r"\bEMI\s*\d+").expect("valid regex"),
            // YouTube only; `YT` alone would match inside PAYTM
            youtube: Regex::new(r"\b(YOUTUBE|YOUTUBEPREMIUM|GOOGLE YOUTUBE|YT PREMIUM)\b")
                .expect("valid regex"),
        }
    }

    pub fn classify(&self, input: &CategoryInput<'_>) -> CategoryResult {
        let layers: [(&str, fn(&Self, &CategoryInput<'_>) -> Option<CategoryResult>); 11] = [
            ("known_merchant", Self::known_merchant),
            ("loan", Self::loan),
            ("rent", Self::rent_and_cred),
            ("pos", Self::pos_discriminator),
            ("food_delivery", Self::food_delivery),
            ("keywords", Self::keyword_tables),
            ("bills", Self::bills),
            ("lifestyle", Self::lifestyle),
            ("investment", Self::investment),
            ("charges", Self::charges),
            ("residual", Self::residual),
        ];

        for (layer, rule) in layers {
            if let Some(result) = rule(self, input) {
                trace!(layer, category = %result.category, "Category layer matched");
                return self.compose_confidence(input, result);
            }
        }
        CategoryResult::fallback()
    }

    /// Layer 0
    fn known_merchant(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let known = input.extraction.known?;
        if known.confidence < 0.9 {
            return None;
        }
        if has_loan_indicator(input.narration) || is_large_gas_payment(input) {
            return None;
        }
        // Card swipes at a delivery brand's outlet are dine-in
        if known.category == Category::FoodDelivery && input.narration.has_token("POS") {
            return None;
        }
        Some(CategoryResult::new(
            known.category,
            known.confidence,
            known.pattern,
            format!("Known merchant {}", known.canonical),
        ))
    }

    /// Layer 1
    fn loan(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        if let Some(m) = n.first_word(LOAN_AUTO_DEBIT) {
            return Some(CategoryResult::new(
                Category::Loan,
                0.95,
                m,
                "Auto-debit loan instalment",
            ));
        }
        if n.contains_word("EMI") {
            if let Some(companion) = n.first_word(LOAN_COMPANIONS) {
                let mut result =
                    CategoryResult::new(Category::Loan, 0.9, "EMI", "EMI with loan indicator");
                result.matched_keywords.push(companion.to_string());
                return Some(result);
            }
        }
        if let Some(m) = self.emi_numbered.find(&n.upper) {
            return Some(CategoryResult::new(
                Category::Loan,
                0.85,
                m.as_str(),
                "Numbered EMI instalment",
            ));
        }
        if let Some(lender) = n.first_word(LENDERS) {
            return Some(CategoryResult::new(
                Category::Loan,
                0.8,
                lender,
                format!("Repayment to lender {}", lender),
            ));
        }
        if n.contains_word("LOAN") {
            return Some(CategoryResult::new(
                Category::Loan,
                0.75,
                "LOAN",
                "Loan keyword in narration",
            ));
        }
        None
    }

    /// Layer 2
    fn rent_and_cred(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        if n.contains_word("RENT") {
            return Some(CategoryResult::new(
                Category::BillsUtilities,
                0.9,
                "RENT",
                "Rent payment",
            ));
        }
        if let Some(m) = n.first_word(CRED_BILL) {
            return Some(CategoryResult::new(
                Category::BillsUtilities,
                0.85,
                m,
                "Credit card bill paid through CRED",
            ));
        }
        None
    }

    /// Layer 3
    fn pos_discriminator(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        if !n.has_token("POS") {
            return None;
        }
        if let Some(k) = n.first_word(POS_DINING) {
            return Some(CategoryResult::new(
                Category::Dining,
                0.85,
                k,
                "Card payment at a restaurant",
            ));
        }
        if let Some(k) = n.first_word(POS_GROCERY) {
            return Some(CategoryResult::new(
                Category::Groceries,
                0.85,
                k,
                "Card payment at a grocery store",
            ));
        }
        if let Some(k) = n.first_word(POS_RETAIL) {
            return Some(CategoryResult::new(
                Category::Shopping,
                0.75,
                k,
                "Card payment at a retail store",
            ));
        }
        None
    }

    /// Layer 4
    fn food_delivery(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        if n.has_token("POS") {
            return None;
        }
        if let Some(k) = n.first_substring(DELIVERY_GATEWAY) {
            return Some(CategoryResult::new(
                Category::FoodDelivery,
                0.9,
                k,
                "Food delivery order through a payment gateway",
            ));
        }
        if let Some(k) = n.first_substring(DELIVERY_APPS) {
            return Some(CategoryResult::new(
                Category::FoodDelivery,
                0.85,
                k,
                format!("Food delivery order on {}", k),
            ));
        }
        None
    }

    /// Layer 5. Fuel first; healthcare ahead of the bill rules.
    fn keyword_tables(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        let tables: [(&[&str], Category, f64, &str); 6] = [
            (FUEL, Category::Fuel, 0.85, "Fuel purchase"),
            (DINING, Category::Dining, 0.8, "Dining keyword"),
            (TRAVEL, Category::Travel, 0.8, "Travel keyword"),
            (HEALTHCARE, Category::Healthcare, 0.8, "Pharmacy or medical keyword"),
            (GROCERIES, Category::Groceries, 0.8, "Grocery keyword"),
            (SHOPPING, Category::Shopping, 0.75, "Shopping keyword"),
        ];
        tables.iter().find_map(|(words, category, confidence, reason)| {
            n.first_word(words)
                .map(|k| CategoryResult::new(*category, *confidence, k, *reason))
        })
    }

    /// Layer 6
    fn bills(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        if n.first_word(BILL_EXCLUDED).is_some() {
            return None;
        }
        if input.amount > LARGE_TRANSFER_LIMIT {
            return None;
        }

        let gateway = n.first_substring(TRUE_BILL_GATEWAYS);
        let keyword = n
            .first_word(BILL_KEYWORDS)
            .or_else(|| n.first_substring(PAYTM_UTILITY))
            .or_else(|| (input.method == Method::BillPaid).then_some("BIL"));
        let utility = [ELECTRICITY, GAS, WATER, TELECOM]
            .iter()
            .find_map(|words| n.first_word(words));

        let qualifies = keyword.is_some() || (gateway.is_some() && utility.is_some());
        if !qualifies {
            if let Some(g) = n.first_substring(GENERIC_GATEWAYS) {
                trace!(gateway = g, "Generic gateway alone does not make a bill");
            }
            return None;
        }

        let mut result = self.bill_subtype(input)?;
        for k in [gateway, keyword].into_iter().flatten() {
            if !result.matched_keywords.iter().any(|m| m == k) {
                result.matched_keywords.push(k.to_string());
            }
        }
        Some(result)
    }

    fn bill_subtype(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        let bills = Category::BillsUtilities;

        if let Some(k) = n.first_word(ELECTRICITY) {
            return Some(CategoryResult::new(bills, 0.9, k, "Electricity bill"));
        }
        if let Some(k) = n.first_word(GAS) {
            if input.amount <= GAS_BILL_LIMIT {
                return Some(CategoryResult::new(bills, 0.9, k, "Gas bill"));
            }
            return Some(large_gas_result(k));
        }
        if let Some(k) = n.first_word(WATER) {
            return Some(CategoryResult::new(bills, 0.9, k, "Water bill"));
        }
        if let Some(k) = n.first_word(TELECOM) {
            return Some(CategoryResult::new(bills, 0.9, k, "Phone or internet bill"));
        }
        if let Some(k) = n.first_word(DTH) {
            return Some(CategoryResult::new(bills, 0.85, k, "DTH recharge"));
        }
        if let Some(k) = n.first_word(TOLL) {
            return Some(CategoryResult::new(bills, 0.85, k, "Toll or FASTag recharge"));
        }
        if let Some(k) = n.first_word(GOVERNMENT) {
            return Some(CategoryResult::new(bills, 0.85, k, "Government payment"));
        }
        if let Some(k) = n.first_word(ULIP) {
            return Some(CategoryResult::new(
                Category::Investment,
                0.85,
                k,
                "Market-linked insurance premium",
            ));
        }
        if let Some(k) = n.first_word(INSURANCE) {
            return Some(CategoryResult::new(bills, 0.85, k, "Insurance premium"));
        }
        if let Some(k) = n.first_word(CREDIT_CARD) {
            return Some(CategoryResult::new(bills, 0.85, k, "Credit card bill"));
        }
        if let Some(k) = n.first_word(GATEWAY_LOAN) {
            return Some(CategoryResult::new(
                Category::Loan,
                0.85,
                k,
                "Loan instalment paid through a bill gateway",
            ));
        }
        if let Some(k) = n.first_word(HOUSING) {
            return Some(CategoryResult::new(bills, 0.85, k, "Housing or society charges"));
        }
        if let Some(k) = n.first_word(TAX) {
            return Some(CategoryResult::new(bills, 0.85, k, "Tax payment"));
        }
        let k = n
            .first_word(BILL_KEYWORDS)
            .or_else(|| n.first_substring(TRUE_BILL_GATEWAYS))
            .unwrap_or("BILL");
        Some(CategoryResult::new(bills, 0.75, k, "Generic bill payment"))
    }

    /// Layer 7
    fn lifestyle(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        if let Some(m) = self.youtube.find(&n.upper) {
            return Some(CategoryResult::new(
                Category::Entertainment,
                0.85,
                m.as_str(),
                "YouTube subscription",
            ));
        }
        if let Some(k) = n.first_word(ENTERTAINMENT) {
            return Some(CategoryResult::new(
                Category::Entertainment,
                0.8,
                k,
                "Streaming or entertainment",
            ));
        }
        if let Some(k) = n.first_word(DONATIONS) {
            return Some(CategoryResult::new(
                Category::Other,
                0.7,
                k,
                "Religious or charitable donation",
            ));
        }
        if let Some(k) = n.first_word(AUTO_SERVICES) {
            return Some(CategoryResult::new(
                Category::Shopping,
                0.7,
                k,
                "Vehicle parts or servicing",
            ));
        }
        if let Some(k) = n.first_word(HEALTH_SERVICES) {
            return Some(CategoryResult::new(
                Category::Healthcare,
                0.75,
                k,
                "Medical services",
            ));
        }
        if let Some(k) = n.first_word(EDUCATION) {
            return Some(CategoryResult::new(
                Category::Education,
                0.8,
                k,
                "Education fees",
            ));
        }
        None
    }

    /// Layer 8
    fn investment(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        if is_large_gas_payment(input) {
            let k = n.first_word(GAS).unwrap_or("GAS");
            return Some(large_gas_result(k));
        }
        if let Some(k) = n.first_word(BROKERS) {
            return Some(CategoryResult::new(
                Category::Investment,
                0.85,
                k,
                format!("Payment to broker {}", k),
            ));
        }
        if let Some(k) = n.first_word(INVESTMENT_TOKENS) {
            return Some(CategoryResult::new(
                Category::Investment,
                0.85,
                k,
                "Mutual fund or deposit scheme",
            ));
        }
        if let Some(k) = n.first_word(CRYPTO) {
            return Some(CategoryResult::new(
                Category::Investment,
                0.8,
                k,
                "Crypto exchange transfer",
            ));
        }
        if input.amount >= INVESTMENT_TRANSFER_MIN {
            if input.method == Method::Upi {
                if let Some(k) = n.first_word(INVESTMENT_UPI) {
                    return Some(CategoryResult::new(
                        Category::Investment,
                        0.8,
                        k,
                        "Large UPI payment to an investment platform",
                    ));
                }
            }
            if matches!(input.method, Method::Rtgs | Method::Neft) {
                let beneficiary = &input.extraction.beneficiary;
                let bank_entity = BANK_ENTITIES
                    .iter()
                    .copied()
                    .find(|w| super::normalize::contains_word(beneficiary, w));
                if beneficiary.is_empty() || bank_entity.is_some() {
                    return Some(CategoryResult::new(
                        Category::Investment,
                        0.75,
                        bank_entity.unwrap_or(input.method.as_str()),
                        "Large transfer to a bank or securities account",
                    ));
                }
            }
        }
        None
    }

    /// Layer 9
    fn charges(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        if input.amount > CHARGE_LIMIT {
            return None;
        }
        input.narration.first_word(CHARGES).map(|k| {
            CategoryResult::new(Category::BillsUtilities, 0.7, k, "Bank charge")
        })
    }

    /// Layer 10
    fn residual(&self, input: &CategoryInput<'_>) -> Option<CategoryResult> {
        let n = input.narration;
        if let Some(k) = n.first_word(STANDING_INSTRUCTION) {
            return Some(CategoryResult::new(
                Category::BillsUtilities,
                0.65,
                k,
                "Standing instruction subscription",
            ));
        }
        if input.method == Method::AtmWithdrawal {
            return Some(CategoryResult::new(
                Category::Shopping,
                0.6,
                "ATM",
                "Cash withdrawal treated as general spending",
            ));
        }
        if input.method == Method::Upi
            && input.amount > P2P_MIN
            && input.extraction.known.is_none()
            && looks_like_person(&input.extraction.merchant)
        {
            return Some(CategoryResult::new(
                Category::Other,
                0.5,
                "UPI",
                format!("Transfer to {}", input.extraction.merchant),
            ));
        }
        None
    }

    fn compose_confidence(&self, input: &CategoryInput<'_>, mut result: CategoryResult) -> CategoryResult {
        let n = input.narration;
        let mut confidence = result.confidence;

        if let Some(k) = n.first_word(intent_keywords(result.category)) {
            confidence += 0.2;
            if !result.matched_keywords.iter().any(|m| m == k) {
                result.matched_keywords.push(k.to_string());
            }
        }
        if n.gateway.is_some_and(|g| TRUE_BILL_GATEWAYS.contains(&g)) {
            confidence += 0.1;
        }
        if let Some(pattern) = AmountPattern::classify(input.amount) {
            if amount_pattern_fits(pattern, result.category) {
                confidence += 0.1;
            }
        }
        if let Some(known) = input.extraction.known {
            if known.category == result.category {
                confidence = confidence.max(known.confidence);
            }
        }
        result.confidence = confidence.clamp(0.0, 1.0);
        result
    }
}

fn has_loan_indicator(n: &Narration) -> bool {
    n.contains_word("EMI") || n.contains_word("LOAN")
}

fn is_large_gas_payment(input: &CategoryInput<'_>) -> bool {
    let gas_merchant = input
        .extraction
        .known
        .is_some_and(|k| k.canonical.ends_with("GAS"))
        || input.narration.first_word(GAS_COMPANIES).is_some();
    gas_merchant && input.amount > GAS_BILL_LIMIT
}

fn large_gas_result(keyword: &str) -> CategoryResult {
    CategoryResult::new(
        Category::Investment,
        0.8,
        keyword,
        "Payment to a gas utility above household range, likely share purchase",
    )
}

/// Two or three alphabetic words with no business markers
fn looks_like_person(name: &str) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    (2..=3).contains(&words.len())
        && words
            .iter()
            .all(|w| w.len() > 1 && w.chars().all(|c| c.is_ascii_alphabetic()))
        && !words.iter().any(|w| BUSINESS_WORDS.contains(w))
}

fn intent_keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Groceries => &["GROCERY", "GROCERIES", "VEGETABLES"],
        Category::Dining => &["DINNER", "LUNCH", "BREAKFAST", "MEAL"],
        Category::FoodDelivery => &["FOOD ORDER", "DELIVERY"],
        Category::Travel => &["TRIP", "TICKET", "FLIGHT", "CAB", "RIDE", "BOOKING"],
        Category::Fuel => &["FUEL", "PETROL", "DIESEL"],
        Category::Shopping => &["PURCHASE", "SHOPPING"],
        Category::BillsUtilities => &["BILL", "RECHARGE"],
        Category::Healthcare => &["MEDICINE", "MEDICINES", "CONSULTATION"],
        Category::Education => &["FEES", "TUITION"],
        Category::Entertainment => &["SUBSCRIPTION", "MOVIE", "TICKETS"],
        Category::Investment => &["INVESTMENT", "SIP"],
        Category::Loan => &["EMI", "LOAN"],
        _ => &[],
    }
}

fn amount_pattern_fits(pattern: AmountPattern, category: Category) -> bool {
    match pattern {
        AmountPattern::Charge => category == Category::BillsUtilities,
        AmountPattern::Food => matches!(
            category,
            Category::Dining | Category::FoodDelivery | Category::Groceries
        ),
        AmountPattern::Utility => category == Category::BillsUtilities,
        AmountPattern::Round => matches!(category, Category::Investment | Category::Loan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::merchant::MerchantExtractor;
    use crate::classify::method::MethodClassifier;

    fn categorize(narration: &str, amount: f64) -> CategoryResult {
        let n = Narration::parse(narration);
        let method = MethodClassifier::new().classify(&n).method;
        let extraction = MerchantExtractor::new().extract(&n, method);
        CategoryClassifier::new().classify(&CategoryInput {
            narration: &n,
            method,
            amount,
            extraction: &extraction,
        })
    }

    #[test]
    fn test_known_merchant_layer() {
        let r = categorize("UPI-BIGBASKET-bigbasket@icici-123-UPI", 1250.0);
        assert_eq!(r.category, Category::Groceries);
        assert!(r.confidence >= 0.92);
        assert!(r.matched_keywords.contains(&"BIGBASKET".to_string()));
    }

    #[test]
    fn test_loan_beats_known_merchant() {
        let r = categorize("ACH D- BAJAJ FIN EMI 12 LOAN", 4500.0);
        assert_eq!(r.category, Category::Loan);
        let r = categorize("NACH EMI HDFC BANK", 22000.0);
        assert_eq!(r.category, Category::Loan);
        assert!(r.confidence >= 0.95);
    }

    #[test]
    fn test_rent_needs_word_boundary() {
        assert_eq!(
            categorize("IMPS-11223344-LANDLORD-HOUSE RENT-MAY", 18000.0).category,
            Category::BillsUtilities
        );
        assert_ne!(
            categorize("TRF CURRENT ACCOUNT SWEEP", 18000.0).category,
            Category::BillsUtilities
        );
    }

    #[test]
    fn test_pos_restaurant_is_dining_not_delivery() {
        let r = categorize("POS 512345XXXXXX1234 ZOMATO RESTAURANT", 800.0);
        assert_eq!(r.category, Category::Dining);
    }

    #[test]
    fn test_food_delivery_gateway_combo() {
        let r = categorize("PAYUZOMATO ORDER 7712", 450.0);
        assert_eq!(r.category, Category::FoodDelivery);
    }

    #[test]
    fn test_fuel_before_travel() {
        let r = categorize("POS 4321XXXX9876 HPCL PETROL PUMP", 2000.0);
        assert_eq!(r.category, Category::Fuel);
    }

    #[test]
    fn test_generic_gateway_alone_is_not_a_bill() {
        let r = categorize("RAZP-ACME SOLUTIONS", 1500.0);
        assert_ne!(r.category, Category::BillsUtilities);
    }

    #[test]
    fn test_bill_gateway_with_utility() {
        let r = categorize("BILLDESK-TORRENT POWER-99812", 1800.0);
        assert_eq!(r.category, Category::BillsUtilities);
        assert!(r.reason.contains("Electricity"));
    }

    #[test]
    fn test_large_gas_payment_is_share_purchase() {
        let r = categorize("BILLDESK-INDRAPRASTHA GAS-77812", 60_000.0);
        assert_eq!(r.category, Category::Investment);
        assert!(r.reason.contains("share purchase"));

        let small = categorize("BILLDESK-INDRAPRASTHA GAS-77812", 1_200.0);
        assert_eq!(small.category, Category::BillsUtilities);
    }

    #[test]
    fn test_youtube_not_matched_inside_paytm() {
        let r = categorize("UPI-GOOGLE YOUTUBE-PAYMENTS@AXL-1", 129.0);
        assert_eq!(r.category, Category::Entertainment);
        let r = categorize("UPI-PAYTM-XYZ@PAYTM-1", 129.0);
        assert_ne!(r.category, Category::Entertainment);
    }

    #[test]
    fn test_ulip_routes_to_investment() {
        let r = categorize("BBPS-HDFC LIFE ULIP PREMIUM", 25000.0);
        assert_eq!(r.category, Category::Investment);
    }

    #[test]
    fn test_small_bank_charge() {
        let r = categorize("SMS CHARGES FOR QTR", 17.7);
        assert_eq!(r.category, Category::BillsUtilities);
    }

    #[test]
    fn test_upi_person_transfer() {
        let r = categorize("UPI-RAMESH GUPTA-ramesh@oksbi-998-PAY", 7000.0);
        assert_eq!(r.category, Category::Other);
        assert_eq!(r.confidence, 0.5);
    }

    #[test]
    fn test_default_confidence() {
        let r = categorize("XYZ 0001", 3333.0);
        assert_eq!(r.category, Category::Other);
        assert_eq!(r.confidence, 0.1);
        assert!(r.is_fallback());
        assert!(r.reason.starts_with("No matching"));
    }
}
