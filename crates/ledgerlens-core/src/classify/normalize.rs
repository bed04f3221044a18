//! Narration canonicalization and tokenization

/// Payment gateway tokens, in lookup order
const GATEWAYS: &[&str] = &[
    "BILLDESK", "BILLDK", "BBPS", "PAYU", "RAZP", "RAZORPAY", "CCAVENUE", "PAYGOV", "SBIPG",
    "AXISPG", "ICICIPG", "KOTAKPG", "YESPG", "WHDF",
];

/// A narration after canonicalization
#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    /// Uppercased, trimmed, whitespace collapsed
    pub upper: String,
    /// Pieces split on `-`, `/`, `_`, `@` and spaces
    pub tokens: Vec<String>,
    /// First gateway token found, if any
    pub gateway: Option<&'static str>,
}

impl Narration {
    pub fn parse(raw: &str) -> Self {
        let upper = normalize(raw);
        let tokens = tokenize(&upper);
        let gateway = extract_gateway(&upper);
        Self {
            upper,
            tokens,
            gateway,
        }
    }

    /// Exact token match
    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// First of `tokens` present as a whole token
    pub fn first_token<'a>(&self, tokens: &[&'a str]) -> Option<&'a str> {
        tokens.iter().copied().find(|t| self.has_token(t))
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.upper.contains(needle)
    }

    /// First of `needles` found as a substring
    pub fn first_substring<'a>(&self, needles: &[&'a str]) -> Option<&'a str> {
        needles.iter().copied().find(|n| self.upper.contains(n))
    }

    /// Every needle found as a substring, in table order
    pub fn all_substrings<'a>(&self, needles: &[&'a str]) -> Vec<&'a str> {
        needles
            .iter()
            .copied()
            .filter(|n| self.upper.contains(n))
            .collect()
    }

    /// Whole-word match that tolerates the separators used by banks.
    ///
    /// `phrase` may contain spaces; word edges are any non-alphanumeric character.
    pub fn contains_word(&self, phrase: &str) -> bool {
        contains_word(&self.upper, phrase)
    }

    pub fn first_word<'a>(&self, phrases: &[&'a str]) -> Option<&'a str> {
        phrases.iter().copied().find(|p| self.contains_word(p))
    }
}

/// Trim, uppercase and collapse whitespace runs to a single space
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Split on `- / _ @` and spaces, dropping empty pieces
pub fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split(|c: char| matches!(c, '-' | '/' | '_' | '@' | ' '))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// First gateway from the fixed table present in the narration
pub fn extract_gateway(normalized: &str) -> Option<&'static str> {
    GATEWAYS.iter().copied().find(|g| normalized.contains(g))
}

/// Whole-word search where word edges are non-alphanumeric characters
pub fn contains_word(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(phrase) {
        let begin = start + pos;
        let end = begin + phrase.len();
        let left_ok = begin == 0 || !bytes[begin - 1].is_ascii_alphanumeric();
        let right_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if left_ok && right_ok {
            return true;
        }
        start = begin + 1;
        while start < haystack.len() && !haystack.is_char_boundary(start) {
            start += 1;
        }
        if start >= haystack.len() {
            break;
        }
    }
    false
}

/// Coarse amount shape used as supporting evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountPattern {
    /// 10..=50, bank charges
    Charge,
    /// 200..=600, a meal
    Food,
    /// 800..=2500, a household bill
    Utility,
    /// Whole thousands from 1000 up
    Round,
}

impl AmountPattern {
    pub fn classify(amount: f64) -> Option<Self> {
        if (10.0..=50.0).contains(&amount) {
            Some(Self::Charge)
        } else if (200.0..=600.0).contains(&amount) {
            Some(Self::Food)
        } else if (800.0..=2500.0).contains(&amount) {
            Some(Self::Utility)
        } else if amount >= 1000.0 && amount % 1000.0 == 0.0 {
            Some(Self::Round)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Charge => "CHARGE",
            Self::Food => "FOOD",
            Self::Utility => "UTILITY",
            Self::Round => "ROUND",
        }
    }
}
