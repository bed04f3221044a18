//! Lenient date parsing for statement rows
//!
//! Statements from different banks disagree on date layout. Formats are tried
//! in a fixed order so that the same string always resolves the same way.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Date layouts, tried in order
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y"];

/// Two-digit year layouts, used only when the last segment has two digits
const SHORT_YEAR_FORMATS: &[&str] = &["%d/%m/%y", "%d-%m-%y"];

/// Date-time layouts, tried before the plain date layouts
const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

/// Parse a statement date, trying `DD/MM/YYYY`, `YYYY-MM-DD`, `DD-MM-YYYY`,
/// `MM/DD/YYYY`, and `DD/MM/YY` or `DD-MM-YY`
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(dt) = parse_datetime(s) {
        return Some(dt.date());
    }
    if has_short_year(s) {
        return SHORT_YEAR_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok());
    }
    // `%Y` also accepts one to three digit years
    DATE_FORMATS
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(s, fmt)
                .ok()
                .filter(|d| d.year() >= 1000)
        })
}

/// `DD/MM/YY` shape: day first and a two-digit year last
fn has_short_year(s: &str) -> bool {
    let parts: Vec<&str> = s.split(|c| c == '/' || c == '-').collect();
    let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    parts.len() == 3
        && parts.iter().all(|p| digits(p))
        && parts[0].len() <= 2
        && parts[2].len() == 2
}

/// Parse a timestamp; plain dates resolve to midnight
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Some(dt) = parse_datetime(s) {
        return Some(dt);
    }
    parse_date(s).map(|d| d.and_time(NaiveTime::MIN))
}

/// Parse a timestamp, substituting the current time when the string is unusable.
///
/// The boolean is `false` when the fallback was taken so callers can flag it.
pub fn timestamp_or_now(s: &str) -> (NaiveDateTime, bool) {
    match parse_timestamp(s) {
        Some(ts) => (ts, true),
        None => (Utc::now().naive_utc(), false),
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("15/03/2024"), Some(expected));
        assert_eq!(parse_date("2024-03-15"), Some(expected));
        assert_eq!(parse_date("15-03-2024"), Some(expected));
        // Only reachable when DD/MM fails (month > 12)
        assert_eq!(parse_date("03/15/2024"), Some(expected));
    }

    #[test]
    fn test_two_digit_year() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 15);
        assert_eq!(parse_date("15/05/24"), expected);
        assert_eq!(parse_date("15-05-24"), expected);
        assert_eq!(parse_date("31/02/24"), None);
        // ISO dates end in two digits too
        assert_eq!(parse_date("2024-05-15"), expected);
    }

    #[test]
    fn test_short_four_digit_year_is_rejected() {
        assert_eq!(parse_date("15/05/024"), None);
        let (_, parsed) = timestamp_or_now("15/05/024");
        assert!(!parsed);
    }

    #[test]
    fn test_day_month_preferred_over_month_day() {
        // Ambiguous: 04/05 is read as 4 May, not 5 April
        assert_eq!(
            parse_date("04/05/2024"),
            NaiveDate::from_ymd_opt(2024, 5, 4)
        );
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("32/13/2024"), None);
    }

    #[test]
    fn test_parse_timestamp_keeps_time() {
        let ts = parse_timestamp("15/03/2024 14:05:00").unwrap();
        assert_eq!(ts.hour(), 14);
        assert_eq!(ts.minute(), 5);

        let midnight = parse_timestamp("15/03/2024").unwrap();
        assert_eq!(midnight.hour(), 0);
    }

    #[test]
    fn test_timestamp_or_now_flags_fallback() {
        let (_, parsed) = timestamp_or_now("not a date");
        assert!(!parsed);
        let (_, parsed) = timestamp_or_now("01/01/2024");
        assert!(parsed);
    }
}
