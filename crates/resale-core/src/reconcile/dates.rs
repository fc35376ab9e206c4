//! Show date tokens and month inference
//!
//! Accepted forms:
//! - explicit: `1.16`, `1/16`, `1-16`, `1月16日`, `1月16号`, `1月16`
//! - bare day: `18号`, `18日` (and a plain `18` when the whole value is a date)
//!
//! A bare day `D` is placed relative to the reference date `(rm, rd)`:
//! `D <= rd` stays in `rm`, `D > rd` moves to `rm + 1`.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{ReferenceDate, ShowDate};

/// A date as written in a transcript, before month inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateToken {
    Explicit { month: u32, day: u32 },
    BareDay(u32),
}

impl DateToken {
    /// Resolve to a full show date, inferring the month for a bare day
    pub fn resolve(self, today: ReferenceDate) -> Result<ShowDate> {
        match self {
            DateToken::Explicit { month, day } => ShowDate::new(month, day),
            DateToken::BareDay(day) => infer_month(day, today),
        }
    }
}

/// Place a bare day-of-month in a month relative to `today`
pub fn infer_month(day: u32, today: ReferenceDate) -> Result<ShowDate> {
    let month = if day <= today.day {
        today.month
    } else {
        today.month + 1
    };
    if month > 12 {
        return Err(Error::InvalidData(format!(
            "Day {} after {} crosses the year boundary",
            day, today
        )));
    }
    ShowDate::new(month, day)
}

fn whole_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<m1>\d{1,2})\s*月\s*(?P<d1>\d{1,2})\s*[日号]?|(?P<m2>\d{1,2})\s*[./\-．]\s*(?P<d2>\d{1,2})|(?P<d3>\d{1,2})\s*[号日]?)$",
        )
        .expect("valid regex")
    })
}

fn leading_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<m1>\d{1,2})\s*月\s*(?P<d1>\d{1,2})\s*[日号]?|(?P<m2>\d{1,2})\s*[./\-．]\s*(?P<d2>\d{1,2})|(?P<d3>\d{1,2})\s*[号日])(?P<rest>.*)$",
        )
        .expect("valid regex")
    })
}

fn token_from_captures(caps: &regex::Captures<'_>) -> Option<DateToken> {
    let num = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());

    if let (Some(month), Some(day)) = (num("m1"), num("d1")) {
        return Some(DateToken::Explicit { month, day });
    }
    if let (Some(month), Some(day)) = (num("m2"), num("d2")) {
        return Some(DateToken::Explicit { month, day });
    }
    num("d3").map(DateToken::BareDay)
}

/// Parse a value that is entirely a date token
pub fn parse_date_token(text: &str) -> Option<DateToken> {
    let caps = whole_token_re().captures(text.trim())?;
    token_from_captures(&caps)
}

/// Split a leading date token off an order line, returning the remainder
pub fn split_leading_date(line: &str) -> Option<(DateToken, &str)> {
    let line = line.trim_start();
    let caps = leading_token_re().captures(line)?;
    let token = token_from_captures(&caps)?;
    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
    Some((token, rest))
}

/// Canonicalize a show date string.
///
/// Returns `Ok(None)` when the text is not a date at all, and an error when
/// it is a date that cannot exist.
pub fn parse_show_date(text: &str, today: ReferenceDate) -> Result<Option<ShowDate>> {
    match parse_date_token(text) {
        Some(token) => token.resolve(today).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan19() -> ReferenceDate {
        ReferenceDate::new(1, 19).unwrap()
    }

    fn resolve(text: &str) -> String {
        parse_show_date(text, jan19()).unwrap().unwrap().to_string()
    }

    #[test]
    fn test_bare_day_on_or_before_reference_stays_in_month() {
        assert_eq!(resolve("18号"), "1月18日");
        assert_eq!(resolve("19号"), "1月19日");
        assert_eq!(resolve("2号"), "1月2日");
    }

    #[test]
    fn test_bare_day_after_reference_moves_to_next_month() {
        assert_eq!(resolve("20号"), "2月20日");
        assert_eq!(resolve("25号"), "2月25日");
        assert_eq!(resolve("25日"), "2月25日");
        assert_eq!(resolve("25"), "2月25日");
    }

    #[test]
    fn test_explicit_dates_override_inference() {
        assert_eq!(resolve("1.16"), "1月16日");
        assert_eq!(resolve("1.25"), "1月25日");
        assert_eq!(resolve("3/2"), "3月2日");
        assert_eq!(resolve("1月16日"), "1月16日");
        assert_eq!(resolve("2月 3号"), "2月3日");
        assert_eq!(resolve("12-31"), "12月31日");
    }

    #[test]
    fn test_year_boundary_is_rejected() {
        let dec = ReferenceDate::new(12, 10).unwrap();
        assert!(infer_month(5, dec).is_ok());
        assert!(infer_month(11, dec).is_err());
    }

    #[test]
    fn test_not_a_date() {
        assert_eq!(parse_show_date("next week", jan19()).unwrap(), None);
        assert_eq!(parse_show_date("", jan19()).unwrap(), None);
    }

    #[test]
    fn test_impossible_date_is_an_error() {
        assert!(parse_show_date("13.1", jan19()).is_err());
        assert!(parse_show_date("0号", jan19()).is_err());
    }

    #[test]
    fn test_split_leading_date() {
        let (token, rest) = split_leading_date("18号武汉梓渝 1280").unwrap();
        assert_eq!(token, DateToken::BareDay(18));
        assert_eq!(rest, "武汉梓渝 1280");

        let (token, rest) = split_leading_date("1.16 武汉梓渝 1280").unwrap();
        assert_eq!(token, DateToken::Explicit { month: 1, day: 16 });
        assert_eq!(rest.trim(), "武汉梓渝 1280");

        assert!(split_leading_date("17324862256").is_none());
        assert!(split_leading_date("武汉 18号").is_none());
    }
}
