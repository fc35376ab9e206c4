//! Line classification for raw chat transcripts

use std::sync::OnceLock;

use regex::Regex;

use super::dates::{split_leading_date, DateToken};
use super::pricing::{looks_like_pricing, parse_pricing, PricingExpr};
use crate::error::Result;
use crate::models::{ID_LEN, PHONE_LEN};

/// Buyer fields found on one line; any subset may be present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuyerFragment {
    pub name: Option<String>,
    pub id: Option<String>,
    pub phone: Option<String>,
}

impl BuyerFragment {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.id.is_none() && self.phone.is_none()
    }
}

/// One classified transcript line
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Free text with no numbers: a merchant name, or a bare buyer name
    /// depending on context
    Text(String),
    Order {
        date: DateToken,
        description: String,
        face_price: f64,
    },
    Buyer(BuyerFragment),
    Pricing(PricingExpr),
}

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+[Xx]?").expect("valid regex"))
}

fn trailing_price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<desc>.*?)\s*(?P<price>\d+(?:\.\d+)?)\s*(?:元|块)?$").expect("valid regex")
    })
}

fn personal_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{Han}·]{2,4}$").expect("valid regex"))
}

/// Whether free text is shaped like a personal name (2-4 Han characters)
pub fn looks_like_name(text: &str) -> bool {
    personal_name_re().is_match(text.trim())
}

const NAME_SEPARATORS: &[char] = &[',', '，', ':', '：', '/', '、', ';', '；', '|'];

/// Pull identifier/phone numbers out of a line; `None` if it carries neither
fn parse_buyer(line: &str) -> Option<BuyerFragment> {
    let mut fragment = BuyerFragment::default();
    let mut remainder = line.to_string();

    for m in digit_run_re().find_iter(line) {
        let run = m.as_str();
        let is_id = run.len() == ID_LEN;
        let is_phone = run.len() == PHONE_LEN
            && run.starts_with('1')
            && run.chars().all(|c| c.is_ascii_digit());
        if is_id && fragment.id.is_none() {
            fragment.id = Some(run.to_uppercase());
        } else if is_phone && fragment.phone.is_none() {
            fragment.phone = Some(run.to_string());
        } else {
            continue;
        }
        remainder = remainder.replacen(run, " ", 1);
    }

    if fragment.id.is_none() && fragment.phone.is_none() {
        return None;
    }

    let name = remainder
        .split(|c: char| c.is_whitespace() || NAME_SEPARATORS.contains(&c))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !name.is_empty() {
        fragment.name = Some(name);
    }
    Some(fragment)
}

fn parse_order(line: &str) -> Option<Entry> {
    let (date, rest) = split_leading_date(line)?;
    let caps = trailing_price_re().captures(rest.trim())?;
    let face_price = caps.name("price")?.as_str().parse::<f64>().ok()?;
    let description = caps
        .name("desc")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(Entry::Order {
        date,
        description,
        face_price,
    })
}

/// Classify one transcript line. Blank lines yield `None`.
///
/// Buyer detection runs before pricing so that a phone number alone on a
/// line is not mistaken for a price.
pub fn classify_line(line: &str) -> Result<Option<Entry>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if let Some(fragment) = parse_buyer(line) {
        return Ok(Some(Entry::Buyer(fragment)));
    }
    if looks_like_pricing(line) {
        return parse_pricing(line).map(|expr| Some(Entry::Pricing(expr)));
    }
    if let Some(order) = parse_order(line) {
        return Ok(Some(order));
    }
    Ok(Some(Entry::Text(line.to_string())))
}

/// Classify every line of a transcript, in order
pub fn classify(text: &str) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for line in text.lines() {
        if let Some(entry) = classify_line(line)? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buyer_with_name_id_phone() {
        let entry = classify_line("张三 420101199001011234 13800000000").unwrap().unwrap();
        assert_eq!(
            entry,
            Entry::Buyer(BuyerFragment {
                name: Some("张三".into()),
                id: Some("420101199001011234".into()),
                phone: Some("13800000000".into()),
            })
        );
    }

    #[test]
    fn test_phone_only_line_is_buyer_not_price() {
        let entry = classify_line("17324862256").unwrap().unwrap();
        assert_eq!(
            entry,
            Entry::Buyer(BuyerFragment {
                phone: Some("17324862256".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_id_with_x_checksum() {
        let entry = classify_line("李四，42010119900101123x").unwrap().unwrap();
        match entry {
            Entry::Buyer(b) => {
                assert_eq!(b.id.as_deref(), Some("42010119900101123X"));
                assert_eq!(b.name.as_deref(), Some("李四"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_order_lines() {
        let entry = classify_line("18号武汉梓渝 1280").unwrap().unwrap();
        assert_eq!(
            entry,
            Entry::Order {
                date: DateToken::BareDay(18),
                description: "武汉梓渝".into(),
                face_price: 1280.0,
            }
        );
        let entry = classify_line("1.16 武汉梓渝 1280").unwrap().unwrap();
        assert!(matches!(
            entry,
            Entry::Order {
                date: DateToken::Explicit { month: 1, day: 16 },
                ..
            }
        ));
    }

    #[test]
    fn test_explicit_date_order_without_description() {
        for (line, month, day) in [("1.16 1280", 1, 16), ("1/16 1280", 1, 16), ("2-3 980", 2, 3)] {
            let entry = classify_line(line).unwrap().unwrap();
            match entry {
                Entry::Order {
                    date,
                    description,
                    face_price,
                } => {
                    assert_eq!(date, DateToken::Explicit { month, day }, "{}", line);
                    assert!(description.is_empty());
                    assert!(face_price == 1280.0 || face_price == 980.0);
                }
                other => panic!("{} classified as {:?}", line, other),
            }
        }
    }

    #[test]
    fn test_pricing_and_text() {
        assert!(matches!(
            classify_line("1500*2=3000").unwrap(),
            Some(Entry::Pricing(PricingExpr::Each { count: 2, .. }))
        ));
        assert_eq!(
            classify_line("海洋微信不收款转支付宝 ").unwrap(),
            Some(Entry::Text("海洋微信不收款转支付宝".into()))
        );
        assert_eq!(classify_line("   ").unwrap(), None);
    }

    #[test]
    fn test_malformed_pricing_is_an_error() {
        assert!(classify_line("1500-200").is_err());
    }

    #[test]
    fn test_looks_like_name() {
        assert!(looks_like_name("张三"));
        assert!(looks_like_name("欧阳娜娜"));
        assert!(!looks_like_name("海洋微信不收款转支付宝"));
        assert!(!looks_like_name("Tom"));
    }
}
