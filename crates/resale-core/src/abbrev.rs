//! Merchant abbreviation substitution
//!
//! Configured as a flat list `original1,short1,original2,short2`. Both the
//! ASCII and the full-width comma separate entries.

use std::collections::HashMap;

use tracing::debug;

use crate::models::TransactionRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbbreviationMap {
    map: HashMap<String, String>,
}

impl AbbreviationMap {
    /// Parse the flat list form. A trailing entry without a partner is
    /// ignored, as are pairs whose original is blank.
    pub fn parse(input: &str) -> Self {
        let parts: Vec<&str> = input.split([',', '，']).map(str::trim).collect();
        let map = parts
            .chunks_exact(2)
            .filter(|pair| !pair[0].is_empty())
            .map(|pair| (pair[0].to_string(), pair[1].to_string()))
            .collect();
        Self { map }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Short form for `merchant`, if one is configured. Matching is exact
    /// after trimming.
    pub fn lookup(&self, merchant: &str) -> Option<&str> {
        self.map.get(merchant.trim()).map(String::as_str)
    }

    /// Replace each record's merchant with its short form, trimming it either way
    pub fn apply(&self, records: &mut [TransactionRecord]) {
        for record in records {
            let trimmed = record.merchant.trim();
            let replacement = match self.lookup(trimmed) {
                Some(short) => short.to_string(),
                None => trimmed.to_string(),
            };
            if replacement != record.merchant {
                debug!(from = %record.merchant, to = %replacement, "Abbreviated merchant");
                record.merchant = replacement;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ShowDate;

    fn record(merchant: &str) -> TransactionRecord {
        TransactionRecord {
            merchant: merchant.into(),
            show_date: ShowDate::new(1, 16).unwrap(),
            face_price: None,
            buyer_name: "张三".into(),
            buyer_id: "420101199001011234".into(),
            buyer_phone: String::new(),
            quantity: 1,
            sell_price: None,
        }
    }

    #[test]
    fn test_parse_mixed_separators() {
        let map = AbbreviationMap::parse("海洋微信不收款转支付宝, 海洋，小鱼票务,小鱼");
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup("海洋微信不收款转支付宝"), Some("海洋"));
        assert_eq!(map.lookup(" 小鱼票务 "), Some("小鱼"));
    }

    #[test]
    fn test_trailing_odd_entry_ignored() {
        let map = AbbreviationMap::parse("a,b,c");
        assert_eq!(map.len(), 1);
        assert_eq!(map.lookup("c"), None);
        assert!(AbbreviationMap::parse("").is_empty());
    }

    #[test]
    fn test_apply_is_exact_match() {
        let map = AbbreviationMap::parse("海洋微信不收款转支付宝,海洋");
        let mut records = vec![
            record("海洋微信不收款转支付宝 "),
            record("海洋微信"),
        ];
        map.apply(&mut records);
        assert_eq!(records[0].merchant, "海洋");
        assert_eq!(records[1].merchant, "海洋微信");
    }
}
