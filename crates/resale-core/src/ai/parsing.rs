//! Parsing of extraction responses
//!
//! Models are asked for a bare JSON array but routinely wrap it in a code
//! fence, or (under `response_format: json_object`) in an object such as
//! `{"records": [...]}`. Both are tolerated here.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::RawRecord;

fn truncate(s: &str) -> String {
    match s.char_indices().nth(200) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

/// Remove a surrounding ```json / ``` fence
pub fn strip_code_fence(response: &str) -> &str {
    let mut s = response.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse a model response into raw records
pub fn parse_extraction(response: &str) -> Result<Vec<RawRecord>> {
    let body = strip_code_fence(response);
    if body.is_empty() {
        return Err(Error::Extraction("Empty response from model".into()));
    }

    let value: Value = serde_json::from_str(body).map_err(|e| {
        Error::Extraction(format!("Invalid JSON from model: {} | Raw: {}", e, truncate(body)))
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let (key, items) = map
                .into_iter()
                .find_map(|(k, v)| match v {
                    Value::Array(items) => Some((k, items)),
                    _ => None,
                })
                .ok_or_else(|| {
                    Error::Extraction(format!(
                        "Model returned an object without a record array | Raw: {}",
                        truncate(body)
                    ))
                })?;
            debug!(key = %key, "Unwrapped record array from object");
            items
        }
        other => {
            return Err(Error::Extraction(format!(
                "Expected a JSON array of records, got: {}",
                truncate(&other.to_string())
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(Error::Extraction(format!(
                    "Record {} is not an object: {}",
                    i + 1,
                    truncate(&item.to_string())
                )));
            }
            serde_json::from_value::<RawRecord>(item)
                .map_err(|e| Error::Extraction(format!("Record {}: {}", i + 1, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scalar;

    const ONE: &str = r#"[{"说明": "海洋", "演出时间": "1月16日", "购买票价": 1280, "观演者姓名": "张三", "观演者身份证号码": "420101199001011234", "观演者手机号码": 13800000000, "购买数量": 1, "卖价": 1500}]"#;

    #[test]
    fn test_bare_array() {
        let records = parse_extraction(ONE).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].merchant, Scalar::text("海洋"));
        assert_eq!(records[0].buyer_phone, Scalar::Int(13800000000));
    }

    #[test]
    fn test_code_fences() {
        let fenced = format!("```json\n{}\n```", ONE);
        assert_eq!(parse_extraction(&fenced).unwrap().len(), 1);
        let plain = format!("```\n{}\n```", ONE);
        assert_eq!(parse_extraction(&plain).unwrap().len(), 1);
    }

    #[test]
    fn test_wrapped_in_object() {
        let wrapped = format!(r#"{{"count": 1, "records": {}}}"#, ONE);
        let records = parse_extraction(&wrapped).unwrap();
        assert_eq!(records[0].buyer_name, Scalar::text("张三"));
    }

    #[test]
    fn test_missing_keys_default_to_empty() {
        let records = parse_extraction(r#"[{"观演者姓名": "李四"}]"#).unwrap();
        assert!(records[0].sell_price.is_empty());
        assert!(records[0].quantity.is_empty());
    }

    #[test]
    fn test_rejects_non_records() {
        for bad in ["", "sorry, I cannot help", r#"{"error": "rate limited"}"#, "42", "[1, 2]"] {
            let err = parse_extraction(bad).unwrap_err();
            assert!(matches!(err, Error::Extraction(_)), "{}", bad);
        }
    }
}
