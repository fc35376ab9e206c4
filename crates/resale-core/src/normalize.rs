//! Record normalization
//!
//! Coerces loosely typed extraction output into canonical
//! [`TransactionRecord`] fields. Identifiers and phone numbers go through a
//! lossless integer-string path so they never pick up exponent notation or
//! float rounding.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{RawRecord, ReferenceDate, Scalar, TransactionRecord, ID_LEN, PHONE_LEN};
use crate::reconcile::dates::parse_show_date;

/// Canonical string form of a scalar.
///
/// - `Empty` becomes `""`
/// - a float is truncated to its integer digits (no `1.2e17`, no grouping)
/// - an integer is printed as-is
/// - text is trimmed
pub fn normalize_scalar(value: &Scalar) -> String {
    match value {
        Scalar::Empty => String::new(),
        Scalar::Float(f) if f.is_finite() => (f.trunc() as i128).to_string(),
        Scalar::Float(_) => String::new(),
        Scalar::Int(i) => i.to_string(),
        Scalar::Text(s) => s.trim().to_string(),
    }
}

/// Quantity is an integer >= 1; anything unusable becomes 1
pub fn normalize_quantity(value: &Scalar) -> u32 {
    match value.as_f64() {
        Some(q) if q >= 1.0 => q.trunc().min(f64::from(u32::MAX)) as u32,
        _ => 1,
    }
}

/// Prices are non-negative numbers; empty means "not stated"
pub fn normalize_price(value: &Scalar, field: &str) -> Result<Option<f64>> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.as_f64() {
        Some(p) if p < 0.0 => Err(Error::InvalidData(format!(
            "{} must not be negative: {}",
            field, p
        ))),
        Some(p) => Ok(Some(p)),
        None => {
            warn!(field, value = ?value, "Non-numeric price ignored");
            Ok(None)
        }
    }
}

/// Normalize a single extracted record.
///
/// The show date accepts the same tokens as the transcript reconciler; a bare
/// day is placed in a month using `today`.
pub fn normalize_record(raw: &RawRecord, today: ReferenceDate) -> Result<TransactionRecord> {
    let show_date_text = normalize_scalar(&raw.show_date);
    let show_date = parse_show_date(&show_date_text, today)?.ok_or_else(|| {
        Error::ShapeMismatch(format!("Unrecognized show date: '{}'", show_date_text))
    })?;

    let record = TransactionRecord {
        merchant: normalize_scalar(&raw.merchant),
        show_date,
        face_price: normalize_price(&raw.face_price, "face_price")?,
        buyer_name: normalize_scalar(&raw.buyer_name),
        buyer_id: normalize_scalar(&raw.buyer_id),
        buyer_phone: normalize_scalar(&raw.buyer_phone),
        quantity: normalize_quantity(&raw.quantity),
        sell_price: normalize_price(&raw.sell_price, "sell_price")?,
    };

    if !record.buyer_id.is_empty() && record.buyer_id.chars().count() != ID_LEN {
        warn!(buyer_id = %record.buyer_id, "Identifier has non-canonical length");
    }
    if !record.buyer_phone.is_empty() && record.buyer_phone.chars().count() != PHONE_LEN {
        warn!(buyer_phone = %record.buyer_phone, "Phone has non-canonical length");
    }

    Ok(record)
}

/// Validation pass over extraction output.
///
/// Fails the whole batch rather than writing a partial result: an empty
/// array is an extraction error and a record with no buyer identity is a
/// shape mismatch.
pub fn validate_extraction(
    raw: &[RawRecord],
    today: ReferenceDate,
) -> Result<Vec<TransactionRecord>> {
    if raw.is_empty() {
        return Err(Error::Extraction("Extraction returned no records".into()));
    }

    let mut records = Vec::with_capacity(raw.len());
    for (index, item) in raw.iter().enumerate() {
        let record = normalize_record(item, today).map_err(|e| match e {
            Error::ShapeMismatch(msg) => Error::ShapeMismatch(format!("record {}: {}", index + 1, msg)),
            Error::InvalidData(msg) => Error::InvalidData(format!("record {}: {}", index + 1, msg)),
            other => other,
        })?;

        if !record.has_identity() {
            return Err(Error::ShapeMismatch(format!(
                "record {} ({} {}) has no buyer name, identifier or phone",
                index + 1,
                record.merchant,
                record.show_date
            )));
        }
        if record.sell_price.is_none() {
            warn!(
                record = index + 1,
                buyer = %record.buyer_name,
                "Record has no sell price"
            );
        }
        records.push(record);
    }

    debug!("Validated {} extracted records", records.len());
    Ok(records)
}
