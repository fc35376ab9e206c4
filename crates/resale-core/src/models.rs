//! Domain models for resale

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Sheet that holds the ledger inside the store workbook
pub const SHEET_NAME: &str = "信息";

/// Canonical column names, in store order
pub mod columns {
    pub const MERCHANT: &str = "说明";
    pub const SHOW_DATE: &str = "演出时间";
    pub const FACE_PRICE: &str = "购买票价";
    pub const BUYER_NAME: &str = "观演者姓名";
    pub const BUYER_ID: &str = "观演者身份证号码";
    pub const BUYER_PHONE: &str = "观演者手机号码";
    pub const QUANTITY: &str = "购买数量";
    pub const SELL_PRICE: &str = "卖价";
}

/// Header row of the store, in fixed order
pub const COLUMNS: [&str; 8] = [
    columns::MERCHANT,
    columns::SHOW_DATE,
    columns::FACE_PRICE,
    columns::BUYER_NAME,
    columns::BUYER_ID,
    columns::BUYER_PHONE,
    columns::QUANTITY,
    columns::SELL_PRICE,
];

/// 1-based positions of the columns that must always be text
pub const ID_COLUMN: u32 = 5;
pub const PHONE_COLUMN: u32 = 6;

/// Canonical identifier lengths (checked, never enforced)
pub const ID_LEN: usize = 18;
pub const PHONE_LEN: usize = 11;

/// A loosely typed value as it arrives from the extraction output or a
/// spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn text(s: impl Into<String>) -> Self {
        Scalar::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Scalar::Empty => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the value; numeric text is accepted
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) if f.is_finite() => Some(*f),
            Scalar::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Scalar::Empty,
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Scalar::Int(i)
                } else if let Some(u) = n.as_u64() {
                    // Beyond i64 only through u64; keep the digits exact
                    Scalar::Text(u.to_string())
                } else {
                    n.as_f64().map(Scalar::Float).unwrap_or_default()
                }
            }
            Value::String(s) => Scalar::Text(s),
            Value::Bool(b) => Scalar::Text(b.to_string()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl From<&calamine::Data> for Scalar {
    fn from(cell: &calamine::Data) -> Self {
        match cell {
            calamine::Data::Empty => Scalar::Empty,
            calamine::Data::Int(i) => Scalar::Int(*i),
            calamine::Data::Float(f) => Scalar::Float(*f),
            calamine::Data::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Scalar::from)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Empty => serializer.serialize_none(),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// One element of the JSON array returned by an extraction backend.
///
/// Every field is a [`Scalar`] so that numbers-as-strings, strings-as-numbers
/// and nulls all survive deserialization and get normalized afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    #[serde(rename = "说明")]
    pub merchant: Scalar,
    #[serde(rename = "演出时间")]
    pub show_date: Scalar,
    #[serde(rename = "购买票价")]
    pub face_price: Scalar,
    #[serde(rename = "观演者姓名")]
    pub buyer_name: Scalar,
    #[serde(rename = "观演者身份证号码")]
    pub buyer_id: Scalar,
    #[serde(rename = "观演者手机号码")]
    pub buyer_phone: Scalar,
    #[serde(rename = "购买数量")]
    pub quantity: Scalar,
    #[serde(rename = "卖价")]
    pub sell_price: Scalar,
}

impl From<&TransactionRecord> for RawRecord {
    fn from(record: &TransactionRecord) -> Self {
        let price = |p: Option<f64>| p.map(Scalar::Float).unwrap_or_default();
        RawRecord {
            merchant: Scalar::text(&record.merchant),
            show_date: Scalar::Text(record.show_date.to_string()),
            face_price: price(record.face_price),
            buyer_name: Scalar::text(&record.buyer_name),
            buyer_id: Scalar::text(&record.buyer_id),
            buyer_phone: Scalar::text(&record.buyer_phone),
            quantity: Scalar::Int(i64::from(record.quantity)),
            sell_price: price(record.sell_price),
        }
    }
}

/// A show date that always carries both month and day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShowDate {
    month: u8,
    day: u8,
}

impl ShowDate {
    pub fn new(month: u32, day: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(Error::InvalidData(format!(
                "Show date out of range: month {} day {}",
                month, day
            )));
        }
        Ok(Self {
            month: month as u8,
            day: day as u8,
        })
    }

    pub fn month(&self) -> u32 {
        u32::from(self.month)
    }

    pub fn day(&self) -> u32 {
        u32::from(self.day)
    }
}

impl fmt::Display for ShowDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}月{}日", self.month, self.day)
    }
}

impl Serialize for ShowDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// "Today" for month inference. Injected by the caller so results are
/// reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceDate {
    pub month: u32,
    pub day: u32,
}

impl ReferenceDate {
    pub fn new(month: u32, day: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(Error::InvalidData(format!(
                "Reference date out of range: {}-{}",
                month, day
            )));
        }
        Ok(Self { month, day })
    }
}

impl fmt::Display for ReferenceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}月{}日", self.month, self.day)
    }
}

impl std::str::FromStr for ReferenceDate {
    type Err = Error;

    /// Accepts `M-D`, `M.D`, `M/D` or `M月D日`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().trim_end_matches('日');
        let parts: Vec<&str> = s.split(['-', '.', '/', '月']).collect();
        match parts.as_slice() {
            [m, d] => {
                let month = m
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidData(format!("Invalid month in '{}'", s)))?;
                let day = d
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidData(format!("Invalid day in '{}'", s)))?;
                Self::new(month, day)
            }
            _ => Err(Error::InvalidData(format!(
                "Reference date must look like M-D: '{}'",
                s
            ))),
        }
    }
}

/// One ticket purchase line item, fully normalized
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    #[serde(rename = "说明")]
    pub merchant: String,
    #[serde(rename = "演出时间")]
    pub show_date: ShowDate,
    #[serde(rename = "购买票价")]
    pub face_price: Option<f64>,
    #[serde(rename = "观演者姓名")]
    pub buyer_name: String,
    /// Always text; never routed through a float
    #[serde(rename = "观演者身份证号码")]
    pub buyer_id: String,
    /// Always text; never routed through a float
    #[serde(rename = "观演者手机号码")]
    pub buyer_phone: String,
    #[serde(rename = "购买数量")]
    pub quantity: u32,
    /// Per-unit price actually transacted; unset until back-filled
    #[serde(rename = "卖价")]
    pub sell_price: Option<f64>,
}

impl TransactionRecord {
    /// Identity of the record for duplicate detection
    pub fn dedup_key(&self) -> &str {
        self.buyer_id.trim()
    }

    pub fn has_identity(&self) -> bool {
        !(self.buyer_name.trim().is_empty()
            && self.buyer_id.trim().is_empty()
            && self.buyer_phone.trim().is_empty())
    }
}
