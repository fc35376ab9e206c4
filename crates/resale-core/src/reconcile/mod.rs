//! Price/date reconciliation
//!
//! Turns an ordered stream of transcript entries into transaction records.
//! Prices and dates are often stated after the orders they belong to, so the
//! engine keeps a list of pending (unpriced) records and back-fills them when
//! a pricing token arrives:
//!
//! - a bare number prices every pending record
//! - `A*N` prices the N most recent pending records at A each
//! - `A+B+...` prices pending records in accumulation order, one summand each
//!
//! Each buyer under an order is one record and one pricing unit.
//!
//! Buyer attachment within a merchant segment:
//! - buyer lines before the segment's first order are held for the next order
//! - a fragment that only fills fields the current buyer lacks is merged into
//!   that buyer; otherwise it opens a new buyer
//! - when an order closes, its buyers without a phone take the first phone
//!   given for that order
//!
//! A text-only line is a merchant name unless an order is open, the text is
//! not a merchant seen before, and it is shaped like a personal name. Such a
//! name fills the current buyer when that buyer has none. Otherwise it waits
//! for the next line: an identifier or phone without a name makes it a new
//! buyer, anything else makes it the next merchant.

pub mod dates;
pub mod pricing;
pub mod transcript;

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{ReferenceDate, ShowDate, TransactionRecord};

pub use dates::{infer_month, parse_show_date, DateToken};
pub use pricing::{parse_pricing, PricingExpr};
pub use transcript::{classify, classify_line, BuyerFragment, Entry};

/// Tolerance when comparing a stated `=total` with the expression
const TOTAL_EPSILON: f64 = 0.005;

#[derive(Debug, Default, Clone)]
struct Buyer {
    name: String,
    id: String,
    phone: String,
}

impl Buyer {
    /// True if every field the fragment carries is still empty here
    fn can_absorb(&self, fragment: &BuyerFragment) -> bool {
        (fragment.name.is_none() || self.name.is_empty())
            && (fragment.id.is_none() || self.id.is_empty())
            && (fragment.phone.is_none() || self.phone.is_empty())
    }

    fn absorb(&mut self, fragment: BuyerFragment) {
        if let Some(name) = fragment.name {
            self.name = name;
        }
        if let Some(id) = fragment.id {
            self.id = id;
        }
        if let Some(phone) = fragment.phone {
            self.phone = phone;
        }
    }
}

impl From<BuyerFragment> for Buyer {
    fn from(fragment: BuyerFragment) -> Self {
        let mut buyer = Buyer::default();
        buyer.absorb(fragment);
        buyer
    }
}

fn attach(buyers: &mut Vec<Buyer>, fragment: BuyerFragment) {
    match buyers.last_mut() {
        Some(last) if last.can_absorb(&fragment) => last.absorb(fragment),
        _ => buyers.push(Buyer::from(fragment)),
    }
}

#[derive(Debug)]
struct OpenOrder {
    merchant: String,
    show_date: ShowDate,
    face_price: f64,
    description: String,
    buyers: Vec<Buyer>,
}

/// Streaming reconciler over classified transcript entries
pub struct Reconciler {
    today: ReferenceDate,
    records: Vec<TransactionRecord>,
    /// Indices into `records` that still have no sell price, oldest first
    pending: Vec<usize>,
    merchant: Option<String>,
    known_merchants: Vec<String>,
    order: Option<OpenOrder>,
    /// Buyers seen in the current segment before its first order
    held: Vec<Buyer>,
    /// Bare name after a complete buyer, decided by the next entry
    deferred: Option<String>,
}

impl Reconciler {
    pub fn new(today: ReferenceDate) -> Self {
        Self {
            today,
            records: Vec::new(),
            pending: Vec::new(),
            merchant: None,
            known_merchants: Vec::new(),
            order: None,
            held: Vec::new(),
            deferred: None,
        }
    }

    /// Feed one entry
    pub fn push(&mut self, entry: Entry) -> Result<()> {
        if let Some(name) = self.deferred.take() {
            match entry {
                Entry::Buyer(mut fragment) if fragment.name.is_none() => {
                    fragment.name = Some(name);
                    self.push_buyer(fragment);
                    return Ok(());
                }
                _ => self.start_segment(name)?,
            }
        }

        match entry {
            Entry::Text(text) => {
                if !self.is_buyer_name(&text) {
                    return self.start_segment(text);
                }
                if self.current_buyer_has_name() {
                    debug!(text = %text, "Bare name after a complete buyer; waiting for next line");
                    self.deferred = Some(text);
                } else {
                    self.push_buyer(BuyerFragment {
                        name: Some(text),
                        ..Default::default()
                    });
                }
                Ok(())
            }
            Entry::Order {
                date,
                description,
                face_price,
            } => self.open_order(date, description, face_price),
            Entry::Buyer(fragment) => {
                self.push_buyer(fragment);
                Ok(())
            }
            Entry::Pricing(expr) => {
                self.close_order()?;
                self.apply_pricing(&expr)
            }
        }
    }

    /// Close any open order and return the records in accumulation order
    pub fn finish(mut self) -> Result<Vec<TransactionRecord>> {
        if let Some(name) = self.deferred.take() {
            self.start_segment(name)?;
        }
        self.close_order()?;
        self.check_no_held_buyers()?;
        if !self.pending.is_empty() {
            warn!(
                count = self.pending.len(),
                "Transcript ends with unpriced records"
            );
        }
        Ok(self.records)
    }

    fn is_buyer_name(&self, text: &str) -> bool {
        self.order.is_some()
            && !self.known_merchants.iter().any(|m| m == text)
            && transcript::looks_like_name(text)
    }

    fn current_buyer_has_name(&self) -> bool {
        self.order
            .as_ref()
            .and_then(|order| order.buyers.last())
            .is_some_and(|buyer| !buyer.name.is_empty())
    }

    fn start_segment(&mut self, merchant: String) -> Result<()> {
        self.close_order()?;
        self.check_no_held_buyers()?;
        if !self.known_merchants.contains(&merchant) {
            self.known_merchants.push(merchant.clone());
        }
        debug!(merchant = %merchant, "Merchant segment");
        self.merchant = Some(merchant);
        Ok(())
    }

    fn open_order(&mut self, date: DateToken, description: String, face_price: f64) -> Result<()> {
        self.close_order()?;
        let show_date = date.resolve(self.today)?;
        let merchant = match &self.merchant {
            Some(m) => m.clone(),
            None => {
                warn!(show_date = %show_date, "Order line before any merchant line");
                String::new()
            }
        };
        self.order = Some(OpenOrder {
            merchant,
            show_date,
            face_price,
            description,
            buyers: std::mem::take(&mut self.held),
        });
        Ok(())
    }

    fn push_buyer(&mut self, fragment: BuyerFragment) {
        if fragment.is_empty() {
            return;
        }
        match self.order.as_mut() {
            Some(order) => attach(&mut order.buyers, fragment),
            None => attach(&mut self.held, fragment),
        }
    }

    fn check_no_held_buyers(&self) -> Result<()> {
        match self.held.first() {
            None => Ok(()),
            Some(buyer) => Err(Error::ShapeMismatch(format!(
                "Buyer details without an order line: '{}' {} {}",
                buyer.name, buyer.id, buyer.phone
            ))),
        }
    }

    fn close_order(&mut self) -> Result<()> {
        let Some(mut order) = self.order.take() else {
            return Ok(());
        };
        if order.buyers.is_empty() {
            return Err(Error::ShapeMismatch(format!(
                "Order {} {} {} has no buyer identity fields",
                order.show_date, order.description, order.face_price
            )));
        }

        if let Some(phone) = order
            .buyers
            .iter()
            .map(|b| b.phone.clone())
            .find(|p| !p.is_empty())
        {
            for buyer in order.buyers.iter_mut().filter(|b| b.phone.is_empty()) {
                buyer.phone = phone.clone();
            }
        }

        for buyer in order.buyers {
            self.pending.push(self.records.len());
            self.records.push(TransactionRecord {
                merchant: order.merchant.clone(),
                show_date: order.show_date,
                face_price: Some(order.face_price),
                buyer_name: buyer.name,
                buyer_id: buyer.id,
                buyer_phone: buyer.phone,
                quantity: 1,
                sell_price: None,
            });
        }
        Ok(())
    }

    fn apply_pricing(&mut self, expr: &PricingExpr) -> Result<()> {
        if self.pending.is_empty() {
            return Err(Error::ShapeMismatch(format!(
                "Pricing {:?} with no unpriced orders pending",
                expr
            )));
        }

        if let (Some(stated), Some(implied)) = (expr.stated_total(), expr.implied_total()) {
            if (stated - implied).abs() > TOTAL_EPSILON {
                warn!(stated, implied, "Stated total disagrees with pricing expression");
            }
        }

        match expr {
            PricingExpr::Lump(price) => {
                for index in self.pending.drain(..) {
                    self.records[index].sell_price = Some(*price);
                }
            }
            PricingExpr::Each { unit, count, .. } => {
                if *count > self.pending.len() {
                    return Err(Error::ShapeMismatch(format!(
                        "{}*{} covers more records than the {} pending",
                        unit,
                        count,
                        self.pending.len()
                    )));
                }
                let split = self.pending.len() - count;
                for index in self.pending.drain(split..) {
                    self.records[index].sell_price = Some(*unit);
                }
            }
            PricingExpr::Sum { parts, .. } => {
                if parts.len() != self.pending.len() {
                    return Err(Error::ShapeMismatch(format!(
                        "{} summands for {} pending records",
                        parts.len(),
                        self.pending.len()
                    )));
                }
                for (index, price) in self.pending.drain(..).zip(parts) {
                    self.records[index].sell_price = Some(*price);
                }
            }
        }
        Ok(())
    }
}

/// Reconcile an already classified entry stream
pub fn reconcile<I>(entries: I, today: ReferenceDate) -> Result<Vec<TransactionRecord>>
where
    I: IntoIterator<Item = Entry>,
{
    let mut reconciler = Reconciler::new(today);
    for entry in entries {
        reconciler.push(entry)?;
    }
    reconciler.finish()
}

/// Classify and reconcile a raw transcript
pub fn reconcile_transcript(text: &str, today: ReferenceDate) -> Result<Vec<TransactionRecord>> {
    let entries = classify(text)?;
    let records = reconcile(entries, today)?;
    debug!("Reconciled {} records from transcript", records.len());
    Ok(records)
}

/// A field where an extraction result disagrees with local reconciliation.
///
/// `field` is a record field name, or `"missing"` / `"unexpected"` for a
/// buyer only one side produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub buyer_id: String,
    pub field: &'static str,
    pub extracted: String,
    pub expected: String,
}

/// Compare extracted records with locally reconciled ones, matched by
/// identifier. Records without an identifier are not compared.
///
/// Field differences come first in extraction order, then identifiers the
/// extraction invented, then identifiers it dropped.
pub fn cross_check(
    extracted: &[TransactionRecord],
    expected: &[TransactionRecord],
) -> Vec<Discrepancy> {
    let by_id: HashMap<&str, &TransactionRecord> = expected
        .iter()
        .filter(|r| !r.dedup_key().is_empty())
        .map(|r| (r.dedup_key(), r))
        .collect();
    let extracted_ids: HashSet<&str> = extracted
        .iter()
        .map(|r| r.dedup_key())
        .filter(|k| !k.is_empty())
        .collect();

    let fmt_price = |p: Option<f64>| p.map(|v| v.to_string()).unwrap_or_default();
    let mut found = Vec::new();
    let mut unexpected = Vec::new();

    for record in extracted.iter().filter(|r| !r.dedup_key().is_empty()) {
        let Some(local) = by_id.get(record.dedup_key()) else {
            unexpected.push(Discrepancy {
                buyer_id: record.dedup_key().to_string(),
                field: "unexpected",
                extracted: record.buyer_name.clone(),
                expected: String::new(),
            });
            continue;
        };
        if record.sell_price != local.sell_price {
            found.push(Discrepancy {
                buyer_id: record.buyer_id.clone(),
                field: "sell_price",
                extracted: fmt_price(record.sell_price),
                expected: fmt_price(local.sell_price),
            });
        }
        if record.show_date != local.show_date {
            found.push(Discrepancy {
                buyer_id: record.buyer_id.clone(),
                field: "show_date",
                extracted: record.show_date.to_string(),
                expected: local.show_date.to_string(),
            });
        }
    }

    found.extend(unexpected);
    found.extend(
        expected
            .iter()
            .filter(|r| !r.dedup_key().is_empty() && !extracted_ids.contains(r.dedup_key()))
            .map(|r| Discrepancy {
                buyer_id: r.dedup_key().to_string(),
                field: "missing",
                extracted: String::new(),
                expected: r.buyer_name.clone(),
            }),
    );
    found
}
