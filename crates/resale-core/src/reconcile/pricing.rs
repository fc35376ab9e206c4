//! Trailing pricing tokens
//!
//! A merchant closes a run of orders with one of:
//! - `1700`          lump: every pending record sells at 1700
//! - `1500*2=3000`   each: the last two pending records sell at 1500 apiece
//! - `1700+1800`     sum: pending records take the summands in order

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum PricingExpr {
    Lump(f64),
    Each {
        unit: f64,
        count: usize,
        total: Option<f64>,
    },
    Sum {
        parts: Vec<f64>,
        total: Option<f64>,
    },
}

impl PricingExpr {
    /// Total implied by the left-hand side, for checking a stated `=total`
    pub fn implied_total(&self) -> Option<f64> {
        match self {
            PricingExpr::Lump(_) => None,
            PricingExpr::Each { unit, count, .. } => Some(unit * *count as f64),
            PricingExpr::Sum { parts, .. } => Some(parts.iter().sum()),
        }
    }

    /// The `=total` written after the expression, if any
    pub fn stated_total(&self) -> Option<f64> {
        match self {
            PricingExpr::Lump(_) => None,
            PricingExpr::Each { total, .. } | PricingExpr::Sum { total, .. } => *total,
        }
    }
}

/// Fold full-width and alternative operator glyphs onto ASCII
fn fold_operators(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '＊' | '×' | 'x' | 'X' => '*',
            '＋' => '+',
            '＝' => '=',
            '．' => '.',
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            other => other,
        })
        .collect()
}

fn is_numeric_char(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c) || matches!(c, '.' | '．')
}

/// True if whitespace separates two numbers, as in `1.16 1280`. Spaces
/// around an operator (`1500 * 2`) do not count.
fn has_spaced_numbers(line: &str) -> bool {
    let mut prev: Option<char> = None;
    let mut gap = false;
    for c in line.trim().chars() {
        if c.is_whitespace() {
            gap = true;
            continue;
        }
        if gap && is_numeric_char(c) && prev.is_some_and(is_numeric_char) {
            return true;
        }
        prev = Some(c);
        gap = false;
    }
    false
}

/// Whether a line is made only of numbers and arithmetic, i.e. it is meant as
/// a pricing token even if it turns out malformed.
///
/// Two numbers separated by whitespace are an order line with an explicit
/// date (`1.16 1280`), not a price.
pub fn looks_like_pricing(line: &str) -> bool {
    if has_spaced_numbers(line) {
        return false;
    }
    let folded = fold_operators(line);
    !folded.is_empty()
        && folded.chars().any(|c| c.is_ascii_digit())
        && folded
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '*' | '+' | '=' | '-' | '/'))
}

fn number(s: &str) -> Option<f64> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn malformed(raw: &str) -> Error {
    Error::ShapeMismatch(format!("Malformed pricing expression: '{}'", raw.trim()))
}

/// Parse a pricing token
pub fn parse_pricing(raw: &str) -> Result<PricingExpr> {
    let folded = fold_operators(raw);

    let mut sides = folded.split('=');
    let lhs = sides.next().unwrap_or("");
    let total = match sides.next() {
        Some(t) => Some(number(t).ok_or_else(|| malformed(raw))?),
        None => None,
    };
    if sides.next().is_some() {
        return Err(malformed(raw));
    }

    if lhs.contains('*') {
        let (unit, count) = lhs.split_once('*').ok_or_else(|| malformed(raw))?;
        let unit = number(unit).ok_or_else(|| malformed(raw))?;
        let count = count
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| malformed(raw))?;
        return Ok(PricingExpr::Each { unit, count, total });
    }

    if lhs.contains('+') {
        let parts = lhs
            .split('+')
            .map(number)
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| malformed(raw))?;
        return Ok(PricingExpr::Sum { parts, total });
    }

    if total.is_some() {
        return Err(malformed(raw));
    }
    number(lhs).map(PricingExpr::Lump).ok_or_else(|| malformed(raw))
}
