//! Duplicate detection against the store
//!
//! Identity is the normalized buyer identifier. A record is dropped when its
//! identifier is already in the store or appeared earlier in the same batch.

use std::collections::HashSet;
use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{columns, Scalar, TransactionRecord};
use crate::normalize::normalize_scalar;

/// Result of merging a batch against the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Survivors, in their original order
    pub to_append: Vec<TransactionRecord>,
    /// Records dropped as duplicates (store or batch)
    pub skipped: usize,
}

/// Read every identifier already stored in `sheet`.
///
/// Fails with `StoreRead` when the file, the sheet or the identifier column
/// is missing or unreadable; callers decide whether that is fatal.
pub fn existing_keys(path: &Path, sheet: &str) -> Result<HashSet<String>> {
    if !path.exists() {
        return Err(Error::StoreRead(format!("{} does not exist", path.display())));
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::StoreRead(format!("Failed to open {}: {}", path.display(), e)))?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| Error::StoreRead(format!("Sheet '{}' unavailable: {}", sheet, e)))?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| Error::StoreRead(format!("Sheet '{}' is empty", sheet)))?;
    let id_col = header
        .iter()
        .position(|cell| normalize_scalar(&Scalar::from(cell)) == columns::BUYER_ID)
        .ok_or_else(|| {
            Error::StoreRead(format!(
                "Sheet '{}' has no '{}' column",
                sheet,
                columns::BUYER_ID
            ))
        })?;

    let keys: HashSet<String> = rows
        .filter_map(|row| row.get(id_col))
        .map(|cell| normalize_scalar(&Scalar::from(cell)))
        .filter(|key| !key.is_empty())
        .collect();

    debug!(count = keys.len(), sheet, "Loaded existing identifiers");
    Ok(keys)
}

/// Like [`existing_keys`], but an unreadable or absent store counts as empty
/// (first write)
pub fn existing_keys_or_empty(path: &Path, sheet: &str) -> HashSet<String> {
    match existing_keys(path, sheet) {
        Ok(keys) => keys,
        Err(e) => {
            if path.exists() {
                warn!(error = %e, "Could not read existing identifiers; treating store as empty");
            } else {
                debug!(path = %path.display(), "No store yet");
            }
            HashSet::new()
        }
    }
}

/// Filter `records` against `existing` and against each other.
///
/// Records with an empty identifier carry no identity and are always kept.
pub fn merge(existing: &HashSet<String>, records: Vec<TransactionRecord>) -> MergeOutcome {
    let mut seen: HashSet<String> = HashSet::new();
    let mut outcome = MergeOutcome::default();

    for record in records {
        let key = record.dedup_key().to_string();
        if key.is_empty() {
            outcome.to_append.push(record);
            continue;
        }
        if existing.contains(&key) {
            debug!(buyer_id = %key, "Skipping record already in store");
            outcome.skipped += 1;
            continue;
        }
        if !seen.insert(key.clone()) {
            debug!(buyer_id = %key, "Skipping duplicate within batch");
            outcome.skipped += 1;
            continue;
        }
        outcome.to_append.push(record);
    }

    outcome
}

/// Merge a batch against the identifiers stored at `path`
pub fn merge_into_store(path: &Path, sheet: &str, records: Vec<TransactionRecord>) -> MergeOutcome {
    let existing = existing_keys_or_empty(path, sheet);
    merge(&existing, records)
}
