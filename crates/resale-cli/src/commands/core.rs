//! Shared utilities for the commands
//!
//! - `load_settings` - Resolve settings with CLI overrides
//! - `resolve_today` - Reference date from `--today` or the local clock
//! - `read_transcript` - Read a transcript file or stdin
//! - `print_preview` - Render records awaiting confirmation

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Datelike;
use resale_core::{Preview, ReferenceDate, Settings, TransactionRecord};

/// Wrap a core error with the stage it failed in
pub fn staged(e: resale_core::Error) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("{} failed", stage))
}

/// Layered settings plus the per-invocation overrides
pub fn load_settings(
    config: Option<&Path>,
    backend: Option<&str>,
    store: Option<PathBuf>,
) -> Result<Settings> {
    let mut settings = Settings::load(config).map_err(staged)?;
    if let Some(backend) = backend {
        settings.set("backend", backend).map_err(staged)?;
    }
    if let Some(store) = store {
        settings.store_path = store;
    }
    Ok(settings)
}

pub fn resolve_today(arg: Option<&str>) -> Result<ReferenceDate> {
    match arg {
        Some(s) => s.parse().map_err(staged),
        None => {
            let now = chrono::Local::now();
            ReferenceDate::new(now.month(), now.day()).map_err(staged)
        }
    }
}

/// Read the transcript at `path`; `-` means stdin
pub fn read_transcript(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read transcript from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript {}", path.display()))
}

/// Whole amounts print without decimals
pub fn format_amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

pub fn format_record(record: &TransactionRecord) -> String {
    format!(
        "{:<14} {:<8} {:>7}  {:<6} {:<18} {:<11} {:>3} {:>7}",
        record.merchant,
        record.show_date.to_string(),
        format_amount(record.face_price),
        or_dash(&record.buyer_name),
        or_dash(&record.buyer_id),
        or_dash(&record.buyer_phone),
        record.quantity,
        format_amount(record.sell_price),
    )
}

pub fn print_preview(preview: &Preview) {
    if preview.records.is_empty() {
        println!("   No records found in transcript.");
        return;
    }

    println!();
    println!(
        "{:<14} {:<8} {:>7}  {:<6} {:<18} {:<11} {:>3} {:>7}",
        "Merchant", "Date", "Face", "Name", "ID", "Phone", "Qty", "Sell"
    );
    println!("{}", "-".repeat(84));
    for record in &preview.records {
        println!("{}", format_record(record));
    }
    println!();
    println!("   {} record(s)", preview.records.len());

    if !preview.discrepancies.is_empty() {
        println!();
        println!("⚠️  The model disagrees with local reconciliation:");
        for d in &preview.discrepancies {
            match d.field {
                "missing" => println!("   {} {}: not extracted", d.buyer_id, d.expected),
                "unexpected" => println!("   {} {}: not in transcript", d.buyer_id, d.extracted),
                field => println!(
                    "   {} {}: extracted {}, expected {}",
                    d.buyer_id, field, d.extracted, d.expected
                ),
            }
        }
    }
}
