//! Extraction and store commands
//!
//! - `cmd_extract` - Preview records from a transcript without saving
//! - `cmd_import` - Preview, confirm and append to the store
//! - `cmd_keys` - Count identifiers already in the store

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use resale_core::{existing_keys, ReferenceDate, Session, Settings};
use tracing::debug;

use super::{print_preview, read_transcript, staged};

pub async fn cmd_extract(
    settings: Settings,
    input: &Path,
    today: ReferenceDate,
    json: bool,
) -> Result<()> {
    let transcript = read_transcript(input)?;
    let session = Session::from_settings(settings).map_err(staged)?;

    if !json {
        println!(
            "🔍 Extracting with {} (reference date {})...",
            session.settings().backend,
            today
        );
    }
    let preview = session.extract(&transcript, today).await.map_err(staged)?;

    if json {
        let out = serde_json::to_string_pretty(&preview.records)
            .context("Failed to serialize records")?;
        println!("{}", out);
    } else {
        print_preview(&preview);
    }
    Ok(())
}

pub async fn cmd_import(
    settings: Settings,
    input: &Path,
    today: ReferenceDate,
    yes: bool,
) -> Result<()> {
    let transcript = read_transcript(input)?;
    let session = Session::from_settings(settings).map_err(staged)?;

    println!(
        "🔍 Extracting with {} (reference date {})...",
        session.settings().backend,
        today
    );
    let preview = session.extract(&transcript, today).await.map_err(staged)?;
    print_preview(&preview);

    if preview.records.is_empty() {
        session.reset().map_err(staged)?;
        return Ok(());
    }

    if !yes && !confirm(&format!(
        "Append to {}?",
        session.settings().store_path.display()
    ))? {
        session.reset().map_err(staged)?;
        println!("Aborted.");
        return Ok(());
    }

    let outcome = session.save().map_err(staged)?;
    debug!(written = outcome.written, skipped = outcome.skipped, "Save finished");

    if outcome.all_duplicates() {
        println!(
            "ℹ️  All {} record(s) are already in {}; nothing written.",
            outcome.skipped,
            outcome.path.display()
        );
    } else {
        println!("✅ Saved to {}", outcome.path.display());
        println!("   Written: {}", outcome.written);
        println!("   Skipped (duplicates): {}", outcome.skipped);
    }
    Ok(())
}

pub fn cmd_keys(settings: &Settings) -> Result<()> {
    let path = &settings.store_path;
    if !path.exists() {
        println!("Store {} does not exist yet.", path.display());
        return Ok(());
    }

    let keys = existing_keys(path, &settings.sheet_name).map_err(staged)?;
    println!(
        "📒 {} identifier(s) in {} [{}]",
        keys.len(),
        path.display(),
        settings.sheet_name
    );
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
