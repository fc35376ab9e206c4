//! Settings command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use resale_core::config::default_settings_path;
use resale_core::Settings;

use super::staged;

fn settings_path(config: Option<&Path>) -> Result<PathBuf> {
    match config {
        Some(path) => Ok(path.to_path_buf()),
        None => default_settings_path().context("No config directory available on this system"),
    }
}

pub fn cmd_config_show(config: Option<&Path>) -> Result<()> {
    let settings = Settings::load(config).map_err(staged)?;
    println!("{}", settings);

    if let Err(e) = settings.validate() {
        println!();
        println!("⚠️  {}", e);
    }
    Ok(())
}

/// Write one value to the settings file, creating it if needed.
/// Environment overrides are not persisted.
pub fn cmd_config_set(config: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = settings_path(config)?;
    let mut settings = if path.exists() {
        Settings::load_files(Some(&path))
    } else {
        Settings::embedded()
    }
    .map_err(staged)?;

    settings.set(key, value).map_err(staged)?;
    settings.save(&path).map_err(staged)?;

    let shown = if key == "api_key" {
        resale_core::config::mask_secret(value)
    } else {
        value.to_string()
    };
    println!("✅ {} = {}", key, shown);
    println!("   Saved to {}", path.display());
    Ok(())
}

pub fn cmd_config_path(config: Option<&Path>) -> Result<()> {
    let path = settings_path(config)?;
    let status = if path.exists() { "" } else { " (not created yet)" };
    println!("{}{}", path.display(), status);
    Ok(())
}
