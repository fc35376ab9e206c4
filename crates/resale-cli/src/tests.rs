//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::{Path, PathBuf};

use resale_core::{existing_keys, PromptLibrary, ReferenceDate, Settings};

use crate::commands;

const TRANSCRIPT: &str = "海洋微信不收款转支付宝
16号武汉 1280
张三 420101199001011234
13800000000
海洋微信不收款转支付宝
1500";

fn jan19() -> ReferenceDate {
    ReferenceDate::new(1, 19).unwrap()
}

fn write_transcript(dir: &Path) -> PathBuf {
    let path = dir.join("chat.txt");
    std::fs::write(&path, TRANSCRIPT).unwrap();
    path
}

fn rules_settings(store: &Path) -> Settings {
    let mut settings = Settings::embedded().unwrap();
    settings.set("backend", "rules").unwrap();
    settings.store_path = store.to_path_buf();
    settings
}

// ========== Shared Utility Tests ==========

#[test]
fn test_resolve_today_parses_argument() {
    let today = commands::resolve_today(Some("1-19")).unwrap();
    assert_eq!(today, jan19());
    assert_eq!(commands::resolve_today(Some("2月5日")).unwrap().month, 2);
}

#[test]
fn test_resolve_today_rejects_bad_month() {
    assert!(commands::resolve_today(Some("13-1")).is_err());
    assert!(commands::resolve_today(Some("tomorrow")).is_err());
}

#[test]
fn test_resolve_today_defaults_to_clock() {
    let today = commands::resolve_today(None).unwrap();
    assert!((1..=12).contains(&today.month));
}

#[test]
fn test_format_amount() {
    assert_eq!(commands::format_amount(Some(1500.0)), "1500");
    assert_eq!(commands::format_amount(Some(1499.5)), "1499.50");
    assert_eq!(commands::format_amount(None), "-");
}

#[test]
fn test_read_transcript_missing_file() {
    let err = commands::read_transcript(Path::new("/nonexistent/chat.txt")).unwrap_err();
    assert!(err.to_string().contains("Failed to read transcript"));
}

#[test]
fn test_load_settings_applies_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("settings.toml");
    std::fs::write(&config, "[store]\nsheet = \"Sheet2\"\n").unwrap();
    let store = dir.path().join("ledger.xlsx");

    let settings =
        commands::load_settings(Some(&config), Some("rules"), Some(store.clone())).unwrap();
    assert_eq!(settings.backend.as_str(), "rules");
    assert_eq!(settings.store_path, store);
    assert_eq!(settings.sheet_name, "Sheet2");
}

#[test]
fn test_load_settings_unknown_backend() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("settings.toml");
    std::fs::write(&config, "").unwrap();

    let err = commands::load_settings(Some(&config), Some("gpt"), None).unwrap_err();
    assert!(err.to_string().contains("configuration failed"));
}

// ========== Extract / Import Command Tests ==========

#[tokio::test]
async fn test_cmd_extract_rules_backend() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_transcript(dir.path());
    let store = dir.path().join("store.xlsx");

    let result = commands::cmd_extract(rules_settings(&store), &input, jan19(), false).await;
    assert!(result.is_ok());
    // Extraction alone never touches the store
    assert!(!store.exists());
}

#[tokio::test]
async fn test_cmd_extract_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_transcript(dir.path());
    let store = dir.path().join("store.xlsx");

    let result = commands::cmd_extract(rules_settings(&store), &input, jan19(), true).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cmd_extract_requires_api_key_for_remote_backend() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_transcript(dir.path());
    let mut settings = Settings::embedded().unwrap();
    settings.api_key.clear();

    let err = commands::cmd_extract(settings, &input, jan19(), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("configuration failed"));
}

#[tokio::test]
async fn test_cmd_import_then_reimport_skips() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_transcript(dir.path());
    let store = dir.path().join("store.xlsx");

    commands::cmd_import(rules_settings(&store), &input, jan19(), true)
        .await
        .unwrap();
    assert!(store.exists());
    let keys = existing_keys(&store, "信息").unwrap();
    assert!(keys.contains("420101199001011234"));

    let before = std::fs::read(&store).unwrap();
    commands::cmd_import(rules_settings(&store), &input, jan19(), true)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&store).unwrap(), before);
}

#[tokio::test]
async fn test_cmd_import_empty_transcript_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.txt");
    std::fs::write(&input, "  \n").unwrap();
    let store = dir.path().join("store.xlsx");

    let err = commands::cmd_import(rules_settings(&store), &input, jan19(), true)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("extraction failed"));
    assert!(!store.exists());
}

#[test]
fn test_cmd_keys_missing_store() {
    let dir = tempfile::tempdir().unwrap();
    let settings = rules_settings(&dir.path().join("missing.xlsx"));
    assert!(commands::cmd_keys(&settings).is_ok());
}

#[tokio::test]
async fn test_cmd_keys_after_import() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_transcript(dir.path());
    let store = dir.path().join("store.xlsx");
    let settings = rules_settings(&store);

    commands::cmd_import(settings.clone(), &input, jan19(), true)
        .await
        .unwrap();
    assert!(commands::cmd_keys(&settings).is_ok());
}

// ========== Config Command Tests ==========

#[test]
fn test_cmd_config_set_creates_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    commands::cmd_config_set(Some(&path), "model", "deepseek-chat").unwrap();
    commands::cmd_config_set(Some(&path), "abbreviations", "海洋微信不收款转支付宝,海洋").unwrap();

    let settings = Settings::load_files(Some(&path)).unwrap();
    assert_eq!(settings.model, "deepseek-chat");
    assert_eq!(
        settings.abbreviation_map().lookup("海洋微信不收款转支付宝"),
        Some("海洋")
    );
    // Untouched values keep their defaults
    assert_eq!(settings.sheet_name, "信息");
}

#[test]
fn test_cmd_config_set_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");

    assert!(commands::cmd_config_set(Some(&path), "colour", "blue").is_err());
    assert!(!path.exists());
}

#[test]
fn test_cmd_config_show_and_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");

    assert!(commands::cmd_config_path(Some(&path)).is_ok());
    commands::cmd_config_set(Some(&path), "backend", "mock").unwrap();
    assert!(commands::cmd_config_show(Some(&path)).is_ok());
}

#[test]
fn test_cmd_config_show_missing_explicit_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(commands::cmd_config_show(Some(&path)).is_err());
}

// ========== Prompt Command Tests ==========

#[test]
fn test_cmd_prompt_embedded() {
    let library = PromptLibrary::embedded_only();
    assert!(commands::cmd_prompt(&library, jan19()).is_ok());
}

#[test]
fn test_cmd_prompt_override() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("extract_tickets.md"),
        "---\nid: extract_tickets\nversion: 2\ntask_type: structured_extraction\n---\n\n# System\n\n今天是{{current_date}}\n",
    )
    .unwrap();

    let library = PromptLibrary::with_override_dir(dir.path().to_path_buf());
    assert!(commands::cmd_prompt(&library, jan19()).is_ok());
}
