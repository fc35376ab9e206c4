//! Run settings
//!
//! ## Resolution
//!
//! Settings are layered, later layers winning:
//! 1. Embedded defaults (config/settings.toml, compiled into the binary)
//! 2. Override file (~/.config/resale/settings.toml, or an explicit path)
//! 3. Environment variables
//!
//! Command-line flags are applied on top by the caller. The resolved
//! [`Settings`] is passed explicitly into every run.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::abbrev::AbbreviationMap;
use crate::error::{Error, Result};

const DEFAULT_SETTINGS: &str = include_str!("../../../config/settings.toml");

/// Which extraction collaborator a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// OpenAI-compatible chat completions endpoint
    #[default]
    OpenAI,
    /// Local rule-based reconciliation, no network
    Rules,
    /// Canned response, for tests and demos
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Rules => "rules",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" | "openai_compatible" => Ok(Self::OpenAI),
            "rules" | "local" => Ok(Self::Rules),
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!(
                "Unknown backend '{}' (expected openai, rules or mock)",
                other
            ))),
        }
    }
}

/// Resolved settings for a run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backend: BackendKind,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub reasoning_effort: Option<String>,
    pub request_timeout_secs: u64,
    pub store_path: PathBuf,
    pub sheet_name: String,
    /// Flat `original,short,...` list as entered by the user
    pub abbreviations: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::OpenAI,
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-4o".into(),
            reasoning_effort: Some("minimal".into()),
            request_timeout_secs: 300,
            store_path: PathBuf::from("票务统计.xlsx"),
            sheet_name: crate::models::SHEET_NAME.into(),
            abbreviations: String::new(),
        }
    }
}

/// Environment variables consulted by [`Settings::apply_env`]
pub mod env {
    pub const HOST: &str = "OPENAI_COMPATIBLE_HOST";
    pub const MODEL: &str = "OPENAI_COMPATIBLE_MODEL";
    pub const API_KEY: &str = "OPENAI_COMPATIBLE_API_KEY";
    pub const BACKEND: &str = "RESALE_BACKEND";
    pub const STORE: &str = "RESALE_STORE";
}

/// Keys accepted by [`Settings::set`]
pub const SETTABLE_KEYS: &[&str] = &[
    "backend",
    "base_url",
    "api_key",
    "model",
    "reasoning_effort",
    "request_timeout_secs",
    "store_path",
    "sheet_name",
    "abbreviations",
];

impl Settings {
    /// Embedded defaults, then the override file, then the environment
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::load_files(override_path)?;
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Embedded defaults and the override file, without the environment.
    /// This is what `save` should start from so env values are not persisted.
    pub fn load_files(override_path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::embedded()?;

        let path = match override_path {
            Some(p) => Some(p.to_path_buf()),
            None => default_settings_path(),
        };
        if let Some(path) = path.filter(|p| p.exists()) {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            settings.merge_toml(&content)?;
            debug!(path = %path.display(), "Loaded settings override");
        } else if let Some(p) = override_path {
            return Err(Error::Config(format!(
                "Settings file {} does not exist",
                p.display()
            )));
        }
        Ok(settings)
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        let mut settings = Self::default();
        settings.merge_toml(DEFAULT_SETTINGS)?;
        Ok(settings)
    }

    /// Overlay any values present in `content`
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawSettings = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid settings TOML: {}", e)))?;

        if let Some(ex) = raw.extraction {
            if let Some(backend) = ex.backend {
                self.backend = backend.parse()?;
            }
            if let Some(url) = ex.base_url {
                self.base_url = url;
            }
            if let Some(key) = ex.api_key {
                self.api_key = key;
            }
            if let Some(model) = ex.model {
                self.model = model;
            }
            if let Some(effort) = ex.reasoning_effort {
                self.reasoning_effort = non_empty(effort);
            }
            if let Some(secs) = ex.request_timeout_secs {
                self.request_timeout_secs = secs;
            }
        }
        if let Some(store) = raw.store {
            if let Some(path) = store.path {
                self.store_path = PathBuf::from(path);
            }
            if let Some(sheet) = store.sheet {
                self.sheet_name = sheet;
            }
            if let Some(abbreviations) = store.abbreviations {
                self.abbreviations = abbreviations;
            }
        }
        Ok(())
    }

    /// Overlay environment variables. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get(env::HOST) {
            self.base_url = host;
        }
        if let Some(model) = get(env::MODEL) {
            self.model = model;
        }
        if let Some(key) = get(env::API_KEY) {
            self.api_key = key;
        }
        if let Some(backend) = get(env::BACKEND) {
            match backend.parse() {
                Ok(kind) => self.backend = kind,
                Err(e) => tracing::warn!(error = %e, "Ignoring {}", env::BACKEND),
            }
        }
        if let Some(store) = get(env::STORE) {
            self.store_path = PathBuf::from(store);
        }
    }

    /// Set one value by key, as `config set` does
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "backend" => self.backend = value.parse()?,
            "base_url" => self.base_url = value.to_string(),
            "api_key" => self.api_key = value.to_string(),
            "model" => self.model = value.to_string(),
            "reasoning_effort" => self.reasoning_effort = non_empty(value.to_string()),
            "request_timeout_secs" => {
                self.request_timeout_secs = value.parse().map_err(|_| {
                    Error::Config(format!("request_timeout_secs must be a number, got '{}'", value))
                })?
            }
            "store_path" => self.store_path = PathBuf::from(value),
            "sheet_name" => self.sheet_name = value.to_string(),
            "abbreviations" => self.abbreviations = value.to_string(),
            other => {
                return Err(Error::Config(format!(
                    "Unknown setting '{}' (expected one of: {})",
                    other,
                    SETTABLE_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Check what a run against a remote backend needs
    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::OpenAI {
            if self.api_key.trim().is_empty() {
                return Err(Error::Config(format!(
                    "API key is not set (use `config set api_key` or {})",
                    env::API_KEY
                )));
            }
            if self.base_url.trim().is_empty() {
                return Err(Error::Config("base_url is empty".into()));
            }
        }
        if self.sheet_name.trim().is_empty() {
            return Err(Error::Config("sheet_name is empty".into()));
        }
        Ok(())
    }

    pub fn abbreviation_map(&self) -> AbbreviationMap {
        AbbreviationMap::parse(&self.abbreviations)
    }

    /// Write every value to `path` as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = RawSettings {
            extraction: Some(RawExtraction {
                backend: Some(self.backend.as_str().to_string()),
                base_url: Some(self.base_url.clone()),
                api_key: Some(self.api_key.clone()),
                model: Some(self.model.clone()),
                reasoning_effort: Some(self.reasoning_effort.clone().unwrap_or_default()),
                request_timeout_secs: Some(self.request_timeout_secs),
            }),
            store: Some(RawStore {
                path: Some(self.store_path.to_string_lossy().into_owned()),
                sheet: Some(self.sheet_name.clone()),
                abbreviations: Some(self.abbreviations.clone()),
            }),
        };
        let content = toml::to_string_pretty(&raw)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        info!(path = %path.display(), "Saved settings");
        Ok(())
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "backend              = {}", self.backend)?;
        writeln!(f, "base_url             = {}", self.base_url)?;
        writeln!(f, "api_key              = {}", mask_secret(&self.api_key))?;
        writeln!(f, "model                = {}", self.model)?;
        writeln!(
            f,
            "reasoning_effort     = {}",
            self.reasoning_effort.as_deref().unwrap_or("(omitted)")
        )?;
        writeln!(f, "request_timeout_secs = {}", self.request_timeout_secs)?;
        writeln!(f, "store_path           = {}", self.store_path.display())?;
        writeln!(f, "sheet_name           = {}", self.sheet_name)?;
        write!(f, "abbreviations        = {}", self.abbreviations)
    }
}

/// Default settings override path
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("resale").join("settings.toml"))
}

/// Show only the last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n <= 4 => "****".to_string(),
        n => format!("****{}", chars[n - 4..].iter().collect::<String>()),
    }
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim().to_string();
    (!s.is_empty()).then_some(s)
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawSettings {
    extraction: Option<RawExtraction>,
    store: Option<RawStore>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawExtraction {
    backend: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    reasoning_effort: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawStore {
    path: Option<String>,
    sheet: Option<String>,
    abbreviations: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_embedded_defaults() {
        let settings = Settings::embedded().unwrap();
        assert_eq!(settings.backend, BackendKind::OpenAI);
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.reasoning_effort.as_deref(), Some("minimal"));
        assert_eq!(settings.sheet_name, "信息");
        assert_eq!(settings.store_path, PathBuf::from("票务统计.xlsx"));
    }

    #[test]
    fn test_partial_override() {
        let mut settings = Settings::embedded().unwrap();
        settings
            .merge_toml("[extraction]\nmodel = \"qwen\"\nreasoning_effort = \"\"\n")
            .unwrap();
        assert_eq!(settings.model, "qwen");
        assert_eq!(settings.reasoning_effort, None);
        assert_eq!(settings.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_invalid_toml_and_backend() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.merge_toml("[extraction"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            settings.merge_toml("[extraction]\nbackend = \"carrier-pigeon\"\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (env::HOST, "http://localhost:8080/v1"),
            (env::MODEL, "local-model"),
            (env::API_KEY, "  "),
            (env::BACKEND, "rules"),
            (env::STORE, "/tmp/ledger.xlsx"),
        ]
        .into();
        let mut settings = Settings::default();
        settings.apply_env(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.base_url, "http://localhost:8080/v1");
        assert_eq!(settings.model, "local-model");
        assert_eq!(settings.api_key, "");
        assert_eq!(settings.backend, BackendKind::Rules);
        assert_eq!(settings.store_path, PathBuf::from("/tmp/ledger.xlsx"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::embedded().unwrap();
        settings.set("api_key", "sk-test-123456").unwrap();
        settings.set("abbreviations", "海洋微信不收款转支付宝,海洋").unwrap();
        settings.set("reasoning_effort", "").unwrap();
        settings.save(&path).unwrap();

        let mut reloaded = Settings::embedded().unwrap();
        reloaded
            .merge_toml(&fs::read_to_string(&path).unwrap())
            .unwrap();
        assert_eq!(reloaded, settings);
        assert_eq!(reloaded.abbreviation_map().lookup("海洋微信不收款转支付宝"), Some("海洋"));
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let mut settings = Settings::default();
        assert!(settings.set("colour", "blue").is_err());
        assert!(settings.set("request_timeout_secs", "soon").is_err());
        settings.set("request_timeout_secs", "30").unwrap();
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn test_validate_requires_key_for_remote() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_err());
        settings.backend = BackendKind::Rules;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_display_masks_key() {
        let mut settings = Settings::default();
        settings.api_key = "sk-abcdefgh1234".into();
        let shown = settings.to_string();
        assert!(shown.contains("****1234"));
        assert!(!shown.contains("sk-abcdefgh"));
        assert_eq!(mask_secret(""), "(not set)");
        assert_eq!(mask_secret("abc"), "****");
    }

    #[test]
    fn test_missing_explicit_override_is_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/resale.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
