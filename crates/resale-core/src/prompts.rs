//! Extraction instruction set
//!
//! Prompts resolve in two layers:
//! 1. An override file in the data dir (~/.local/share/resale/prompts/overrides/)
//! 2. The embedded default compiled into the binary
//!
//! Prompt files carry YAML frontmatter followed by a `# System` section.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::ReferenceDate;

mod defaults {
    pub const EXTRACT_TICKETS: &str = include_str!("../../../prompts/extract_tickets.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Transcript → JSON array of ticket records
    ExtractTickets,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractTickets => "extract_tickets",
        }
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::ExtractTickets => defaults::EXTRACT_TICKETS,
        }
    }

    fn file_name(&self) -> String {
        format!("{}.md", self.as_str())
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Bumped whenever the wording changes
    pub version: u32,
    pub task_type: String,
}

/// A loaded prompt
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Body after the frontmatter
    pub content: String,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn is_override(&self) -> bool {
        self.override_path.is_some()
    }

    /// The `# System` section, or the whole body if there is none
    pub fn system_section(&self) -> &str {
        extract_section(&self.content, "# System").unwrap_or(self.content.trim())
    }

    /// System section with `{{current_date}}` filled in
    pub fn render_system(&self, today: ReferenceDate) -> String {
        self.system_section()
            .replace("{{current_date}}", &today.to_string())
    }
}

/// Loads prompts, preferring override files
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
        }
    }

    /// Embedded defaults only
    pub fn embedded_only() -> Self {
        Self { override_dir: None }
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_path(id).is_some()
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|dir| dir.join(id.file_name()))
            .filter(|path| path.exists())
    }

    pub fn get(&self, id: PromptId) -> Result<Prompt> {
        if let Some(path) = self.override_path(id) {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read prompt override {}: {}", path.display(), e))
            })?;
            let (metadata, content) = parse_prompt(&content)?;
            debug!(prompt = id.as_str(), path = %path.display(), "Using prompt override");
            return Ok(Prompt {
                metadata,
                content,
                override_path: Some(path),
            });
        }

        let (metadata, content) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content,
            override_path: None,
        })
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompt override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("resale").join("prompts").join("overrides"))
}

/// Split a prompt file into frontmatter metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();
    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| Error::Config("Prompt must start with YAML frontmatter (---)".into()))?;
    let end = rest
        .find("---")
        .ok_or_else(|| Error::Config("Prompt frontmatter not closed (missing second ---)".into()))?;

    let metadata: PromptMetadata = serde_yaml::from_str(rest[..end].trim())
        .map_err(|e| Error::Config(format!("Invalid prompt frontmatter: {}", e)))?;
    Ok((metadata, rest[end + 3..].trim().to_string()))
}

fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after = &content[start + header.len()..];
    // Subsections use ###, so only a top-level header ends the section
    let end = after.find("\n# ").unwrap_or(after.len());
    Some(after[..end].trim())
}
