//! Prompt command implementation

use anyhow::Result;
use resale_core::{PromptId, PromptLibrary, ReferenceDate};

use super::staged;

/// Print the extraction prompt as it will be sent for `today`
pub fn cmd_prompt(library: &PromptLibrary, today: ReferenceDate) -> Result<()> {
    let prompt = library.get(PromptId::ExtractTickets).map_err(staged)?;

    let source = match &prompt.override_path {
        Some(path) => format!("✓ Custom ({})", path.display()),
        None => "Default".to_string(),
    };
    println!(
        "{} v{} [{}] - {}",
        prompt.metadata.id, prompt.metadata.version, prompt.metadata.task_type, source
    );
    println!("{}", "-".repeat(80));
    println!("{}", prompt.render_system(today));
    println!("{}", "-".repeat(80));

    if !prompt.is_override() {
        println!(
            "To customize, copy it to {}/{}.md",
            library
                .override_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not available)".to_string()),
            PromptId::ExtractTickets.as_str()
        );
    }

    Ok(())
}
