//! Resale CLI - ticket resale ledger
//!
//! Usage:
//!   resale extract --input chat.txt          Preview extracted records
//!   resale import --input chat.txt --yes     Append new records to the store
//!   resale keys                              Count stored identifiers
//!   resale config show                       Show resolved settings

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use resale_core::PromptLibrary;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Extract {
            input,
            today,
            backend,
            json,
        } => {
            let settings = commands::load_settings(config, backend.as_deref(), None)?;
            let today = commands::resolve_today(today.as_deref())?;
            commands::cmd_extract(settings, &input, today, json).await
        }
        Commands::Import {
            input,
            store,
            today,
            backend,
            yes,
        } => {
            let settings = commands::load_settings(config, backend.as_deref(), store)?;
            let today = commands::resolve_today(today.as_deref())?;
            commands::cmd_import(settings, &input, today, yes).await
        }
        Commands::Keys { store } => {
            let settings = commands::load_settings(config, None, store)?;
            commands::cmd_keys(&settings)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::cmd_config_show(config),
            ConfigAction::Set { key, value } => commands::cmd_config_set(config, &key, &value),
            ConfigAction::Path => commands::cmd_config_path(config),
        },
        Commands::Prompt { today } => {
            let today = commands::resolve_today(today.as_deref())?;
            commands::cmd_prompt(&PromptLibrary::new(), today)
        }
    }
}
