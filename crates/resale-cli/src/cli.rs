//! CLI argument definitions using clap
//!
//! This module contains the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resale - Turn ticket resale chats into ledger rows
#[derive(Parser)]
#[command(name = "resale")]
#[command(about = "Extract ticket resale records from chat transcripts into an xlsx ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings file (default: ~/.config/resale/settings.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract records from a transcript and print the preview
    Extract {
        /// Transcript file ("-" reads stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Reference date for bare days, e.g. 1-19 (default: today)
        #[arg(long)]
        today: Option<String>,

        /// Extraction backend: openai, rules, mock
        #[arg(short, long)]
        backend: Option<String>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract, preview and append new records to the store
    Import {
        /// Transcript file ("-" reads stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Store workbook (overrides settings)
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Reference date for bare days, e.g. 1-19 (default: today)
        #[arg(long)]
        today: Option<String>,

        /// Extraction backend: openai, rules, mock
        #[arg(short, long)]
        backend: Option<String>,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Count the identifiers already in the store
    Keys {
        /// Store workbook (overrides settings)
        #[arg(short, long)]
        store: Option<PathBuf>,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the rendered extraction prompt
    Prompt {
        /// Reference date to render, e.g. 1-19 (default: today)
        #[arg(long)]
        today: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show resolved settings (API key masked)
    Show,

    /// Set a value in the settings file
    Set {
        /// One of: backend, base_url, api_key, model, reasoning_effort,
        /// request_timeout_secs, store_path, sheet_name, abbreviations
        key: String,

        value: String,
    },

    /// Show the settings file path
    Path,
}
