//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `config` - Settings commands (show, set, path)
//! - `core` - Shared utilities (settings, reference date, transcript input, preview)
//! - `import` - Extraction and store commands (extract, import, keys)
//! - `prompts` - Extraction prompt inspection

pub mod config;
pub mod core;
pub mod import;
pub mod prompts;

pub use config::*;
pub use self::core::*;
pub use import::*;
pub use prompts::*;
