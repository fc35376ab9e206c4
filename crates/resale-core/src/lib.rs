//! Resale Core Library
//!
//! Turns ticket-resale chat transcripts into ledger rows:
//! - Extraction backends (OpenAI-compatible LLM, local rules, mock)
//! - Record normalization and validation of extraction output
//! - Price/date reconciliation over transcript lines
//! - Duplicate detection against the existing store
//! - Styled, atomic append to the xlsx store
//! - Layered settings and an overridable extraction prompt
//! - A run state machine tying the stages together

pub mod abbrev;
pub mod ai;
pub mod config;
pub mod dedup;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod reconcile;
pub mod store;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use abbrev::AbbreviationMap;
pub use ai::{
    ExtractionBackend, ExtractionClient, MockBackend, OpenAICompatibleBackend, RulesBackend,
};
pub use config::{BackendKind, Settings};
pub use dedup::{existing_keys, merge, merge_into_store, MergeOutcome};
pub use error::{Error, Result};
pub use models::{RawRecord, ReferenceDate, Scalar, ShowDate, TransactionRecord, COLUMNS};
pub use normalize::{normalize_record, normalize_scalar, validate_extraction};
pub use pipeline::{Preview, RunState, SaveOutcome, Session};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use reconcile::{cross_check, reconcile_transcript, Discrepancy, Reconciler};
pub use store::XlsxStore;
