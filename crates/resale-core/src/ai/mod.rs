//! Extraction backends
//!
//! Turn a raw chat transcript into the JSON record array the rest of the
//! pipeline consumes.
//!
//! # Architecture
//!
//! - `ExtractionBackend` trait: the one operation every backend provides
//! - `ExtractionClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backends: `OpenAICompatibleBackend` (remote LLM), `RulesBackend` (local
//!   reconciliation engine), `MockBackend` (canned response)
//!
//! # Usage
//!
//! ```rust,ignore
//! let settings = Settings::load(None)?;
//! let client = ExtractionClient::from_settings(&settings)?;
//! let raw = client.extract(&transcript, today).await?;
//! ```

mod mock;
mod openai_compatible;
pub mod parsing;
mod rules;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use rules::RulesBackend;

use async_trait::async_trait;

use crate::config::{BackendKind, Settings};
use crate::error::Result;
use crate::models::{RawRecord, ReferenceDate};

/// Interface shared by all extraction backends
///
/// Backends are Send + Sync so a run can move them onto a spawned task.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Extract raw records from `transcript`. `today` resolves bare days.
    async fn extract(&self, transcript: &str, today: ReferenceDate) -> Result<Vec<RawRecord>>;

    /// Model name, for logging
    fn model(&self) -> &str;
}

/// Concrete extraction client
#[derive(Clone)]
pub enum ExtractionClient {
    OpenAICompatible(OpenAICompatibleBackend),
    Rules(RulesBackend),
    Mock(MockBackend),
}

impl ExtractionClient {
    /// Build the backend selected in `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        match settings.backend {
            BackendKind::OpenAI => {
                OpenAICompatibleBackend::from_settings(settings).map(Self::OpenAICompatible)
            }
            BackendKind::Rules => Ok(Self::Rules(RulesBackend::new())),
            BackendKind::Mock => Ok(Self::Mock(MockBackend::new())),
        }
    }

    pub fn rules() -> Self {
        Self::Rules(RulesBackend::new())
    }

    pub fn mock() -> Self {
        Self::Mock(MockBackend::new())
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::OpenAICompatible(_) => BackendKind::OpenAI,
            Self::Rules(_) => BackendKind::Rules,
            Self::Mock(_) => BackendKind::Mock,
        }
    }
}

#[async_trait]
impl ExtractionBackend for ExtractionClient {
    async fn extract(&self, transcript: &str, today: ReferenceDate) -> Result<Vec<RawRecord>> {
        match self {
            Self::OpenAICompatible(b) => b.extract(transcript, today).await,
            Self::Rules(b) => b.extract(transcript, today).await,
            Self::Mock(b) => b.extract(transcript, today).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            Self::OpenAICompatible(b) => b.model(),
            Self::Rules(b) => b.model(),
            Self::Mock(b) => b.model(),
        }
    }
}
