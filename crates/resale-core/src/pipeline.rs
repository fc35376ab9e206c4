//! Run state machine
//!
//! One run at a time moves through
//! `Idle → Extracting → PreviewReady → Saving → Idle`, falling to `Error` on
//! failure. `Error` behaves like `Idle` for the next trigger. While a run is
//! `Extracting` or `Saving`, new triggers are refused with [`Error::Busy`].
//!
//! Extraction runs on a spawned task; normalization, validation, merge and
//! append run only after it has completed.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::ai::{ExtractionBackend, ExtractionClient};
use crate::config::{BackendKind, Settings};
use crate::dedup::merge_into_store;
use crate::error::{Error, Result};
use crate::models::{ReferenceDate, TransactionRecord};
use crate::normalize::validate_extraction;
use crate::reconcile::{cross_check, reconcile_transcript, Discrepancy};
use crate::store::XlsxStore;

/// Records awaiting confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub records: Vec<TransactionRecord>,
    /// Disagreements between the model and local reconciliation
    pub discrepancies: Vec<Discrepancy>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Idle,
    Extracting,
    PreviewReady(Preview),
    Saving,
    Error(String),
}

impl RunState {
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Extracting => "extracting",
            RunState::PreviewReady(_) => "preview ready",
            RunState::Saving => "saving",
            RunState::Error(_) => "error",
        }
    }

    fn is_busy(&self) -> bool {
        matches!(self, RunState::Extracting | RunState::Saving)
    }
}

/// Result of a save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub written: usize,
    pub skipped: usize,
    pub path: PathBuf,
}

impl SaveOutcome {
    /// Every record was already in the store
    pub fn all_duplicates(&self) -> bool {
        self.written == 0 && self.skipped > 0
    }
}

/// A user session driving runs against one store
///
/// Cheap to clone; clones share state, so a trigger from any clone sees the
/// run in flight.
#[derive(Clone)]
pub struct Session {
    settings: Arc<Settings>,
    client: ExtractionClient,
    state: Arc<Mutex<RunState>>,
}

impl Session {
    pub fn new(settings: Settings, client: ExtractionClient) -> Self {
        Self {
            settings: Arc::new(settings),
            client,
            state: Arc::new(Mutex::new(RunState::Idle)),
        }
    }

    /// Session using the backend selected in `settings`
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let client = ExtractionClient::from_settings(&settings)?;
        Ok(Self::new(settings, client))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> RunState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // A poisoned lock only means a panic mid-transition; the state value is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set(&self, state: RunState) {
        debug!(state = state.name(), "Run state");
        *self.lock() = state;
    }

    /// Atomically move to `next` unless a run is in flight
    fn begin(&self, next: RunState, action: &str) -> Result<RunState> {
        let mut state = self.lock();
        if state.is_busy() {
            return Err(Error::Busy(format!(
                "Cannot {} while {}",
                action,
                state.name()
            )));
        }
        debug!(state = next.name(), "Run state");
        Ok(std::mem::replace(&mut *state, next))
    }

    fn fail<T>(&self, error: Error) -> Result<T> {
        warn!(stage = error.stage(), error = %error, "Run failed");
        self.set(RunState::Error(error.to_string()));
        Err(error)
    }

    /// Extract, normalize and validate `transcript`, leaving the session in
    /// `PreviewReady`
    pub async fn extract(&self, transcript: &str, today: ReferenceDate) -> Result<Preview> {
        self.begin(RunState::Extracting, "start an extraction")?;

        match self.run_extraction(transcript, today).await {
            Ok(preview) => {
                info!(
                    records = preview.records.len(),
                    discrepancies = preview.discrepancies.len(),
                    "Preview ready"
                );
                self.set(RunState::PreviewReady(preview.clone()));
                Ok(preview)
            }
            Err(e) => self.fail(e),
        }
    }

    async fn run_extraction(&self, transcript: &str, today: ReferenceDate) -> Result<Preview> {
        if transcript.trim().is_empty() {
            return Err(Error::Extraction("Transcript is empty".into()));
        }

        let client = self.client.clone();
        let text = transcript.to_string();
        let handle = tokio::spawn(async move { client.extract(&text, today).await });
        let raw = handle
            .await
            .map_err(|e| Error::Extraction(format!("Extraction task failed: {}", e)))??;

        let records = validate_extraction(&raw, today)?;
        let discrepancies = self.cross_check(transcript, today, &records);
        Ok(Preview {
            records,
            discrepancies,
        })
    }

    /// Check model output against local reconciliation when the transcript
    /// follows a layout the rules understand
    fn cross_check(
        &self,
        transcript: &str,
        today: ReferenceDate,
        records: &[TransactionRecord],
    ) -> Vec<Discrepancy> {
        if self.client.kind() == BackendKind::Rules {
            return Vec::new();
        }
        match reconcile_transcript(transcript, today) {
            Ok(expected) if expected.is_empty() => {
                debug!("No records reconciled locally; skipping cross-check");
                Vec::new()
            }
            Ok(expected) => {
                let found = cross_check(records, &expected);
                for d in &found {
                    warn!(
                        buyer_id = %d.buyer_id,
                        field = d.field,
                        extracted = %d.extracted,
                        expected = %d.expected,
                        "Extraction disagrees with local reconciliation"
                    );
                }
                found
            }
            Err(e) => {
                debug!(error = %e, "Transcript not reconcilable locally; skipping cross-check");
                Vec::new()
            }
        }
    }

    /// Abbreviate, dedup against the store and append the previewed records
    pub fn save(&self) -> Result<SaveOutcome> {
        let preview = match self.begin(RunState::Saving, "save")? {
            RunState::PreviewReady(preview) => preview,
            other => {
                // Nothing was previewed; restore whatever state we displaced
                self.set(other);
                return Err(Error::InvalidData(
                    "Nothing to save; run an extraction first".into(),
                ));
            }
        };

        match self.run_save(preview.records) {
            Ok(outcome) => {
                self.set(RunState::Idle);
                Ok(outcome)
            }
            Err(e) => self.fail(e),
        }
    }

    fn run_save(&self, mut records: Vec<TransactionRecord>) -> Result<SaveOutcome> {
        let settings = &self.settings;
        settings.abbreviation_map().apply(&mut records);

        let path = settings.store_path.clone();
        let outcome = merge_into_store(&path, &settings.sheet_name, records);
        if outcome.to_append.is_empty() {
            info!(
                skipped = outcome.skipped,
                "All records already in store; nothing written"
            );
            return Ok(SaveOutcome {
                written: 0,
                skipped: outcome.skipped,
                path,
            });
        }

        let store = XlsxStore::with_sheet(&path, &settings.sheet_name);
        let written = store.append(&outcome.to_append)?;
        Ok(SaveOutcome {
            written,
            skipped: outcome.skipped,
            path,
        })
    }

    /// Drop any preview or error and return to `Idle`
    pub fn reset(&self) -> Result<()> {
        self.begin(RunState::Idle, "reset")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use std::time::Duration;

    const TRANSCRIPT: &str = "海洋微信不收款转支付宝\n1.16 武汉梓渝 1280\n张三 420101199001011234 13800000000\n海洋微信不收款转支付宝\n1500";

    fn today() -> ReferenceDate {
        ReferenceDate::new(1, 19).unwrap()
    }

    fn session_in(dir: &std::path::Path, client: ExtractionClient) -> Session {
        let mut settings = Settings::default();
        settings.store_path = dir.join("store.xlsx");
        settings.abbreviations = "海洋微信不收款转支付宝,海洋".into();
        Session::new(settings, client)
    }

    #[tokio::test]
    async fn test_full_run_then_duplicate_run() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), ExtractionClient::rules());

        let preview = session.extract(TRANSCRIPT, today()).await.unwrap();
        assert_eq!(preview.records.len(), 1);
        assert!(matches!(session.state(), RunState::PreviewReady(_)));

        let outcome = session.save().unwrap();
        assert_eq!((outcome.written, outcome.skipped), (1, 0));
        assert_eq!(session.state(), RunState::Idle);

        session.extract(TRANSCRIPT, today()).await.unwrap();
        let again = session.save().unwrap();
        assert_eq!((again.written, again.skipped), (0, 1));
        assert!(again.all_duplicates());
    }

    #[tokio::test]
    async fn test_mock_output_is_cross_checked() {
        let dir = tempfile::tempdir().unwrap();
        let response = r#"[{"说明": "海洋微信不收款转支付宝", "演出时间": "1月16日", "购买票价": 1280, "观演者姓名": "张三", "观演者身份证号码": "420101199001011234", "观演者手机号码": "13800000000", "购买数量": 1, "卖价": 1600}]"#;
        let client = ExtractionClient::Mock(MockBackend::with_response(response));
        let session = session_in(dir.path(), client);

        let preview = session.extract(TRANSCRIPT, today()).await.unwrap();
        assert_eq!(preview.discrepancies.len(), 1);
        assert_eq!(preview.discrepancies[0].field, "sell_price");
        assert_eq!(preview.discrepancies[0].expected, "1500");
    }

    #[tokio::test]
    async fn test_dropped_buyer_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = "海洋微信不收款转支付宝\n1.16 武汉梓渝 1280\n张三 420101199001011234 13800000000\n李四 420101199001011235\n海洋微信不收款转支付宝\n1500*2";
        let client = ExtractionClient::Mock(MockBackend::new());
        let session = session_in(dir.path(), client);

        let preview = session.extract(transcript, today()).await.unwrap();
        assert_eq!(preview.records.len(), 1);
        assert_eq!(preview.discrepancies.len(), 1);
        assert_eq!(preview.discrepancies[0].field, "missing");
        assert_eq!(preview.discrepancies[0].buyer_id, "420101199001011235");
    }

    #[tokio::test]
    async fn test_extraction_failure_sets_error_then_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(
            dir.path(),
            ExtractionClient::Mock(MockBackend::failing("model unavailable")),
        );

        let err = session.extract(TRANSCRIPT, today()).await.unwrap_err();
        assert_eq!(err.stage(), "extraction");
        assert!(matches!(session.state(), RunState::Error(_)));

        // Error behaves like Idle for the next trigger
        let err = session.extract(TRANSCRIPT, today()).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), ExtractionClient::rules());
        assert!(matches!(
            session.extract("  \n ", today()).await,
            Err(Error::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn test_save_without_preview() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), ExtractionClient::rules());
        assert!(matches!(session.save(), Err(Error::InvalidData(_))));
        assert_eq!(session.state(), RunState::Idle);
        assert!(!dir.path().join("store.xlsx").exists());
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let slow = MockBackend::new().with_delay(Duration::from_millis(300));
        let session = session_in(dir.path(), ExtractionClient::Mock(slow));

        let background = session.clone();
        let first = tokio::spawn(async move { background.extract(TRANSCRIPT, today()).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(session.state(), RunState::Extracting);
        assert!(matches!(
            session.extract(TRANSCRIPT, today()).await,
            Err(Error::Busy(_))
        ));
        assert!(matches!(session.save(), Err(Error::Busy(_))));

        first.await.unwrap().unwrap();
        assert!(matches!(session.state(), RunState::PreviewReady(_)));
    }

    #[tokio::test]
    async fn test_abbreviation_applied_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path(), ExtractionClient::rules());
        session.extract(TRANSCRIPT, today()).await.unwrap();
        session.save().unwrap();

        let book = umya_spreadsheet::reader::xlsx::read(dir.path().join("store.xlsx")).unwrap();
        let sheet = book.get_sheet_by_name("信息").unwrap();
        assert_eq!(sheet.get_value((1, 2)), "海洋");
    }

    #[tokio::test]
    async fn test_store_write_failure_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.xlsx");
        std::fs::write(&path, b"locked by another program").unwrap();
        let session = session_in(dir.path(), ExtractionClient::rules());

        session.extract(TRANSCRIPT, today()).await.unwrap();
        let err = session.save().unwrap_err();
        assert_eq!(err.stage(), "store write");
        assert!(matches!(session.state(), RunState::Error(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"locked by another program");
    }
}
