//! Error types for resale

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Extraction shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Store read error: {0}")]
    StoreRead(String),

    #[error("Store write error: {0}")]
    StoreWrite(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run in progress: {0}")]
    Busy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Name of the pipeline stage an error belongs to, for user-facing messages
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Extraction(_) | Error::Http(_) | Error::Json(_) => "extraction",
            Error::ShapeMismatch(_) | Error::InvalidData(_) => "reconciliation",
            Error::StoreRead(_) => "store read",
            Error::StoreWrite(_) | Error::Io(_) => "store write",
            Error::Config(_) => "configuration",
            Error::Busy(_) => "scheduling",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Error::Extraction("x".into()).stage(), "extraction");
        assert_eq!(Error::ShapeMismatch("x".into()).stage(), "reconciliation");
        assert_eq!(Error::StoreWrite("locked".into()).stage(), "store write");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::ShapeMismatch("2 summands for 3 pending records".into());
        assert_eq!(
            err.to_string(),
            "Extraction shape mismatch: 2 summands for 3 pending records"
        );
    }
}
