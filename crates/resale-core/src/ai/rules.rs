//! Local extraction through the reconciliation engine
//!
//! Needs no network. Handles transcripts that follow the usual
//! merchant / order / buyer / price layout; anything else fails with a
//! shape mismatch instead of guessing.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::models::{RawRecord, ReferenceDate};
use crate::reconcile::reconcile_transcript;

use super::ExtractionBackend;

#[derive(Debug, Clone, Default)]
pub struct RulesBackend;

impl RulesBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExtractionBackend for RulesBackend {
    async fn extract(&self, transcript: &str, today: ReferenceDate) -> Result<Vec<RawRecord>> {
        let records = reconcile_transcript(transcript, today)?;
        debug!(records = records.len(), "Rule-based extraction finished");
        Ok(records.iter().map(RawRecord::from).collect())
    }

    fn model(&self) -> &str {
        "rules"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::Scalar;

    #[tokio::test]
    async fn test_extracts_multiplication_example() {
        let text = "海洋微信不收款转支付宝\n16号武汉 1280\n张三 420101199001011234\n李四 420101199001011235\n13800000000\n海洋微信不收款转支付宝\n1500*2=3000";
        let raw = RulesBackend::new()
            .extract(text, ReferenceDate::new(1, 19).unwrap())
            .await
            .unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[1].buyer_phone, Scalar::text("13800000000"));
        assert_eq!(raw[1].sell_price, Scalar::Float(1500.0));
        assert_eq!(raw[0].show_date, Scalar::text("1月16日"));
    }

    #[tokio::test]
    async fn test_shape_mismatch_propagates() {
        let text = "海洋\n16号武汉 980\n赵六 420101199001011236\n海洋\n1700+1800";
        let err = RulesBackend::new()
            .extract(text, ReferenceDate::new(1, 19).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }
}
