//! Mock backend for testing
//!
//! Replays a canned model response through the same parser the remote
//! backend uses, so tests exercise fence stripping and unwrapping too.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{RawRecord, ReferenceDate};

use super::parsing::parse_extraction;
use super::ExtractionBackend;

const DEFAULT_RESPONSE: &str = r#"```json
[{"说明": "海洋微信不收款转支付宝", "演出时间": "1月16日", "购买票价": 1280, "观演者姓名": "张三", "观演者身份证号码": "420101199001011234", "观演者手机号码": "13800000000", "购买数量": 1, "卖价": 1500}]
```"#;

#[derive(Debug, Clone)]
enum Reply {
    Text(Arc<str>),
    Fail(Arc<str>),
}

#[derive(Debug, Clone)]
pub struct MockBackend {
    reply: Reply,
    delay: Option<Duration>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Mock answering with a single fenced record
    pub fn new() -> Self {
        Self::with_response(DEFAULT_RESPONSE)
    }

    /// Mock answering with `response` verbatim
    pub fn with_response(response: &str) -> Self {
        Self {
            reply: Reply::Text(Arc::from(response)),
            delay: None,
        }
    }

    /// Mock whose every call fails with an extraction error
    pub fn failing(message: &str) -> Self {
        Self {
            reply: Reply::Fail(Arc::from(message)),
            delay: None,
        }
    }

    /// Wait `delay` before answering, to simulate a slow model
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    async fn extract(&self, _transcript: &str, _today: ReferenceDate) -> Result<Vec<RawRecord>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Reply::Text(text) => parse_extraction(text),
            Reply::Fail(message) => Err(Error::Extraction(message.to_string())),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scalar;

    fn today() -> ReferenceDate {
        ReferenceDate::new(1, 19).unwrap()
    }

    #[tokio::test]
    async fn test_default_response() {
        let raw = MockBackend::new().extract("", today()).await.unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].buyer_id, Scalar::text("420101199001011234"));
    }

    #[tokio::test]
    async fn test_failing() {
        let err = MockBackend::failing("boom")
            .extract("", today())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(m) if m == "boom"));
    }
}
