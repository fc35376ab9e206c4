//! OpenAI-compatible backend
//!
//! Works with any server implementing `POST {base_url}/chat/completions`:
//! api.openai.com, DeepSeek, vLLM, LocalAI, llama-server and so on. The base
//! URL includes the version segment, e.g. `https://api.openai.com/v1`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{RawRecord, ReferenceDate};
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::parse_extraction;
use super::ExtractionBackend;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 32000;

#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    reasoning_effort: Option<String>,
    prompts: PromptLibrary,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            reasoning_effort: None,
            prompts: PromptLibrary::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string()).filter(|k| !k.is_empty());
        self
    }

    pub fn with_reasoning_effort(mut self, effort: Option<&str>) -> Self {
        self.reasoning_effort = effort.map(str::to_string);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Build from resolved settings; fails if they are unusable for a remote call
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Self::new(&settings.base_url, &settings.model)
            .with_api_key(&settings.api_key)
            .with_reasoning_effort(settings.reasoning_effort.as_deref())
            .with_timeout(Duration::from_secs(settings.request_timeout_secs))
    }

    pub fn host(&self) -> &str {
        &self.base_url
    }

    fn build_request(&self, system_prompt: String, transcript: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: transcript.to_string(),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            reasoning_effort: self.reasoning_effort.clone(),
            stream: false,
        }
    }

    async fn chat_completion(&self, request: &ChatCompletionRequest) -> Result<String> {
        let mut req_builder = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!("API error {}: {}", status, body)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Error::Extraction("No content in API response".into()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ExtractionBackend for OpenAICompatibleBackend {
    async fn extract(&self, transcript: &str, today: ReferenceDate) -> Result<Vec<RawRecord>> {
        let prompt = self.prompts.get(PromptId::ExtractTickets)?;
        let request = self.build_request(prompt.render_system(today), transcript);

        info!(model = %self.model, host = %self.base_url, "Requesting extraction");
        let response = self.chat_completion(&request).await?;
        debug!("Extraction response: {}", response);

        let records = parse_extraction(&response)?;
        info!(records = records.len(), "Extraction returned records");
        Ok(records)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
