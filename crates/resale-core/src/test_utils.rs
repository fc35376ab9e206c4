//! Test utilities for resale-core
//!
//! A mock OpenAI-compatible server that answers `/v1/chat/completions` with
//! a fixed message and records the last request it saw.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// A request captured by [`MockOpenAIServer`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    content: Arc<String>,
    last: Arc<Mutex<Option<RecordedRequest>>>,
}

/// Mock OpenAI-compatible server for tests and demos
pub struct MockOpenAIServer {
    addr: SocketAddr,
    last: Arc<Mutex<Option<RecordedRequest>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOpenAIServer {
    /// Start a server whose completions carry `content` as the message
    pub async fn start_with_content(content: &str) -> Self {
        Self::start(StatusCode::OK, content).await
    }

    /// Start a server that answers every request with `status` and `message`
    pub async fn start_failing(status: u16, message: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        Self::start(status, message).await
    }

    async fn start(status: StatusCode, content: &str) -> Self {
        let last = Arc::new(Mutex::new(None));
        let state = MockState {
            status,
            content: Arc::new(content.to_string()),
            last: last.clone(),
        };
        let app = Router::new()
            .route("/v1/chat/completions", post(handle_chat_completions))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            last,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL including the `/v1` segment
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.last.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOpenAIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_chat_completions(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let model = body["model"].as_str().unwrap_or("mock").to_string();
    *state.last.lock().unwrap() = Some(RecordedRequest {
        authorization,
        body,
    });

    if !state.status.is_success() {
        let error = json!({ "error": { "message": state.content.as_str() } });
        return (state.status, Json(error)).into_response();
    }

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": state.content.as_str() },
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}
