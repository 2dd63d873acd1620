//! Test utilities for tally-core
//!
//! This module provides a mock AI server that speaks both the Ollama generate
//! API and the OpenAI chat completions API, for development and integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::ai::DEFAULT_MOCK_REPLY;

/// Mock AI server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

struct ServerState {
    reply: String,
    fail_status: Option<StatusCode>,
    generate_requests: AtomicUsize,
    last_authorization: Mutex<Option<String>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port, answering with a canonical analysis
    pub async fn start() -> Self {
        Self::start_inner(DEFAULT_MOCK_REPLY.to_string(), None).await
    }

    /// Start a server whose replies carry `reply` as the model output
    pub async fn start_with_reply(reply: &str) -> Self {
        Self::start_inner(reply.to_string(), None).await
    }

    /// Start a server that answers every generation request with `status`
    pub async fn start_failing(status: u16) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::start_inner(String::new(), Some(status)).await
    }

    async fn start_inner(reply: String, fail_status: Option<StatusCode>) -> Self {
        let state = Arc::new(ServerState {
            reply,
            fail_status,
            generate_requests: AtomicUsize::new(0),
            last_authorization: Mutex::new(None),
        });

        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state.clone());

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
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of generation requests received (either API)
    pub fn generate_requests(&self) -> usize {
        self.state.generate_requests.load(Ordering::SeqCst)
    }

    /// Authorization header of the most recent chat request
    pub fn last_authorization(&self) -> Option<String> {
        self.state
            .last_authorization
            .lock()
            .ok()
            .and_then(|a| a.clone())
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2:latest".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 4_000_000_000,
        }],
    })
}

async fn handle_models() -> Json<serde_json::Value> {
    Json(serde_json::json!({"object": "list", "data": [{"id": "gpt-4o-mini"}]}))
}

/// Ollama generate endpoint
async fn handle_generate(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    state.generate_requests.fetch_add(1, Ordering::SeqCst);

    if let Some(status) = state.fail_status {
        return (status, "mock failure").into_response();
    }

    Json(GenerateResponse {
        model: request.model,
        response: state.reply.clone(),
        done: true,
    })
    .into_response()
}

/// OpenAI chat completions endpoint
async fn handle_chat(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    state.generate_requests.fetch_add(1, Ordering::SeqCst);

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Ok(mut last) = state.last_authorization.lock() {
        *last = auth;
    }

    if let Some(status) = state.fail_status {
        return (status, "mock failure").into_response();
    }

    Json(serde_json::json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": request.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": state.reply},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    model: String,
    #[allow(dead_code)]
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}
