//! Pluggable AI backend abstraction
//!
//! This module provides a backend-agnostic interface for the one AI operation
//! the pipeline needs: turning a categorization prompt into a raw text reply.
//! Interpreting that reply is the normalizer's job, never the backend's.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all AI backends
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let config = AiConfig::from_env()?;
//! let ai = AIClient::from_config(&config)?;
//! let raw = ai.categorize_statement(&prompt).await?;
//! ```

mod mock;
mod ollama;
mod openai_compatible;

pub use mock::{MockBackend, MockReply, DEFAULT_MOCK_REPLY};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::{AiBackendKind, AiConfig};
use crate::error::{Error, Result};

/// Trait defining the interface for all AI backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Send a categorization prompt and return the raw reply text
    ///
    /// Transport failures and non-success statuses are `Error::Upstream`;
    /// an empty reply is a malformed response.
    async fn categorize_statement(&self, prompt: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (OpenAI, vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from validated configuration
    ///
    /// Missing endpoints or credentials are reported here as
    /// `Error::Configuration`, before any request is made.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        config.validate()?;

        let http_client = build_http_client(config.timeout)?;
        let host = config.host.as_deref().unwrap_or_default();

        let client = match config.backend {
            AiBackendKind::Ollama => {
                AIClient::Ollama(OllamaBackend::with_client(http_client, host, &config.model))
            }
            AiBackendKind::OpenAICompatible => {
                AIClient::OpenAICompatible(OpenAICompatibleBackend::with_client(
                    http_client,
                    host,
                    &config.model,
                    config.api_key.as_deref(),
                ))
            }
            AiBackendKind::Mock => AIClient::Mock(MockBackend::new()),
        };

        tracing::debug!(
            backend = %config.backend,
            model = client.model(),
            host = client.host(),
            "AI client configured"
        );

        Ok(client)
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(&AiConfig::from_env()?)
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }
}

fn build_http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| Error::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Map a transport failure to an upstream error naming the host
pub(crate) fn unreachable(host: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Upstream(format!("AI backend at {} timed out: {}", host, err))
    } else {
        Error::Upstream(format!("AI backend at {} is unreachable: {}", host, err))
    }
}

/// Map a non-success HTTP reply to an upstream error
pub(crate) async fn rejected(host: &str, response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Error::Upstream(format!(
        "AI backend at {} returned {}: {}",
        host,
        status,
        body.trim()
    ))
}

/// Reject empty replies before they reach the normalizer
pub(crate) fn non_empty(reply: String) -> Result<String> {
    if reply.trim().is_empty() {
        return Err(Error::malformed("AI backend returned an empty reply"));
    }
    Ok(reply)
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn categorize_statement(&self, prompt: &str) -> Result<String> {
        match self {
            AIClient::Ollama(b) => b.categorize_statement(prompt).await,
            AIClient::OpenAICompatible(b) => b.categorize_statement(prompt).await,
            AIClient::Mock(b) => b.categorize_statement(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}
