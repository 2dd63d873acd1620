//! Mock backend for testing
//!
//! Returns a canned reply (or a canned failure) and records every prompt it
//! receives. Useful for unit tests and development without a running LLM server.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::AIBackend;

/// Canonical reply returned when no custom reply is configured
pub const DEFAULT_MOCK_REPLY: &str = r#"{
  "income": {"total": 5000.0, "categories": [{"name": "Salary", "amount": 5000.0}]},
  "expenses": {"total": 1450.5, "categories": [
    {"name": "Rent/Mortgage", "amount": 1200.0},
    {"name": "Groceries", "amount": 250.5}
  ]},
  "summary": {
    "netFlow": 3549.5,
    "startDate": "2024-01-01",
    "endDate": "2024-01-31",
    "account": "...XXXX 1234",
    "balance": 4200.0
  }
}"#;

/// What the mock answers with
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Return this text verbatim
    Text(String),
    /// Fail with `Error::Upstream(msg)`
    Fail(String),
}

/// Mock AI backend for testing
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    reply: MockReply,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy, canonical reply)
    pub fn new() -> Self {
        Self::with_reply(DEFAULT_MOCK_REPLY)
    }

    /// Create a mock that answers with `reply`
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            healthy: true,
            reply: MockReply::Text(reply.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock whose calls fail as an upstream error
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            reply: MockReply::Fail(message.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    /// Prompts received so far (shared between clones)
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn categorize_statement(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::Fail(msg) => Err(Error::Upstream(msg.clone())),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
