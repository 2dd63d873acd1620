//! Tally Core Library
//!
//! Shared functionality for the Tally bank statement analyzer:
//! - Document text extraction (PDF and plain text)
//! - Categorization prompt builder over a configurable taxonomy
//! - Pluggable AI backends (Ollama, OpenAI-compatible, mock)
//! - Response normalizer producing the canonical `AnalysisResult`
//! - Encrypted SQLite analysis store with an audit log
//! - History aggregation for the dashboard (series, deltas, accounts)

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod history;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod taxonomy;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, OllamaBackend, OpenAICompatibleBackend};
pub use config::{AiBackendKind, AiConfig, AppConfig, DatabaseConfig};
pub use db::{AnalysisStore, AuditEntry, Database};
pub use error::{Error, ErrorCategory, ExtractionError, Result};
pub use extract::{DocumentExtractor, DocumentKind, TextExtractor};
pub use history::{AccountOption, Dashboard, MetricDeltas, SeriesPoint};
pub use models::{
    AnalysisResult, AnalysisWarning, CategoryAmount, MoneyGroup, NewAnalysis, StatementSummary,
    StoredAnalysis,
};
pub use normalize::{Normalized, Normalizer, RawReply};
pub use pipeline::{AnalysisOutcome, AnalysisPipeline};
pub use prompts::{Prompt, PromptBuilder, PromptId, PromptLibrary};
pub use taxonomy::Taxonomy;
