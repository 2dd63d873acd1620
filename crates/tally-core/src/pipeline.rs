//! Statement analysis pipeline
//!
//! Analyze: extractor -> prompt builder -> AI backend -> normalizer -> store.
//! History: store -> history aggregator. Every stage aborts on first failure
//! and a record is written only after normalization succeeds.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::ai::AIBackend;
use crate::db::AnalysisStore;
use crate::error::{Error, Result};
use crate::extract::{DocumentExtractor, TextExtractor};
use crate::history::{account_options, AccountOption, Dashboard};
use crate::models::{AnalysisResult, AnalysisWarning, NewAnalysis, StoredAnalysis};
use crate::normalize::Normalizer;
use crate::prompts::PromptBuilder;
use crate::taxonomy::Taxonomy;

/// Result of one successful analyze call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub id: i64,
    pub analysis: AnalysisResult,
    pub warnings: Vec<AnalysisWarning>,
}

/// Stateless analysis service; cheap to clone and share across requests
#[derive(Clone)]
pub struct AnalysisPipeline {
    store: Arc<dyn AnalysisStore>,
    ai: Arc<dyn AIBackend>,
    extractor: Arc<dyn TextExtractor>,
    prompts: PromptBuilder,
    normalizer: Normalizer,
}

impl AnalysisPipeline {
    /// Pipeline with the default extractor and an explicit prompt builder
    ///
    /// The normalizer completes categories from the builder's taxonomy.
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        ai: Arc<dyn AIBackend>,
        prompts: PromptBuilder,
    ) -> Self {
        let normalizer = Normalizer::with_taxonomy(prompts.taxonomy().clone());
        Self {
            store,
            ai,
            extractor: Arc::new(DocumentExtractor),
            prompts,
            normalizer,
        }
    }

    /// Pipeline over the embedded prompt template
    pub fn with_taxonomy(
        store: Arc<dyn AnalysisStore>,
        ai: Arc<dyn AIBackend>,
        taxonomy: Taxonomy,
    ) -> Result<Self> {
        Ok(Self::new(store, ai, PromptBuilder::embedded(taxonomy)?))
    }

    /// Replace the text extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn ai(&self) -> &dyn AIBackend {
        self.ai.as_ref()
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// Analyze one statement and store the normalized result
    pub async fn analyze(
        &self,
        file_name: &str,
        account_name: &str,
        document: Vec<u8>,
    ) -> Result<AnalysisOutcome> {
        if document.is_empty() {
            return Err(Error::Input("No file uploaded".into()));
        }
        let account_name = account_name.trim();
        if account_name.is_empty() {
            return Err(Error::Input("Account name is required".into()));
        }

        info!(file_name, account = account_name, bytes = document.len(), "Analyzing statement");

        let text = self.extract(document).await?;
        info!(file_name, chars = text.chars().count(), "Extracted statement text");

        let prompt = self.prompts.build(&text);
        let reply = self.ai.categorize_statement(&prompt).await?;
        debug!(model = self.ai.model(), reply = %reply, "AI reply");

        let normalized = self.normalizer.normalize(&reply)?;

        let new = NewAnalysis::new(file_name, account_name, normalized.analysis.clone());
        let id = self.store.insert_analysis(&new)?;

        info!(
            id,
            file_name,
            account = account_name,
            income = normalized.analysis.income.total,
            expenses = normalized.analysis.expenses.total,
            warnings = normalized.warnings.len(),
            "Analysis stored"
        );

        Ok(AnalysisOutcome {
            id,
            analysis: normalized.analysis,
            warnings: normalized.warnings,
        })
    }

    /// Stored analyses newest first, optionally for one account
    pub fn history(&self, account: Option<&str>) -> Result<Vec<StoredAnalysis>> {
        let account = account.map(str::trim).filter(|a| !a.is_empty());
        self.store.list_analyses(account)
    }

    /// Dashboard view for an account selection
    pub fn dashboard(&self, account: Option<&str>) -> Result<Dashboard> {
        let records = self.store.list_analyses(None)?;
        Ok(Dashboard::build(&records, account))
    }

    /// Accounts with stored analyses, all-accounts entry first
    pub fn accounts(&self) -> Result<Vec<AccountOption>> {
        Ok(account_options(&self.store.list_analyses(None)?))
    }

    /// Delete a record; unknown ids are acknowledged like known ones
    pub fn delete(&self, id: i64) -> Result<()> {
        let deleted = self.store.delete_analysis(id)?;
        info!(id, deleted, "Delete requested");
        Ok(())
    }

    async fn extract(&self, document: Vec<u8>) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract_text(&document))
            .await
            .map_err(|e| Error::InvalidData(format!("Text extraction task failed: {}", e)))?
    }
}
