//! Categorization prompt builder
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/tally/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Statement text is truncated to the first [`MAX_STATEMENT_CHARS`] characters
//! before it is placed in the prompt. The cut is by Unicode scalar value, never
//! in the middle of a character, so the same document always yields the same
//! prompt.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::taxonomy::Taxonomy;

/// Maximum number of statement characters sent to the AI capability
pub const MAX_STATEMENT_CHARS: usize = 30_000;

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const CATEGORIZE_STATEMENT: &str =
        include_str!("../../../prompts/categorize_statement.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    CategorizeStatement,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CategorizeStatement => "categorize_statement",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[Self::CategorizeStatement]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::CategorizeStatement => defaults::CATEGORIZE_STATEMENT,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render system and user sections as one instruction string
    ///
    /// Variables are substituted in slice order, so user-supplied text placed
    /// last can never be re-expanded by a later substitution.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let body = match (self.system_section(), self.user_section()) {
            (Some(system), Some(user)) => format!("{}\n\n{}", system, user),
            (None, Some(user)) => user.to_string(),
            _ => self.content.clone(),
        };

        vars.iter().fold(body, |acc, (key, value)| {
            acc.replace(&format!("{{{{{}}}}}", key), value)
        })
    }
}

/// Loads prompts from the override directory or the embedded defaults
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self { override_dir: None }
    }

    /// Load a prompt (checking override first, then default)
    pub fn get(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::InvalidData(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("prompts").join("overrides"))
}

/// Builds categorization prompts from a template and a taxonomy
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: Prompt,
    taxonomy: Taxonomy,
}

impl PromptBuilder {
    pub fn new(template: Prompt, taxonomy: Taxonomy) -> Self {
        Self { template, taxonomy }
    }

    /// Builder over the embedded template
    pub fn embedded(taxonomy: Taxonomy) -> Result<Self> {
        let template = PromptLibrary::embedded_only().get(PromptId::CategorizeStatement)?;
        Ok(Self::new(template, taxonomy))
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn template(&self) -> &Prompt {
        &self.template
    }

    /// Render the prompt for one statement
    pub fn build(&self, statement_text: &str) -> String {
        let income = quote_list(&self.taxonomy.income);
        let expenses = quote_list(&self.taxonomy.expenses);
        let text = truncate_statement(statement_text);

        self.template.render(&[
            ("income_categories", &income),
            ("expense_categories", &expenses),
            ("income_fallback", &self.taxonomy.income_fallback),
            ("balance_label", &self.taxonomy.balance_label),
            ("statement_text", text),
        ])
    }
}

/// Build a prompt with the embedded template
pub fn build_prompt(statement_text: &str, taxonomy: &Taxonomy) -> Result<String> {
    Ok(PromptBuilder::embedded(taxonomy.clone())?.build(statement_text))
}

/// Prefix of at most [`MAX_STATEMENT_CHARS`] characters
pub fn truncate_statement(text: &str) -> &str {
    match text.char_indices().nth(MAX_STATEMENT_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn quote_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("\"{}\"", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Find the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}
