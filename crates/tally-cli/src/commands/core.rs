//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_prompts` - Prompt builder over the configured taxonomy
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::config::DatabaseConfig;
use tally_core::db::Database;
use tally_core::prompts::{PromptBuilder, PromptId, PromptLibrary};
use tally_core::taxonomy::Taxonomy;
use tracing::debug;

/// Database settings from the environment, with `--db` taking precedence
pub fn database_config(db_path: Option<&Path>, no_encrypt: bool) -> Result<DatabaseConfig> {
    let mut config = DatabaseConfig::from_env(!no_encrypt);
    if let Some(path) = db_path {
        config.path = path
            .to_str()
            .context("Database path must be valid UTF-8")?
            .to_string();
    }
    Ok(config)
}

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: Option<&Path>, no_encrypt: bool) -> Result<Database> {
    let config = database_config(db_path, no_encrypt)?;
    debug!(path = %config.path, encrypted = !no_encrypt, "Opening database");
    Database::open(&config).with_context(|| format!("Failed to open database at {}", config.path))
}

/// Load the taxonomy and the categorization prompt (honoring overrides)
pub fn load_prompts(taxonomy_path: Option<&Path>) -> Result<PromptBuilder> {
    let taxonomy = Taxonomy::load(taxonomy_path).context("Failed to load category taxonomy")?;
    let template = PromptLibrary::new()
        .get(PromptId::CategorizeStatement)
        .context("Failed to load categorization prompt")?;
    Ok(PromptBuilder::new(template, taxonomy))
}

pub fn cmd_init(db_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    println!("🔧 Initialized database at {}", db.path());

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    db.log_audit("cli", "init", Some("database"), None, None)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Analyze a statement: tally analyze --file statement.pdf --account Checking");
    println!("  2. Start web UI: tally serve");

    Ok(())
}
