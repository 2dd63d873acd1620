//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Turn bank statements into a categorized financial summary
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted bank statement analyzer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to TALLY_DB_PATH, then tally.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Category taxonomy file (TOML); defaults to the data-dir override or the built-in list
    #[arg(long, global = true)]
    pub taxonomy: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Analyze a statement (PDF or text) and store the result
    Analyze {
        /// Statement file to analyze
        #[arg(short, long)]
        file: PathBuf,

        /// Account label the analysis is filed under
        #[arg(short, long)]
        account: String,

        /// Print the stored analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored analyses, newest first
    History {
        /// Only show this account
        #[arg(short, long)]
        account: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the dashboard: latest statement, deltas and per-period series
    Dashboard {
        /// Account to show (all accounts if omitted)
        #[arg(short, long)]
        account: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List account labels with stored analyses
    Accounts,

    /// Delete a stored analysis
    Delete {
        /// Analysis ID
        id: i64,
    },

    /// Inspect the categorization prompt
    Prompt {
        #[command(subcommand)]
        action: PromptAction,
    },

    /// Show database and AI backend status
    Status,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires an API key (TALLY_API_KEYS) or a
        /// request from a trusted network (TALLY_TRUSTED_NETWORKS).
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PromptAction {
    /// Show the prompt template and where it was loaded from
    Show,

    /// Render the full prompt for a statement without calling the AI backend
    Render {
        /// Statement file (PDF or text)
        file: PathBuf,
    },

    /// Print the prompt override directory
    Path,
}
