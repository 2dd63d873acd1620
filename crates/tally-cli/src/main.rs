//! Tally CLI - Bank statement analyzer
//!
//! Usage:
//!   tally init                                   Initialize database
//!   tally analyze --file jan.pdf --account Main  Analyze and store a statement
//!   tally dashboard --account Main               Latest statement, deltas, series
//!   tally serve --port 3000                      Start web server

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tally_core::ai::AIClient;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let db_path = cli.db.as_deref();
    let taxonomy_path = cli.taxonomy.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(db_path, cli.no_encrypt),
        Commands::Analyze {
            file,
            account,
            json,
        } => {
            // Configuration problems surface before the document is read
            let ai = AIClient::from_env().context("Failed to configure AI backend")?;
            let prompts = commands::load_prompts(taxonomy_path)?;
            let db = commands::open_db(db_path, cli.no_encrypt)?;
            commands::cmd_analyze(db, ai, prompts, &file, &account, json)
                .await
                .map(|_| ())
        }
        Commands::History { account, json } => {
            let db = commands::open_db(db_path, cli.no_encrypt)?;
            commands::cmd_history(&db, account.as_deref(), json)
        }
        Commands::Dashboard { account, json } => {
            let db = commands::open_db(db_path, cli.no_encrypt)?;
            commands::cmd_dashboard(&db, account.as_deref(), json)
        }
        Commands::Accounts => {
            let db = commands::open_db(db_path, cli.no_encrypt)?;
            commands::cmd_accounts(&db)
        }
        Commands::Delete { id } => {
            let db = commands::open_db(db_path, cli.no_encrypt)?;
            commands::cmd_delete(&db, id)
        }
        Commands::Prompt { action } => match action {
            PromptAction::Show => {
                commands::cmd_prompt_show(&commands::load_prompts(taxonomy_path)?)
            }
            PromptAction::Render { file } => {
                commands::cmd_prompt_render(&commands::load_prompts(taxonomy_path)?, &file)
            }
            PromptAction::Path => commands::cmd_prompt_path(),
        },
        Commands::Status => commands::cmd_status(db_path, cli.no_encrypt).await,
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                db_path,
                taxonomy_path,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
    }
}
