//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::ai::AIClient;
use tally_core::config::AppConfig;
use tally_core::db::Database;
use tally_server::{AppState, ServerConfig, API_KEYS_ENV, TRUSTED_NETWORKS_ENV, TRUSTED_PROXIES_ENV};

use super::{database_config, load_prompts};

pub async fn cmd_serve(
    db_path: Option<&Path>,
    taxonomy_path: Option<&Path>,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
) -> Result<()> {
    // Validate all configuration before binding or calling out
    let config = AppConfig {
        database: database_config(db_path, no_encrypt)?,
        ..AppConfig::from_env(!no_encrypt).context("Invalid configuration")?
    };
    config.validate().context("Invalid configuration")?;

    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", config.database.path);
    println!("   AI backend: {} ({})", config.ai.backend, config.ai.model);
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let server_config = ServerConfig::from_env(!no_auth);

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        if server_config.api_keys.is_empty() && server_config.trusted_networks.is_empty() {
            println!(
                "   ⚠️  No {} or {} configured: every request will be rejected",
                API_KEYS_ENV, TRUSTED_NETWORKS_ENV
            );
        }
        if !server_config.api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured ({})",
                server_config.api_keys.len(),
                API_KEYS_ENV
            );
        }
        for (label, env, nets) in [
            ("🏠 Trusted networks", TRUSTED_NETWORKS_ENV, &server_config.trusted_networks),
            ("🔀 Trusted proxies", TRUSTED_PROXIES_ENV, &server_config.trusted_proxies),
        ] {
            if !nets.is_empty() {
                println!(
                    "   {}: {} ({})",
                    label,
                    nets.iter()
                        .map(|n| n.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                    env
                );
            }
        }
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = Database::open(&config.database).context("Failed to open database")?;
    let ai = AIClient::from_config(&config.ai).context("Failed to configure AI backend")?;
    let prompts = load_prompts(taxonomy_path)?;

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;

    let state = AppState::new(db, ai, prompts, server_config);
    tally_server::serve(state, host, port, static_dir_str).await?;

    Ok(())
}
