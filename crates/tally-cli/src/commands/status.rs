//! Status command implementation

use std::path::Path;

use anyhow::Result;
use tally_core::ai::{AIBackend, AIClient};
use tally_core::config::{AiConfig, DB_KEY_ENV};

use super::{database_config, open_db};

pub async fn cmd_status(db_path: Option<&Path>, no_encrypt: bool) -> Result<()> {
    let config = database_config(db_path, no_encrypt)?;
    let path = Path::new(&config.path);

    println!();
    println!("📊 Tally Status");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Database: {}", path.display());

    if path.exists() {
        if let Ok(metadata) = std::fs::metadata(path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = config.passphrase.is_some();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                if let Ok((analyses, accounts)) = db.analysis_counts() {
                    println!();
                    println!("   Analyses: {}", analyses);
                    println!("   Accounts: {}", accounts);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {:#}", e);
                if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    match AiConfig::from_env().and_then(|c| AIClient::from_config(&c)) {
        Ok(client) => {
            if client.health_check().await {
                println!("   ✅ AI backend: {} ({})", client.host(), client.model());
            } else {
                println!(
                    "   ⚠️  AI backend not responding: {} ({})",
                    client.host(),
                    client.model()
                );
            }
        }
        Err(e) => println!("   ❌ AI backend: {}", e),
    }

    println!();
    Ok(())
}
