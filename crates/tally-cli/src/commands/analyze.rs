//! Statement analysis command

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tally_core::ai::{AIBackend, AIClient};
use tally_core::db::Database;
use tally_core::models::AnalysisResult;
use tally_core::pipeline::AnalysisPipeline;
use tally_core::prompts::PromptBuilder;

use super::format_money;

pub async fn cmd_analyze(
    db: Database,
    ai: AIClient,
    prompts: PromptBuilder,
    file: &Path,
    account: &str,
    json: bool,
) -> Result<i64> {
    let document =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    if !json {
        println!("🔍 Analyzing {} ({} via {})...", file_name, ai.model(), ai.host());
    }

    let db = Arc::new(db);
    let pipeline = AnalysisPipeline::new(db.clone(), Arc::new(ai), prompts);
    let outcome = pipeline.analyze(&file_name, account, document).await?;

    db.log_audit(
        "cli",
        "analyze",
        Some("analysis"),
        Some(outcome.id),
        Some(&format!("file={}, account={}", file_name, account.trim())),
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.analysis)?);
        return Ok(outcome.id);
    }

    print_analysis(&outcome.analysis);

    if !outcome.warnings.is_empty() {
        println!();
        println!("⚠️  Consistency warnings:");
        for warning in &outcome.warnings {
            println!("   - {}", warning);
        }
    }

    println!();
    println!("✅ Stored as analysis #{}", outcome.id);
    Ok(outcome.id)
}

/// Print one analysis as a two-column summary
pub fn print_analysis(analysis: &AnalysisResult) {
    let summary = &analysis.summary;

    println!();
    println!("📄 Statement {} to {}", summary.start_date, summary.end_date);
    println!("   Account: {}", summary.account);
    println!("   Balance: {}", format_money(summary.balance));
    println!("   Net flow: {}", format_money(summary.net_flow));

    for (title, group) in [("Income", &analysis.income), ("Expenses", &analysis.expenses)] {
        println!();
        println!("   {} ({})", title, format_money(group.total));
        println!("   ─────────────────────────────");
        for category in group.categories.iter().filter(|c| c.amount != 0.0) {
            println!("   {:<24} {:>14}", category.name, format_money(category.amount));
        }
    }
}
