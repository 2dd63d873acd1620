//! History command implementations (history, dashboard, accounts, delete)

use anyhow::Result;
use tally_core::db::{AnalysisStore, Database};
use tally_core::history::{account_options, Dashboard};

use super::{format_delta, format_money, truncate};

pub fn cmd_history(db: &Database, account: Option<&str>, json: bool) -> Result<()> {
    let account = account.map(str::trim).filter(|a| !a.is_empty());
    let records = db.list_analyses(account)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No analyses stored yet. Run 'tally analyze --file <statement> --account <name>'.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<16}  {:<24}  {:<10}  {:>14}  {:>14}",
        "ID", "ACCOUNT", "FILE", "END DATE", "NET FLOW", "BALANCE"
    );
    println!("{}", "-".repeat(92));

    for r in &records {
        println!(
            "{:>5}  {:<16}  {:<24}  {:<10}  {:>14}  {:>14}",
            r.id,
            truncate(&r.account_name, 16),
            truncate(&r.file_name, 24),
            r.analysis.summary.end_date,
            format_money(r.analysis.summary.net_flow),
            format_money(r.balance),
        );
    }

    Ok(())
}

pub fn cmd_dashboard(db: &Database, account: Option<&str>, json: bool) -> Result<()> {
    let records = db.list_analyses(None)?;
    let dashboard = Dashboard::build(&records, account);

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
        return Ok(());
    }

    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│           💰 Tally Dashboard            │");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Account: {}", dashboard.selected.label);

    let Some(latest) = &dashboard.latest else {
        println!();
        println!("  No analyses stored for this selection.");
        return Ok(());
    };

    let summary = &latest.analysis.summary;
    let deltas = &dashboard.deltas;
    println!(
        "  Latest:  {} ({} to {})",
        latest.file_name, summary.start_date, summary.end_date
    );
    println!();
    println!(
        "  Income:    {:>14}  {:>8}",
        format_money(latest.analysis.income.total),
        format_delta(deltas.income)
    );
    println!(
        "  Expenses:  {:>14}  {:>8}",
        format_money(latest.analysis.expenses.total),
        format_delta(deltas.expenses)
    );
    println!(
        "  Net flow:  {:>14}  {:>8}",
        format_money(summary.net_flow),
        format_delta(deltas.net_flow)
    );
    println!(
        "  Balance:   {:>14}  {:>8}",
        format_money(latest.balance),
        format_delta(deltas.balance)
    );

    if dashboard.previous.is_none() {
        println!();
        println!("  (No earlier statement to compare against)");
    }

    if !dashboard.series.is_empty() {
        println!();
        println!(
            "  {:<10}  {:>14}  {:>14}  {:>14}",
            "PERIOD", "INCOME", "EXPENSES", "NET FLOW"
        );
        for point in &dashboard.series {
            println!(
                "  {:<10}  {:>14}  {:>14}  {:>14}",
                point.period,
                format_money(point.income),
                format_money(point.expenses),
                format_money(point.net_flow)
            );
        }
    }

    println!();
    Ok(())
}

pub fn cmd_accounts(db: &Database) -> Result<()> {
    let options = account_options(&db.list_analyses(None)?);

    for option in &options {
        if option.is_all() {
            println!("{} (default)", option.label);
        } else {
            println!("  {}", option.label);
        }
    }

    Ok(())
}

pub fn cmd_delete(db: &Database, id: i64) -> Result<()> {
    let deleted = db.delete_analysis(id)?;
    db.log_audit("cli", "delete", Some("analysis"), Some(id), None)?;

    if deleted {
        println!("🗑️  Deleted analysis #{}", id);
    } else {
        println!("Analysis #{} not found (nothing to delete)", id);
    }
    Ok(())
}
