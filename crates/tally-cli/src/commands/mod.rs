//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init command and shared utilities (open_db, load_prompts)
//! - `analyze` - Statement analysis
//! - `history` - History, dashboard, accounts and delete commands
//! - `prompts` - Categorization prompt inspection
//! - `serve` - Web server command
//! - `status` - Database and AI backend status

pub mod analyze;
pub mod core;
pub mod history;
pub mod prompts;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use analyze::*;
pub use core::*;
pub use history::*;
pub use prompts::*;
pub use serve::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount with thousands separators and two decimals
pub fn format_money(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = format!("{:.2}", amount.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((&cents, "00"));

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}${}.{}", sign, grouped, frac)
}

/// Format a percentage delta, or "n/a" when undefined
pub fn format_delta(delta: Option<f64>) -> String {
    match delta {
        Some(d) => format!("{:+.1}%", d),
        None => "n/a".to_string(),
    }
}
