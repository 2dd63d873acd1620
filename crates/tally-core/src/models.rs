//! Domain models for Tally
//!
//! `AnalysisResult` is the canonical wire and storage shape. Everything the AI
//! capability returns is normalized into it before it leaves the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for strings the statement does not determine
pub const NOT_AVAILABLE: &str = "N/A";

/// Absolute tolerance for the soft consistency checks
pub const TOTAL_TOLERANCE: f64 = 0.01;

/// A named bucket of same-type transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub name: String,
    pub amount: f64,
}

impl CategoryAmount {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// Income or expense side of a statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoneyGroup {
    pub total: f64,
    #[serde(default)]
    pub categories: Vec<CategoryAmount>,
}

impl MoneyGroup {
    /// Sum of the category amounts (the stored `total` is never replaced by this)
    pub fn category_sum(&self) -> f64 {
        self.categories.iter().map(|c| c.amount).sum()
    }

    /// Whether `total` agrees with the category sum
    pub fn is_consistent(&self) -> bool {
        (self.total - self.category_sum()).abs() <= TOTAL_TOLERANCE
    }

    pub fn amount_for(&self, name: &str) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.amount)
    }
}

/// Period, balance and net flow of a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementSummary {
    pub net_flow: f64,
    /// `YYYY-MM-DD` or `N/A`
    pub start_date: String,
    /// `YYYY-MM-DD` or `N/A`
    pub end_date: String,
    pub account: String,
    #[serde(default)]
    pub balance: f64,
}

impl Default for StatementSummary {
    fn default() -> Self {
        Self {
            net_flow: 0.0,
            start_date: NOT_AVAILABLE.to_string(),
            end_date: NOT_AVAILABLE.to_string(),
            account: NOT_AVAILABLE.to_string(),
            balance: 0.0,
        }
    }
}

/// Structured summary of one statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub income: MoneyGroup,
    pub expenses: MoneyGroup,
    pub summary: StatementSummary,
}

impl AnalysisResult {
    /// Net flow implied by the two totals
    pub fn implied_net_flow(&self) -> f64 {
        self.income.total - self.expenses.total
    }
}

/// A persisted analysis with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub file_name: String,
    pub account_name: String,
    pub balance: f64,
    pub analysis: AnalysisResult,
}

/// Insert payload for the analysis store
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    pub file_name: String,
    pub account_name: String,
    pub balance: f64,
    pub analysis: AnalysisResult,
}

impl NewAnalysis {
    pub fn new(file_name: &str, account_name: &str, analysis: AnalysisResult) -> Self {
        Self {
            file_name: file_name.to_string(),
            account_name: account_name.to_string(),
            balance: analysis.summary.balance,
            analysis,
        }
    }
}

/// Which side of the statement a warning refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Income,
    Expenses,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expenses => "expenses",
        }
    }
}

/// Soft consistency findings produced during normalization
///
/// These never fail a request; they are logged and returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// `total` differs from the sum of its categories
    TotalMismatch {
        side: Side,
        total: f64,
        category_sum: f64,
    },
    /// `netFlow` differs from income total minus expense total
    NetFlowMismatch { net_flow: f64, implied: f64 },
    /// A negative category amount was flipped to its absolute value
    NegativeAmount { side: Side, name: String, amount: f64 },
    /// A category without a name was dropped
    UnnamedCategory { side: Side, amount: f64 },
    /// A date that could not be read was replaced by `N/A`
    UnparsedDate { field: String, value: String },
}

impl std::fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalMismatch {
                side,
                total,
                category_sum,
            } => write!(
                f,
                "{} total {:.2} does not match category sum {:.2}",
                side.as_str(),
                total,
                category_sum
            ),
            Self::NetFlowMismatch { net_flow, implied } => write!(
                f,
                "net flow {:.2} does not match income - expenses {:.2}",
                net_flow, implied
            ),
            Self::NegativeAmount { side, name, amount } => write!(
                f,
                "negative {} amount {:.2} for '{}' stored as absolute value",
                side.as_str(),
                amount,
                name
            ),
            Self::UnnamedCategory { side, amount } => write!(
                f,
                "dropped unnamed {} category with amount {:.2}",
                side.as_str(),
                amount
            ),
            Self::UnparsedDate { field, value } => {
                write!(f, "could not read {} '{}'", field, value)
            }
        }
    }
}
