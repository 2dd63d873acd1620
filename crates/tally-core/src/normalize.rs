//! AI reply normalization
//!
//! Turns the noisy text an AI backend returns into a canonical
//! [`AnalysisResult`], or fails with an explicit [`ExtractionError`].
//!
//! Steps:
//! 1. Strip code fences and any prose outside the outermost `{ ... }`
//! 2. Parse as JSON; the top level must be an object
//! 3. Detect the reply shape ([`RawReply`])
//! 4. Read the summary with one pass over [`SUMMARY_FIELDS`]
//! 5. Clean categories (negative amounts, unnamed entries)
//! 6. Complete the category lists from the taxonomy, if one is configured
//! 7. Collect soft consistency warnings
//!
//! Totals reported by the AI are kept as-is. A total that disagrees with its
//! categories is a warning, never an error.

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{
    AnalysisResult, AnalysisWarning, CategoryAmount, MoneyGroup, Side, StatementSummary,
    NOT_AVAILABLE, TOTAL_TOLERANCE,
};
use crate::taxonomy::Taxonomy;

/// Keys (compared case- and separator-insensitively) for the flat income map
const INCOME_SUMMARY_KEYS: &[&str] = &["incomesummary", "incomessummary"];
/// Keys for the flat expense map
const EXPENSE_SUMMARY_KEYS: &[&str] = &["expensesummary", "expensessummary"];
/// Distinguished total entries inside a flat map
const FLAT_TOTAL_KEYS: &[&str] = &["total", "totalincome", "totalexpenses", "totalexpense"];
/// Nested objects that may hold the statement dates
const PERIOD_KEYS: &[&str] = &["statementperiod", "period"];

/// How a summary field is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Number; numeric strings are accepted; default 0
    Amount,
    /// Date reformatted to `YYYY-MM-DD`; default `N/A`
    Date,
    /// Free text; default `N/A`
    Text,
}

/// One summary field and the keys it may appear under
#[derive(Debug, Clone, Copy)]
pub struct SummaryField {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
}

/// Summary schema: canonical name, accepted aliases, kind
pub const SUMMARY_FIELDS: &[SummaryField] = &[
    SummaryField {
        name: "netFlow",
        aliases: &["netflow", "netchange", "net"],
        kind: FieldKind::Amount,
    },
    SummaryField {
        name: "startDate",
        aliases: &["startdate", "periodstart", "start", "from"],
        kind: FieldKind::Date,
    },
    SummaryField {
        name: "endDate",
        aliases: &["enddate", "periodend", "end", "to"],
        kind: FieldKind::Date,
    },
    SummaryField {
        name: "account",
        aliases: &["account", "accountnumber", "accountname", "accountno"],
        kind: FieldKind::Text,
    },
    SummaryField {
        name: "balance",
        aliases: &["balance", "closingbalance", "endingbalance", "finalbalance"],
        kind: FieldKind::Amount,
    },
];

/// Date formats tried in order; US month-first before day-first
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%d-%m-%Y", "%B %d, %Y", "%b %d, %Y",
    "%d %B %Y", "%d %b %Y", "%b %d %Y",
];

/// A parsed reply, classified by shape
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    /// `income` / `expenses` objects with `total` and `categories`
    Canonical(Map<String, Value>),
    /// `income_summary` / `expense_summary` maps of category -> amount
    FlatSummary(Map<String, Value>),
}

impl RawReply {
    /// Parse reply text and classify it
    pub fn parse(raw: &str) -> Result<Self> {
        let cleaned = strip_code_fences(raw);
        let json = extract_json_object(&cleaned).ok_or_else(|| {
            Error::malformed(format!("no JSON object in reply: {}", preview(raw)))
        })?;

        let value: Value = serde_json::from_str(json)
            .map_err(|e| Error::malformed(format!("{} | Raw: {}", e, preview(json))))?;

        match value {
            Value::Object(map) => Ok(Self::detect(map)),
            other => Err(Error::malformed(format!(
                "top level is {} instead of an object",
                json_type(&other)
            ))),
        }
    }

    /// Classify an object by the keys it carries
    pub fn detect(map: Map<String, Value>) -> Self {
        let has_canonical = ["income", "expenses"]
            .into_iter()
            .any(|k| matches!(lookup(&map, &[k]), Some(Value::Object(_))));
        let has_flat = lookup(&map, INCOME_SUMMARY_KEYS).is_some()
            || lookup(&map, EXPENSE_SUMMARY_KEYS).is_some();

        if !has_canonical && has_flat {
            Self::FlatSummary(map)
        } else {
            Self::Canonical(map)
        }
    }

    fn object(&self) -> &Map<String, Value> {
        match self {
            Self::Canonical(map) | Self::FlatSummary(map) => map,
        }
    }
}

/// A normalized analysis plus the soft warnings found on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub analysis: AnalysisResult,
    pub warnings: Vec<AnalysisWarning>,
}

/// Reply normalizer, optionally completing categories from a taxonomy
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    taxonomy: Option<Taxonomy>,
}

impl Normalizer {
    /// Normalizer that passes the reply's categories through as-is
    pub fn new() -> Self {
        Self { taxonomy: None }
    }

    /// Normalizer that appends every missing taxonomy category with amount 0
    pub fn with_taxonomy(taxonomy: Taxonomy) -> Self {
        Self {
            taxonomy: Some(taxonomy),
        }
    }

    pub fn normalize(&self, raw: &str) -> Result<Normalized> {
        let reply = RawReply::parse(raw)?;
        let mut warnings = Vec::new();

        let (income, expenses) = match &reply {
            RawReply::Canonical(map) => (
                lookup(map, &["income"]).map(canonical_group),
                lookup(map, &["expenses", "expense"]).map(canonical_group),
            ),
            RawReply::FlatSummary(map) => (
                lookup(map, INCOME_SUMMARY_KEYS).map(flat_group),
                lookup(map, EXPENSE_SUMMARY_KEYS).map(flat_group),
            ),
        };

        let mut income =
            income.ok_or_else(|| Error::invalid_structure("reply has no income section"))?;
        let mut expenses =
            expenses.ok_or_else(|| Error::invalid_structure("reply has no expenses section"))?;
        // The flat shape carries its summary fields at the top level, if at all
        let summary = match (&reply, read_summary(reply.object(), &mut warnings)) {
            (_, Some(summary)) => summary,
            (RawReply::FlatSummary(_), None) => StatementSummary::default(),
            (RawReply::Canonical(_), None) => {
                return Err(Error::invalid_structure("reply has no summary section"))
            }
        };

        clean_group(&mut income, Side::Income, &mut warnings);
        clean_group(&mut expenses, Side::Expenses, &mut warnings);

        if let Some(ref taxonomy) = self.taxonomy {
            complete_categories(&mut income, &taxonomy.income);
            complete_categories(&mut expenses, &taxonomy.expenses);
        }

        let analysis = AnalysisResult {
            income,
            expenses,
            summary,
        };
        consistency_warnings(&analysis, &mut warnings);

        for w in &warnings {
            warn!(warning = %w, "Analysis normalized with warning");
        }
        debug!(
            income = analysis.income.total,
            expenses = analysis.expenses.total,
            warnings = warnings.len(),
            "Normalized AI reply"
        );

        Ok(Normalized { analysis, warnings })
    }
}

/// Normalize without taxonomy completion
pub fn normalize(raw: &str) -> Result<Normalized> {
    Normalizer::new().normalize(raw)
}

/// Slice from the first `{` to the last `}`
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if start >= end {
        return None;
    }
    Some(raw[start..=end].trim())
}

/// Remove Markdown code fence markers (```json, ```)
pub fn strip_code_fences(raw: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("valid regex"));
    re.replace_all(raw, "").trim().to_string()
}

/// Parse a JSON value as an amount
///
/// Accepts numbers and numeric strings with currency symbols, thousands
/// separators, a trailing or leading minus, or accounting parentheses.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_amount_str(s)?,
        _ => return None,
    };
    amount.is_finite().then_some(amount)
}

fn parse_amount_str(s: &str) -> Option<f64> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    let (negative, cleaned) = match cleaned.strip_suffix('-') {
        Some(rest) => (!negative, rest.to_string()),
        None => (negative, cleaned),
    };
    if cleaned.is_empty() || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let amount: f64 = cleaned.parse().ok()?;
    Some(if negative { -amount } else { amount })
}

/// Reformat a date string to `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Option<String> {
    let s = s.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    // Timestamps: keep the date part
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        let head = s.get(..19).unwrap_or(s);
        if let Ok(dt) = NaiveDateTime::parse_from_str(head, fmt) {
            return Some(dt.date().format("%Y-%m-%d").to_string());
        }
    }
    None
}

fn canonical_group(value: &Value) -> MoneyGroup {
    let Value::Object(group) = value else {
        // A bare number is a total without categories
        return MoneyGroup {
            total: parse_amount(value).unwrap_or(0.0),
            categories: Vec::new(),
        };
    };

    let total = lookup(group, &["total", "amount"])
        .and_then(parse_amount)
        .unwrap_or(0.0);

    let categories = match lookup(group, &["categories"]) {
        Some(Value::Array(items)) => items.iter().filter_map(category_from_item).collect(),
        Some(Value::Object(map)) => category_entries(map, &[]),
        _ => Vec::new(),
    };

    MoneyGroup { total, categories }
}

fn category_from_item(item: &Value) -> Option<CategoryAmount> {
    let Value::Object(obj) = item else {
        return None;
    };
    let name = match lookup(obj, &["name", "category"]) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let amount = lookup(obj, &["amount", "total", "value"])
        .and_then(parse_amount)
        .unwrap_or(0.0);
    Some(CategoryAmount { name, amount })
}

fn flat_group(value: &Value) -> MoneyGroup {
    let Value::Object(map) = value else {
        return MoneyGroup {
            total: parse_amount(value).unwrap_or(0.0),
            categories: Vec::new(),
        };
    };

    let total = map
        .iter()
        .find(|(k, _)| FLAT_TOTAL_KEYS.contains(&key_token(k).as_str()))
        .and_then(|(_, v)| parse_amount(v))
        .unwrap_or(0.0);

    MoneyGroup {
        total,
        categories: category_entries(map, FLAT_TOTAL_KEYS),
    }
}

/// Map entries as categories, in insertion order, skipping the `skip` keys
fn category_entries(map: &Map<String, Value>, skip: &[&str]) -> Vec<CategoryAmount> {
    map.iter()
        .filter(|(k, _)| !skip.contains(&key_token(k).as_str()))
        .filter(|(_, v)| !matches!(v, Value::Object(_) | Value::Array(_)))
        .map(|(k, v)| CategoryAmount::new(k.clone(), parse_amount(v).unwrap_or(0.0)))
        .collect()
}

/// Single defaulting pass over [`SUMMARY_FIELDS`]
///
/// Returns `None` when no summary field is found anywhere.
fn read_summary(
    reply: &Map<String, Value>,
    warnings: &mut Vec<AnalysisWarning>,
) -> Option<StatementSummary> {
    let summary_obj = match lookup(reply, &["summary"]) {
        Some(Value::Object(obj)) => Some(obj),
        _ => None,
    };
    let period_obj = match lookup(reply, PERIOD_KEYS)
        .or_else(|| summary_obj.and_then(|s| lookup(s, PERIOD_KEYS)))
    {
        Some(Value::Object(obj)) => Some(obj),
        _ => None,
    };
    let sources: Vec<&Map<String, Value>> = summary_obj
        .into_iter()
        .chain(std::iter::once(reply))
        .chain(period_obj)
        .collect();

    let mut summary = StatementSummary::default();
    let mut found = summary_obj.is_some();

    for field in SUMMARY_FIELDS {
        let Some(value) = sources.iter().find_map(|src| lookup(src, field.aliases)) else {
            continue;
        };
        found = true;

        match (field.kind, field.name) {
            (FieldKind::Amount, "netFlow") => {
                summary.net_flow = parse_amount(value).unwrap_or(0.0)
            }
            (FieldKind::Amount, _) => summary.balance = parse_amount(value).unwrap_or(0.0),
            (FieldKind::Date, name) => {
                let date = read_date(name, value, warnings);
                if name == "startDate" {
                    summary.start_date = date;
                } else {
                    summary.end_date = date;
                }
            }
            (FieldKind::Text, _) => summary.account = read_text(value),
        }
    }

    found.then_some(summary)
}

fn read_date(field: &str, value: &Value, warnings: &mut Vec<AnalysisWarning>) -> String {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return NOT_AVAILABLE.to_string(),
        other => other.to_string(),
    };
    if raw.is_empty() || raw.eq_ignore_ascii_case(NOT_AVAILABLE) {
        return NOT_AVAILABLE.to_string();
    }

    parse_date(&raw).unwrap_or_else(|| {
        warnings.push(AnalysisWarning::UnparsedDate {
            field: field.to_string(),
            value: raw,
        });
        NOT_AVAILABLE.to_string()
    })
}

fn read_text(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    if text.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        text
    }
}

fn clean_group(group: &mut MoneyGroup, side: Side, warnings: &mut Vec<AnalysisWarning>) {
    if group.total < 0.0 {
        warnings.push(AnalysisWarning::NegativeAmount {
            side,
            name: "total".to_string(),
            amount: group.total,
        });
        group.total = group.total.abs();
    }

    group.categories.retain_mut(|c| {
        c.name = c.name.trim().to_string();
        if c.name.is_empty() {
            warnings.push(AnalysisWarning::UnnamedCategory {
                side,
                amount: c.amount,
            });
            return false;
        }
        if c.amount < 0.0 {
            warnings.push(AnalysisWarning::NegativeAmount {
                side,
                name: c.name.clone(),
                amount: c.amount,
            });
            c.amount = c.amount.abs();
        }
        true
    });
}

fn complete_categories(group: &mut MoneyGroup, names: &[String]) {
    for name in names {
        let present = group
            .categories
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name.trim()));
        if !present {
            group.categories.push(CategoryAmount::new(name.clone(), 0.0));
        }
    }
}

fn consistency_warnings(analysis: &AnalysisResult, warnings: &mut Vec<AnalysisWarning>) {
    for (side, group) in [
        (Side::Income, &analysis.income),
        (Side::Expenses, &analysis.expenses),
    ] {
        if !group.is_consistent() {
            warnings.push(AnalysisWarning::TotalMismatch {
                side,
                total: group.total,
                category_sum: group.category_sum(),
            });
        }
    }

    let implied = analysis.implied_net_flow();
    if (analysis.summary.net_flow - implied).abs() > TOTAL_TOLERANCE {
        warnings.push(AnalysisWarning::NetFlowMismatch {
            net_flow: analysis.summary.net_flow,
            implied,
        });
    }
}

/// Case- and separator-insensitive lookup
fn lookup<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| keys.contains(&key_token(k).as_str()))
        .map(|(_, v)| v)
}

/// `"Total Income"`, `"total_income"` and `"totalIncome"` all become `"totalincome"`
fn key_token(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(raw: &str) -> String {
    let raw = raw.trim();
    if raw.chars().count() > 200 {
        format!("{}...", raw.chars().take(200).collect::<String>())
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;

    const CANONICAL: &str = r#"{
        "income": {"total": 5500, "categories": [
            {"name": "Salary", "amount": 5000},
            {"name": "Freelance", "amount": 500}
        ]},
        "expenses": {"total": 450.25, "categories": [{"name": "Groceries", "amount": 450.25}]},
        "summary": {"netFlow": 5049.75, "startDate": "2023-07-01", "endDate": "2023-07-31",
                    "account": "...XXXX 1234", "balance": 1200}
    }"#;

    const FLAT: &str = r#"{"income_summary":{"Salary":5000,"Total Income":5000},"expense_summary":{"Groceries":450,"Total Expenses":450},"net_flow":4550,"statement_period":{"start_date":"2024-01-01","end_date":"2024-01-31"},"balance":1000}"#;

    fn is_malformed(err: &Error) -> bool {
        matches!(err, Error::Extraction(ExtractionError::MalformedResponse(_)))
    }

    fn is_invalid_structure(err: &Error) -> bool {
        matches!(err, Error::Extraction(ExtractionError::InvalidStructure(_)))
    }

    #[test]
    fn test_canonical_reply() {
        let result = normalize(CANONICAL).unwrap();
        let a = &result.analysis;
        assert_eq!(a.income.total, 5500.0);
        assert_eq!(a.income.categories.len(), 2);
        assert_eq!(a.expenses.amount_for("Groceries"), Some(450.25));
        assert_eq!(a.summary.start_date, "2023-07-01");
        assert_eq!(a.summary.account, "...XXXX 1234");
        assert_eq!(a.summary.balance, 1200.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_flat_summary_scenario() {
        let result = normalize(FLAT).unwrap();
        let a = &result.analysis;

        assert_eq!(a.income.total, 5000.0);
        assert_eq!(a.income.categories, vec![CategoryAmount::new("Salary", 5000.0)]);
        assert_eq!(a.expenses.total, 450.0);
        assert_eq!(
            a.expenses.categories,
            vec![CategoryAmount::new("Groceries", 450.0)]
        );
        assert_eq!(a.summary.net_flow, 4550.0);
        assert_eq!(a.summary.balance, 1000.0);
        assert_eq!(a.summary.start_date, "2024-01-01");
        assert_eq!(a.summary.end_date, "2024-01-31");
        assert_eq!(a.summary.account, NOT_AVAILABLE);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_flat_summary_with_taxonomy_fills_every_category() {
        let taxonomy = Taxonomy::default();
        let result = Normalizer::with_taxonomy(taxonomy.clone())
            .normalize(FLAT)
            .unwrap();
        let a = &result.analysis;

        for name in &taxonomy.income {
            assert!(a.income.amount_for(name).is_some(), "missing {}", name);
        }
        for name in &taxonomy.expenses {
            assert!(a.expenses.amount_for(name).is_some(), "missing {}", name);
        }
        assert_eq!(a.income.amount_for("Salary"), Some(5000.0));
        assert_eq!(a.income.amount_for("Freelance"), Some(0.0));
        assert_eq!(a.expenses.amount_for("Groceries"), Some(450.0));
        assert_eq!(a.expenses.amount_for("Fees"), Some(0.0));
        // Reply order first, then taxonomy order
        assert_eq!(a.income.categories[0].name, "Salary");
        // Completion never changes totals
        assert_eq!(a.income.total, 5000.0);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_taxonomy_completion_is_case_insensitive() {
        let reply = r#"{"income": {"total": 10, "categories": [{"name": "salary", "amount": 10}]},
                        "expenses": {"total": 0, "categories": []},
                        "summary": {"netFlow": 10}}"#;
        let result = Normalizer::with_taxonomy(Taxonomy::default())
            .normalize(reply)
            .unwrap();
        let salaries = result
            .analysis
            .income
            .categories
            .iter()
            .filter(|c| c.name.eq_ignore_ascii_case("salary"))
            .count();
        assert_eq!(salaries, 1);
    }

    #[test]
    fn test_coined_expense_category_kept() {
        let reply = r#"{"income": {"total": 0, "categories": []},
                        "expenses": {"total": 30, "categories": [{"name": "Pet Care", "amount": 30}]},
                        "summary": {"netFlow": -30}}"#;
        let result = Normalizer::with_taxonomy(Taxonomy::default())
            .normalize(reply)
            .unwrap();
        assert_eq!(result.analysis.expenses.categories[0].name, "Pet Care");
        assert_eq!(result.analysis.summary.net_flow, -30.0);
    }

    #[test]
    fn test_fenced_reply_equals_bare_reply() {
        let bare = normalize(CANONICAL).unwrap();
        for wrapped in [
            format!("```json\n{}\n```", CANONICAL),
            format!("```\n{}\n```", CANONICAL),
            format!("Here is the analysis:\n```json\n{}\n```\nLet me know!", CANONICAL),
            format!("Sure! {} Hope this helps.", CANONICAL),
        ] {
            assert_eq!(normalize(&wrapped).unwrap(), bare);
        }

        let fenced_flat = format!("```json\n{}\n```", FLAT);
        assert_eq!(normalize(&fenced_flat).unwrap(), normalize(FLAT).unwrap());
        assert_eq!(strip_code_fences(&fenced_flat), FLAT);
    }

    #[test]
    fn test_malformed_replies() {
        for raw in [
            "",
            "   ",
            "I could not read this statement.",
            "{ not json at all }",
            "} backwards {",
        ] {
            let err = normalize(raw).unwrap_err();
            assert!(is_malformed(&err), "{:?} -> {:?}", raw, err);
        }
    }

    #[test]
    fn test_non_object_top_level_is_malformed() {
        let err = normalize("[1, 2, 3]").unwrap_err();
        assert!(is_malformed(&err));
    }

    #[test]
    fn test_missing_sections_are_invalid_structure() {
        let err = normalize(r#"{"expenses": {"total": 1}, "summary": {"netFlow": 1}}"#).unwrap_err();
        assert!(is_invalid_structure(&err));
        assert!(err.to_string().contains("income"));

        let err = normalize(r#"{"income": {"total": 1}, "summary": {"netFlow": 1}}"#).unwrap_err();
        assert!(is_invalid_structure(&err));

        let err = normalize(r#"{"income": {"total": 1}, "expenses": {"total": 1}}"#).unwrap_err();
        assert!(is_invalid_structure(&err));
        assert!(err.to_string().contains("summary"));
    }

    #[test]
    fn test_flat_summary_without_summary_fields_gets_defaults() {
        let reply = r#"{"income_summary":{"Salary":5000,"Total Income":5000},"expense_summary":{"Groceries":450,"Total Expenses":450}}"#;
        let result = normalize(reply).unwrap();
        assert_eq!(result.analysis.income.total, 5000.0);
        assert_eq!(result.analysis.expenses.total, 450.0);
        assert_eq!(result.analysis.summary, StatementSummary::default());
        assert_eq!(result.analysis.summary.end_date, NOT_AVAILABLE);
    }

    #[test]
    fn test_summary_defaults() {
        let reply = r#"{"income": {"total": 0}, "expenses": {"total": 0}, "summary": {}}"#;
        let summary = normalize(reply).unwrap().analysis.summary;
        assert_eq!(summary, StatementSummary::default());
    }

    #[test]
    fn test_summary_aliases_and_numeric_strings() {
        let reply = r#"{
            "income": {"total": "$1,234.50", "categories": [{"name": "Salary", "amount": "1,234.50"}]},
            "expenses": {"total": 0, "categories": []},
            "summary": {"net_flow": "1,234.50", "start_date": "01/01/2024", "end_date": "Jan 31, 2024",
                        "account_number": 987654, "closing_balance": "€2.000"}
        }"#;
        let result = normalize(reply).unwrap();
        let a = &result.analysis;
        assert_eq!(a.income.total, 1234.5);
        assert_eq!(a.income.categories[0].amount, 1234.5);
        assert_eq!(a.summary.net_flow, 1234.5);
        assert_eq!(a.summary.start_date, "2024-01-01");
        assert_eq!(a.summary.end_date, "2024-01-31");
        assert_eq!(a.summary.account, "987654");
        assert_eq!(a.summary.balance, 2.0);
    }

    #[test]
    fn test_unparsed_date_warns() {
        let reply = r#"{"income": {"total": 0}, "expenses": {"total": 0},
                        "summary": {"startDate": "sometime in spring", "endDate": "N/A"}}"#;
        let result = normalize(reply).unwrap();
        assert_eq!(result.analysis.summary.start_date, NOT_AVAILABLE);
        assert_eq!(result.analysis.summary.end_date, NOT_AVAILABLE);
        assert_eq!(
            result.warnings,
            vec![AnalysisWarning::UnparsedDate {
                field: "startDate".into(),
                value: "sometime in spring".into()
            }]
        );
    }

    #[test]
    fn test_negative_and_unnamed_categories() {
        let reply = r#"{
            "income": {"total": 0, "categories": []},
            "expenses": {"total": 75, "categories": [
                {"name": "Groceries", "amount": -50},
                {"name": "  ", "amount": 10},
                {"amount": 15},
                {"name": "Fees", "amount": 25}
            ]},
            "summary": {"netFlow": -75}
        }"#;
        let result = normalize(reply).unwrap();
        let expenses = &result.analysis.expenses;
        assert_eq!(
            expenses.categories,
            vec![
                CategoryAmount::new("Groceries", 50.0),
                CategoryAmount::new("Fees", 25.0)
            ]
        );
        assert!(expenses.categories.iter().all(|c| c.amount >= 0.0));
        assert!(result.warnings.contains(&AnalysisWarning::NegativeAmount {
            side: Side::Expenses,
            name: "Groceries".into(),
            amount: -50.0
        }));
        let unnamed = result
            .warnings
            .iter()
            .filter(|w| matches!(w, AnalysisWarning::UnnamedCategory { .. }))
            .count();
        assert_eq!(unnamed, 2);
    }

    #[test]
    fn test_totals_are_trusted_with_warning() {
        let reply = r#"{"income": {"total": 100, "categories": [{"name": "Salary", "amount": 80}]},
                        "expenses": {"total": 0, "categories": []},
                        "summary": {"netFlow": 90}}"#;
        let result = normalize(reply).unwrap();
        assert_eq!(result.analysis.income.total, 100.0);
        assert!(result.warnings.contains(&AnalysisWarning::TotalMismatch {
            side: Side::Income,
            total: 100.0,
            category_sum: 80.0
        }));
        assert!(result.warnings.contains(&AnalysisWarning::NetFlowMismatch {
            net_flow: 90.0,
            implied: 100.0
        }));
    }

    #[test]
    fn test_rounding_within_tolerance_is_silent() {
        let reply = r#"{"income": {"total": 100.004, "categories": [{"name": "Salary", "amount": 100}]},
                        "expenses": {"total": 0, "categories": []},
                        "summary": {"netFlow": 100}}"#;
        assert!(normalize(reply).unwrap().warnings.is_empty());
    }

    #[test]
    fn test_flat_summary_variants() {
        let reply = r#"{"incomeSummary": {"Wages": "2,000", "total": 2000},
                        "expenses_summary": {"Rent": 900, "TOTAL": 900},
                        "summary": {"netFlow": 1100}}"#;
        let result = normalize(reply).unwrap();
        assert_eq!(result.analysis.income.total, 2000.0);
        assert_eq!(result.analysis.income.categories[0].name, "Wages");
        assert_eq!(result.analysis.expenses.total, 900.0);
        assert_eq!(result.analysis.expenses.categories.len(), 1);
    }

    #[test]
    fn test_shape_detection() {
        let map = |s: &str| match serde_json::from_str::<Value>(s).unwrap() {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        assert!(matches!(
            RawReply::detect(map(CANONICAL)),
            RawReply::Canonical(_)
        ));
        assert!(matches!(RawReply::detect(map(FLAT)), RawReply::FlatSummary(_)));
        assert!(matches!(RawReply::detect(map("{}")), RawReply::Canonical(_)));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&Value::from(12.5)), Some(12.5));
        assert_eq!(parse_amount(&Value::from("$1,234.50")), Some(1234.5));
        assert_eq!(parse_amount(&Value::from("(45.00)")), Some(-45.0));
        assert_eq!(parse_amount(&Value::from("45.00-")), Some(-45.0));
        assert_eq!(parse_amount(&Value::from("-12")), Some(-12.0));
        assert_eq!(parse_amount(&Value::from("N/A")), None);
        assert_eq!(parse_amount(&Value::Null), None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-02-29").as_deref(), Some("2024-02-29"));
        assert_eq!(parse_date("2024/02/29").as_deref(), Some("2024-02-29"));
        assert_eq!(parse_date("02/29/2024").as_deref(), Some("2024-02-29"));
        assert_eq!(parse_date("29.02.2024").as_deref(), Some("2024-02-29"));
        assert_eq!(parse_date("February 29, 2024").as_deref(), Some("2024-02-29"));
        assert_eq!(parse_date("29 Feb 2024").as_deref(), Some("2024-02-29"));
        assert_eq!(parse_date("2024-02-29T10:00:00Z").as_deref(), Some("2024-02-29"));
        assert_eq!(parse_date("2023-02-29"), None);
        assert_eq!(parse_date("last month"), None);
    }

    #[test]
    fn test_key_token() {
        assert_eq!(key_token("Total Income"), "totalincome");
        assert_eq!(key_token("total_income"), "totalincome");
        assert_eq!(key_token("netFlow"), "netflow");
    }
}
