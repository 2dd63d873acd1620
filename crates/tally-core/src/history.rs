//! History aggregation for the dashboard
//!
//! Works on the store's newest-first list of analyses. Order is never derived
//! from request arrival, only from that list and from parsed statement dates.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::StoredAnalysis;

/// Label of the synthetic account that stands for the unfiltered view
pub const ALL_ACCOUNTS_LABEL: &str = "All Accounts";

/// One point of a per-period chart, oldest first
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    /// Short label such as `Jan 2024`
    pub period: String,
    pub end_date: NaiveDate,
    pub income: f64,
    pub expenses: f64,
    pub net_flow: f64,
    pub balance: f64,
}

/// Selectable account in the dashboard
///
/// `value` is `None` for the all-accounts pseudo-account, so no real label can
/// collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountOption {
    pub value: Option<String>,
    pub label: String,
}

impl AccountOption {
    pub fn all() -> Self {
        Self {
            value: None,
            label: ALL_ACCOUNTS_LABEL.to_string(),
        }
    }

    /// A real account; a label equal to the pseudo-account's is suffixed for display
    pub fn account(label: &str) -> Self {
        let display = if label == ALL_ACCOUNTS_LABEL {
            format!("{} (account)", label)
        } else {
            label.to_string()
        };
        Self {
            value: Some(label.to_string()),
            label: display,
        }
    }

    pub fn is_all(&self) -> bool {
        self.value.is_none()
    }
}

/// Period-over-period percentage changes; absent when undefined
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDeltas {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub income: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expenses: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_flow: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
}

impl MetricDeltas {
    pub fn between(current: &StoredAnalysis, previous: &StoredAnalysis) -> Self {
        let (c, p) = (&current.analysis, &previous.analysis);
        Self {
            income: percent_change(Some(c.income.total), Some(p.income.total)),
            expenses: percent_change(Some(c.expenses.total), Some(p.expenses.total)),
            net_flow: percent_change(Some(c.summary.net_flow), Some(p.summary.net_flow)),
            balance: percent_change(Some(current.balance), Some(previous.balance)),
        }
    }
}

/// Everything the dashboard view needs for one account selection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub accounts: Vec<AccountOption>,
    pub selected: AccountOption,
    pub series: Vec<SeriesPoint>,
    pub latest: Option<StoredAnalysis>,
    pub previous: Option<StoredAnalysis>,
    pub deltas: MetricDeltas,
}

impl Dashboard {
    /// Build from the full newest-first list and an optional account label
    pub fn build(records: &[StoredAnalysis], account: Option<&str>) -> Self {
        let account = selected_label(account);
        let filtered = filter_by_account(records, account);
        let (latest, previous) = latest_pair(&filtered);

        let deltas = match (latest, previous) {
            (Some(c), Some(p)) => MetricDeltas::between(c, p),
            _ => MetricDeltas::default(),
        };

        Self {
            accounts: account_options(records),
            selected: account.map_or_else(AccountOption::all, AccountOption::account),
            series: project_series(&filtered),
            latest: latest.cloned(),
            previous: previous.cloned(),
            deltas,
        }
    }
}

/// `(current - previous) / previous * 100`, or `None` when undefined
///
/// Undefined when either side is absent or non-finite, or `previous` is zero.
pub fn percent_change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let (current, previous) = (current?, previous?);
    if !current.is_finite() || !previous.is_finite() || previous == 0.0 {
        return None;
    }
    let change = (current - previous) * 100.0 / previous;
    change.is_finite().then_some(change)
}

/// Chart series, oldest first; records without a parseable end date are skipped
pub fn project_series(records: &[StoredAnalysis]) -> Vec<SeriesPoint> {
    let mut series: Vec<SeriesPoint> = records
        .iter()
        .filter_map(|r| {
            let end_date =
                NaiveDate::parse_from_str(r.analysis.summary.end_date.trim(), "%Y-%m-%d").ok()?;
            Some(SeriesPoint {
                period: end_date.format("%b %Y").to_string(),
                end_date,
                income: r.analysis.income.total,
                expenses: r.analysis.expenses.total,
                net_flow: r.analysis.summary.net_flow,
                balance: r.balance,
            })
        })
        .collect();
    series.reverse();
    series
}

/// Current and comparison records: the first two of the newest-first list
pub fn latest_pair(
    records: &[StoredAnalysis],
) -> (Option<&StoredAnalysis>, Option<&StoredAnalysis>) {
    (records.first(), records.get(1))
}

/// Pseudo-account first, then distinct non-empty labels by first appearance
pub fn account_options(records: &[StoredAnalysis]) -> Vec<AccountOption> {
    let mut options = vec![AccountOption::all()];
    for record in records {
        let label = record.account_name.trim();
        if label.is_empty() || options.iter().any(|o| o.value.as_deref() == Some(label)) {
            continue;
        }
        options.push(AccountOption::account(label));
    }
    options
}

/// Records for one account label; `None` or a blank label keeps everything
pub fn filter_by_account(records: &[StoredAnalysis], account: Option<&str>) -> Vec<StoredAnalysis> {
    match selected_label(account) {
        Some(label) => records
            .iter()
            .filter(|r| r.account_name.trim() == label)
            .cloned()
            .collect(),
        None => records.to_vec(),
    }
}

fn selected_label(account: Option<&str>) -> Option<&str> {
    account.map(str::trim).filter(|a| !a.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisResult, MoneyGroup, StatementSummary};
    use chrono::Utc;

    fn record(id: i64, account: &str, end_date: &str, net_flow: f64, balance: f64) -> StoredAnalysis {
        StoredAnalysis {
            id,
            created_at: Utc::now(),
            file_name: format!("{}.pdf", id),
            account_name: account.to_string(),
            balance,
            analysis: AnalysisResult {
                income: MoneyGroup {
                    total: net_flow + 500.0,
                    categories: vec![],
                },
                expenses: MoneyGroup {
                    total: 500.0,
                    categories: vec![],
                },
                summary: StatementSummary {
                    net_flow,
                    end_date: end_date.to_string(),
                    balance,
                    ..StatementSummary::default()
                },
            },
        }
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(Some(1200.0), Some(1000.0)), Some(20.0));
        assert_eq!(percent_change(Some(500.0), Some(1000.0)), Some(-50.0));
        assert_eq!(percent_change(Some(0.0), Some(1000.0)), Some(-100.0));
    }

    #[test]
    fn test_percent_change_undefined() {
        assert_eq!(percent_change(Some(100.0), Some(0.0)), None);
        assert_eq!(percent_change(Some(0.0), Some(0.0)), None);
        assert_eq!(percent_change(None, Some(100.0)), None);
        assert_eq!(percent_change(Some(100.0), None), None);
        assert_eq!(percent_change(Some(f64::NAN), Some(100.0)), None);
        assert_eq!(percent_change(Some(100.0), Some(f64::INFINITY)), None);
        assert_eq!(percent_change(Some(f64::MAX), Some(f64::MIN_POSITIVE)), None);
    }

    #[test]
    fn test_checking_net_flow_delta() {
        // Newest first, as the store returns them
        let records = vec![
            record(2, "Checking", "2024-02-29", 1200.0, 3000.0),
            record(1, "Checking", "2024-01-31", 1000.0, 2000.0),
        ];
        let dashboard = Dashboard::build(&records, Some("Checking"));

        assert_eq!(dashboard.latest.as_ref().map(|r| r.id), Some(2));
        assert_eq!(dashboard.previous.as_ref().map(|r| r.id), Some(1));
        assert_eq!(dashboard.deltas.net_flow, Some(20.0));
        assert_eq!(dashboard.deltas.balance, Some(50.0));
        assert_eq!(dashboard.deltas.expenses, Some(0.0));
    }

    #[test]
    fn test_series_is_oldest_first_and_skips_bad_dates() {
        let records = vec![
            record(4, "Checking", "2024-04-30", 4.0, 0.0),
            record(3, "Checking", "N/A", 3.0, 0.0),
            record(2, "Checking", "2024-02-29", 2.0, 0.0),
            record(1, "Checking", "not a date", 1.0, 0.0),
            record(0, "Checking", "2024-01-31", 0.0, 0.0),
        ];
        let series = project_series(&records);

        let flows: Vec<f64> = series.iter().map(|p| p.net_flow).collect();
        assert_eq!(flows, vec![0.0, 2.0, 4.0]);
        assert_eq!(series[0].period, "Jan 2024");
        assert_eq!(series[1].period, "Feb 2024");
        assert_eq!(series[2].income, 504.0);
    }

    #[test]
    fn test_series_keeps_store_order_not_date_order() {
        // Concurrent inserts may land out of statement order
        let records = vec![
            record(2, "Checking", "2024-01-31", 1.0, 0.0),
            record(1, "Checking", "2024-02-29", 2.0, 0.0),
        ];
        let periods: Vec<String> = project_series(&records)
            .into_iter()
            .map(|p| p.period)
            .collect();
        assert_eq!(periods, vec!["Feb 2024", "Jan 2024"]);
    }

    #[test]
    fn test_latest_pair() {
        let records = vec![
            record(3, "A", "2024-03-31", 0.0, 0.0),
            record(2, "A", "2024-02-29", 0.0, 0.0),
            record(1, "A", "2024-01-31", 0.0, 0.0),
        ];
        let (latest, previous) = latest_pair(&records);
        assert_eq!(latest.map(|r| r.id), Some(3));
        assert_eq!(previous.map(|r| r.id), Some(2));

        let (latest, previous) = latest_pair(&records[..1]);
        assert_eq!(latest.map(|r| r.id), Some(3));
        assert!(previous.is_none());

        assert_eq!(latest_pair(&[]), (None, None));
    }

    #[test]
    fn test_account_options() {
        let records = vec![
            record(5, "Savings", "N/A", 0.0, 0.0),
            record(4, "Checking", "N/A", 0.0, 0.0),
            record(3, "", "N/A", 0.0, 0.0),
            record(2, "Savings", "N/A", 0.0, 0.0),
            record(1, " Checking ", "N/A", 0.0, 0.0),
        ];
        let options = account_options(&records);

        assert!(options[0].is_all());
        assert_eq!(options[0].label, ALL_ACCOUNTS_LABEL);
        let labels: Vec<&str> = options[1..].iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Savings", "Checking"]);

        assert_eq!(account_options(&[]), vec![AccountOption::all()]);
    }

    #[test]
    fn test_account_named_like_pseudo_account_keeps_labels_unique() {
        let records = vec![
            record(2, ALL_ACCOUNTS_LABEL, "N/A", 0.0, 0.0),
            record(1, "Checking", "N/A", 0.0, 0.0),
        ];
        let options = account_options(&records);

        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["All Accounts", "All Accounts (account)", "Checking"]);
        let mut unique = labels.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), labels.len());

        // Still selectable by its stored label
        assert_eq!(options[1].value.as_deref(), Some(ALL_ACCOUNTS_LABEL));
        assert_eq!(filter_by_account(&records, Some(ALL_ACCOUNTS_LABEL)).len(), 1);
    }

    #[test]
    fn test_filter_by_account() {
        let records = vec![
            record(3, "Savings", "N/A", 0.0, 0.0),
            record(2, "Checking", "N/A", 0.0, 0.0),
            record(1, "Checking", "N/A", 0.0, 0.0),
        ];
        assert_eq!(filter_by_account(&records, None).len(), 3);
        assert_eq!(filter_by_account(&records, Some("  ")).len(), 3);
        let checking = filter_by_account(&records, Some("Checking"));
        assert_eq!(checking.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1]);
        assert!(filter_by_account(&records, Some("Brokerage")).is_empty());
    }

    #[test]
    fn test_dashboard_without_previous_has_no_deltas() {
        let records = vec![record(1, "Checking", "2024-01-31", 1000.0, 0.0)];
        let dashboard = Dashboard::build(&records, None);

        assert!(dashboard.selected.is_all());
        assert_eq!(dashboard.deltas, MetricDeltas::default());

        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["deltas"], serde_json::json!({}));
        assert_eq!(json["accounts"][0]["value"], serde_json::Value::Null);
        assert_eq!(json["series"][0]["period"], "Jan 2024");
        assert_eq!(json["series"][0]["endDate"], "2024-01-31");
    }

    #[test]
    fn test_dashboard_zero_previous_is_absent_not_zero() {
        let records = vec![
            record(2, "Checking", "2024-02-29", 1200.0, 100.0),
            record(1, "Checking", "2024-01-31", 0.0, 0.0),
        ];
        let dashboard = Dashboard::build(&records, None);
        assert_eq!(dashboard.deltas.net_flow, None);
        assert_eq!(dashboard.deltas.balance, None);

        let json = serde_json::to_value(&dashboard.deltas).unwrap();
        assert!(json.get("netFlow").is_none());
        assert!(json.get("balance").is_none());
        assert!(json.get("income").is_some());
    }
}
