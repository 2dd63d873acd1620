//! Integration tests for tally-core
//!
//! These tests exercise the full analyze -> store -> dashboard workflow against
//! an on-disk SQLite database and the mock AI backend.

use std::sync::Arc;

use tally_core::{
    ai::MockBackend,
    db::{AnalysisStore, Database},
    error::{Error, ErrorCategory, ExtractionError},
    pipeline::AnalysisPipeline,
    taxonomy::Taxonomy,
};

/// Reply in the older flat-summary shape some models fall back to
const FLAT_REPLY: &str = r#"Here is the summary you asked for:
```json
{"income_summary":{"Salary":5000,"Total Income":5000},"expense_summary":{"Groceries":450,"Total Expenses":450},"net_flow":4550,"statement_period":{"start_date":"2024-01-01","end_date":"2024-01-31"},"balance":1000}
```"#;

fn canonical_reply(end_date: &str, net_flow: f64, balance: f64) -> String {
    format!(
        r#"{{"income": {{"total": {income}, "categories": [{{"name": "Salary", "amount": {income}}}]}},
            "expenses": {{"total": 500, "categories": [{{"name": "Groceries", "amount": 500}}]}},
            "summary": {{"netFlow": {net_flow}, "startDate": "N/A", "endDate": "{end_date}",
                         "account": "...XXXX 1234", "balance": {balance}}}}}"#,
        income = net_flow + 500.0,
        net_flow = net_flow,
        end_date = end_date,
        balance = balance,
    )
}

fn temp_db() -> (tempfile::TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("tally.db");
    let db = Database::new_unencrypted(&path.to_string_lossy())
        .expect("Failed to create database");
    (dir, Arc::new(db))
}

fn pipeline_with(db: &Arc<Database>, ai: MockBackend) -> AnalysisPipeline {
    AnalysisPipeline::with_taxonomy(db.clone(), Arc::new(ai), Taxonomy::default())
        .expect("Failed to build pipeline")
}

// =============================================================================
// Analyze Workflow
// =============================================================================

#[tokio::test]
async fn test_flat_summary_reply_is_normalized_and_stored() {
    let (_dir, db) = temp_db();
    let pipeline = pipeline_with(&db, MockBackend::with_reply(FLAT_REPLY));

    let outcome = pipeline
        .analyze("jan.txt", "Checking", b"01/31 PAYROLL 5000.00".to_vec())
        .await
        .expect("analyze failed");

    let analysis = &outcome.analysis;
    assert_eq!(analysis.income.total, 5000.0);
    assert_eq!(analysis.expenses.total, 450.0);
    assert_eq!(analysis.summary.net_flow, 4550.0);
    assert_eq!(analysis.summary.start_date, "2024-01-01");
    assert_eq!(analysis.summary.end_date, "2024-01-31");
    assert_eq!(analysis.summary.account, "N/A");
    assert_eq!(analysis.summary.balance, 1000.0);
    assert!(outcome.warnings.is_empty());

    // Every taxonomy category is present, absent ones at zero
    let taxonomy = Taxonomy::default();
    assert_eq!(analysis.income.categories.len(), taxonomy.income.len());
    assert_eq!(analysis.income.amount_for("Salary"), Some(5000.0));
    assert_eq!(analysis.income.amount_for("Freelance"), Some(0.0));
    assert_eq!(analysis.expenses.amount_for("Groceries"), Some(450.0));
    assert_eq!(analysis.expenses.amount_for("Utilities"), Some(0.0));

    let stored = db.list_analyses(None).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, outcome.id);
    assert_eq!(stored[0].account_name, "Checking");
    assert_eq!(stored[0].balance, 1000.0);
    assert_eq!(&stored[0].analysis, analysis);
}

#[tokio::test]
async fn test_failed_analysis_leaves_store_untouched() {
    let (_dir, db) = temp_db();

    let replies = [
        ("not json at all", true),
        (r#"["income", "expenses"]"#, true),
        (r#"{"income": {"total": 10, "categories": []}}"#, false),
    ];

    for (reply, malformed) in replies {
        let pipeline = pipeline_with(&db, MockBackend::with_reply(reply));
        let err = pipeline
            .analyze("jan.txt", "Checking", b"statement".to_vec())
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Extraction, "{}", reply);
        if malformed {
            assert!(matches!(
                err,
                Error::Extraction(ExtractionError::MalformedResponse(_))
            ));
        } else {
            assert!(matches!(
                err,
                Error::Extraction(ExtractionError::InvalidStructure(_))
            ));
        }
    }

    assert!(db.list_analyses(None).unwrap().is_empty());
}

// =============================================================================
// History Workflow
// =============================================================================

#[tokio::test]
async fn test_dashboard_deltas_across_statements() {
    let (_dir, db) = temp_db();

    // Uploaded in statement order; the store returns newest first
    for (end_date, net_flow, balance) in [("2024-01-31", 1000.0, 2000.0), ("2024-02-29", 1200.0, 3000.0)]
    {
        pipeline_with(
            &db,
            MockBackend::with_reply(canonical_reply(end_date, net_flow, balance)),
        )
        .analyze("statement.txt", "Checking", b"statement".to_vec())
        .await
        .expect("analyze failed");
    }
    pipeline_with(
        &db,
        MockBackend::with_reply(canonical_reply("2024-02-29", 50.0, 800.0)),
    )
    .analyze("savings.txt", "Savings", b"statement".to_vec())
    .await
    .expect("analyze failed");

    let pipeline = pipeline_with(&db, MockBackend::new());

    let dashboard = pipeline.dashboard(Some("Checking")).unwrap();
    assert_eq!(dashboard.selected.label, "Checking");
    assert_eq!(dashboard.deltas.net_flow, Some(20.0));
    assert_eq!(dashboard.deltas.balance, Some(50.0));
    let periods: Vec<&str> = dashboard.series.iter().map(|p| p.period.as_str()).collect();
    assert_eq!(periods, vec!["Jan 2024", "Feb 2024"]);

    let labels: Vec<String> = dashboard.accounts.into_iter().map(|a| a.label).collect();
    assert_eq!(labels, vec!["All Accounts", "Savings", "Checking"]);

    let all = pipeline.dashboard(None).unwrap();
    assert_eq!(all.series.len(), 3);
    assert_eq!(all.latest.map(|r| r.account_name), Some("Savings".to_string()));

    assert_eq!(pipeline.history(Some("Checking")).unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_then_history() {
    let (_dir, db) = temp_db();
    let pipeline = pipeline_with(&db, MockBackend::new());

    let first = pipeline
        .analyze("jan.txt", "Checking", b"statement".to_vec())
        .await
        .unwrap();
    let second = pipeline
        .analyze("feb.txt", "Checking", b"statement".to_vec())
        .await
        .unwrap();

    pipeline.delete(first.id).unwrap();
    // Unknown ids are acknowledged the same way
    pipeline.delete(first.id).unwrap();

    let remaining = pipeline.history(None).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second.id);

    let dashboard = pipeline.dashboard(None).unwrap();
    assert!(dashboard.previous.is_none());
    assert_eq!(dashboard.deltas.net_flow, None);
}

#[tokio::test]
async fn test_encrypted_database_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");
    let path = path.to_string_lossy();

    {
        let db = Arc::new(Database::new_with_key(&path, Some("correct horse")).unwrap());
        assert!(db.is_encrypted());
        pipeline_with(&db, MockBackend::new())
            .analyze("jan.txt", "Checking", b"statement".to_vec())
            .await
            .unwrap();
    }

    let db = Database::new_with_key(&path, Some("correct horse")).unwrap();
    assert_eq!(db.list_analyses(None).unwrap().len(), 1);
}
