//! Stored analysis operations

use rusqlite::params;
use tracing::debug;

use super::{parse_datetime, AnalysisStore, Database};
use crate::error::Result;
use crate::models::{AnalysisResult, NewAnalysis, StoredAnalysis};

/// Row as read from SQLite, before the analysis JSON is decoded
struct AnalysisRow {
    id: i64,
    created_at: String,
    file_name: String,
    account_name: String,
    balance: f64,
    analysis: String,
}

impl AnalysisRow {
    fn decode(self) -> Result<StoredAnalysis> {
        let analysis: AnalysisResult = serde_json::from_str(&self.analysis)?;
        Ok(StoredAnalysis {
            id: self.id,
            created_at: parse_datetime(&self.created_at),
            file_name: self.file_name,
            account_name: self.account_name,
            balance: self.balance,
            analysis,
        })
    }
}

impl AnalysisStore for Database {
    fn insert_analysis(&self, new: &NewAnalysis) -> Result<i64> {
        let conn = self.conn()?;
        let analysis_json = serde_json::to_string(&new.analysis)?;

        conn.execute(
            r#"
            INSERT INTO analyses (file_name, account_name, balance, analysis)
            VALUES (?, ?, ?, ?)
            "#,
            params![new.file_name, new.account_name, new.balance, analysis_json],
        )?;

        let id = conn.last_insert_rowid();
        debug!(id, account = %new.account_name, "Stored analysis");
        Ok(id)
    }

    fn list_analyses(&self, account: Option<&str>) -> Result<Vec<StoredAnalysis>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, created_at, file_name, account_name, balance, analysis
            FROM analyses
            WHERE (?1 IS NULL OR account_name = ?1)
            ORDER BY created_at DESC, id DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![account], |row| {
                Ok(AnalysisRow {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    file_name: row.get(2)?,
                    account_name: row.get(3)?,
                    balance: row.get(4)?,
                    analysis: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(AnalysisRow::decode).collect()
    }

    fn delete_analysis(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM analyses WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}

impl Database {
    /// Get a single analysis by id
    pub fn get_analysis(&self, id: i64) -> Result<Option<StoredAnalysis>> {
        let conn = self.conn()?;

        let row = conn.query_row(
            r#"
            SELECT id, created_at, file_name, account_name, balance, analysis
            FROM analyses WHERE id = ?
            "#,
            params![id],
            |row| {
                Ok(AnalysisRow {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    file_name: row.get(2)?,
                    account_name: row.get(3)?,
                    balance: row.get(4)?,
                    analysis: row.get(5)?,
                })
            },
        );

        match row {
            Ok(row) => Ok(Some(row.decode()?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Count stored analyses and distinct account labels
    pub fn analysis_counts(&self) -> Result<(i64, i64)> {
        let conn = self.conn()?;
        let counts = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT account_name) FROM analyses",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(counts)
    }
}
