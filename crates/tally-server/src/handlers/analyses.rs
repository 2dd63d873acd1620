//! Statement analysis and history handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};

use tracing::warn;

use super::dashboard::AccountQuery;
use crate::{get_user, AppError, AppState, SuccessResponse, MAX_UPLOAD_SIZE};
use tally_core::models::{AnalysisResult, StoredAnalysis};

/// POST /api/analyze - Analyze an uploaded statement
///
/// Expects multipart form with:
/// - statement: statement document, PDF or text (required, max 10MB)
/// - accountName: account label the analysis is filed under (required)
pub async fn analyze_statement(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, AppError> {
    let mut document: Vec<u8> = Vec::new();
    let mut file_name = String::from("statement");
    let mut account_name = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "statement" => {
                if let Some(original) = field.file_name().filter(|n| !n.is_empty()) {
                    file_name = original.to_string();
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file data"))?;

                if bytes.len() > MAX_UPLOAD_SIZE {
                    return Err(AppError::bad_request(&format!(
                        "File too large. Maximum size is {} MB",
                        MAX_UPLOAD_SIZE / 1024 / 1024
                    )));
                }

                document = bytes.to_vec();
            }
            "accountName" => {
                account_name = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read accountName"))?;
            }
            _ => {}
        }
    }

    // Missing fields surface as input errors from the pipeline
    let outcome = state
        .pipeline
        .analyze(&file_name, &account_name, document)
        .await?;

    // The record is committed; a failed audit write must not turn it into an error
    if let Err(e) = state.db.log_audit(
        &get_user(&headers),
        "analyze",
        Some("analysis"),
        Some(outcome.id),
        Some(&format!(
            "file={}, account={}, warnings={}",
            file_name,
            account_name.trim(),
            outcome.warnings.len()
        )),
    ) {
        warn!(id = outcome.id, error = %e, "Failed to write audit entry for stored analysis");
    }

    Ok(Json(outcome.analysis))
}

/// GET /api/history - Stored analyses, newest first
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccountQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<StoredAnalysis>>, AppError> {
    let records = state.pipeline.history(params.account.as_deref())?;

    state.db.log_audit(
        &get_user(&headers),
        "list",
        Some("analysis"),
        None,
        Some(&format!(
            "account={}, count={}",
            params.account.as_deref().unwrap_or("all"),
            records.len()
        )),
    )?;

    Ok(Json(records))
}

/// DELETE /api/history/:id - Delete a stored analysis
///
/// Unknown ids are acknowledged the same way as known ones.
pub async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    state.pipeline.delete(id)?;

    state
        .db
        .log_audit(&get_user(&headers), "delete", Some("analysis"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}
