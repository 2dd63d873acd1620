//! Dashboard and account handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;

use crate::{get_user, AppError, AppState};
use tally_core::history::{AccountOption, Dashboard};

/// Account selection shared by the history endpoints
#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    /// Account label; absent or blank selects all accounts
    pub account: Option<String>,
}

/// GET /api/dashboard - Series, latest/previous pair and deltas
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccountQuery>,
    headers: HeaderMap,
) -> Result<Json<Dashboard>, AppError> {
    let dashboard = state.pipeline.dashboard(params.account.as_deref())?;

    state.db.log_audit(
        &get_user(&headers),
        "view",
        Some("dashboard"),
        None,
        Some(&format!(
            "account={}, points={}",
            dashboard.selected.label,
            dashboard.series.len()
        )),
    )?;

    Ok(Json(dashboard))
}

/// GET /api/accounts - Account labels with stored analyses
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<AccountOption>>, AppError> {
    let accounts = state.pipeline.accounts()?;

    state.db.log_audit(
        &get_user(&headers),
        "list",
        Some("account"),
        None,
        Some(&format!("count={}", accounts.len().saturating_sub(1))),
    )?;

    Ok(Json(accounts))
}
