//! AI backend health handler

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::{get_user, AppError, AppState};

/// Live status of the configured AI backend
#[derive(Debug, Serialize)]
pub struct AiHealth {
    pub available: bool,
    pub host: String,
    pub model: String,
}

/// GET /api/health - Check the AI backend
pub async fn ai_health(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AiHealth>, AppError> {
    let ai = state.pipeline.ai();
    let health = AiHealth {
        available: ai.health_check().await,
        host: ai.host().to_string(),
        model: ai.model().to_string(),
    };

    state.db.log_audit(
        &get_user(&headers),
        "health",
        Some("ai_backend"),
        None,
        Some(&format!("available={}", health.available)),
    )?;

    Ok(Json(health))
}
