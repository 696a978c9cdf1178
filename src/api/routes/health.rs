//! Health check endpoint

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{error::ApiResult, state::ApiState};

/// GET /api/health
///
/// Reports whether the record store answers, with its statistics
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let health = state.query.health().await?;

    Ok(Json(json!({
        "status": if health.healthy { "ok" } else { "degraded" },
        "storage": health.message,
        "stats": health.stats,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
