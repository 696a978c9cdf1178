//! Metric query endpoints

use std::collections::BTreeMap;

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::Deserialize;

use crate::api::{error::ApiResult, state::ApiState};
use crate::query::{CurrentMetrics, HistoricalSeries, parse_timestamp};

/// Body of a historical data request
#[derive(Debug, Deserialize)]
pub struct HistoricalRequest {
    /// One of `cpu`, `memory`, `disk`, `network`
    metric: String,

    /// Host id
    server: String,

    /// RFC 3339, or `YYYY-MM-DDTHH:MM` read as UTC
    start_time: String,

    end_time: String,
}

/// GET /api/current_metrics
///
/// Newest record of every host, keyed by host id
pub async fn current_metrics(
    State(state): State<ApiState>,
) -> ApiResult<Json<BTreeMap<String, CurrentMetrics>>> {
    let latest = state.query.latest().await?;
    Ok(Json(latest))
}

/// POST /api/historical_data
///
/// Series of one metric for one host within a time range
pub async fn historical_data(
    State(state): State<ApiState>,
    payload: Result<Json<HistoricalRequest>, JsonRejection>,
) -> ApiResult<Json<HistoricalSeries>> {
    let Json(request) = payload?;

    let start = parse_timestamp(&request.start_time)?;
    let end = parse_timestamp(&request.end_time)?;

    let series = state
        .query
        .historical(&request.metric, &request.server, start, end)
        .await?;

    Ok(Json(series))
}
