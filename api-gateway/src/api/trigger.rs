//! Trigger boundary: the external tick lands here

use std::sync::Arc;

use axum::extract::{Path, State};
use chrono::Utc;
use common::model::pair::Pair;
use execution_engine::CycleReport;

use crate::api::response::ApiResponse;
use crate::error::ApiError;
use crate::AppState;

/// Run one execution cycle for a pair
#[utoipa::path(
    post,
    path = "/api/v1/pairs/{pair}/trigger",
    params(
        ("pair" = String, Path, description = "Trading pair, e.g. ETH-USDC")
    ),
    responses(
        (status = 200, description = "Cycle completed; report returned"),
        (status = 404, description = "Pair not registered or no quote"),
        (status = 503, description = "Oracle quote is stale"),
        (status = 500, description = "Internal server error")
    ),
    tag = "trigger"
)]
pub async fn trigger_pair(
    State(state): State<Arc<AppState>>,
    Path(pair): Path<String>,
) -> Result<ApiResponse<CycleReport>, ApiError> {
    let pair: Pair = pair
        .parse()
        .map_err(|e: common::error::Error| ApiError::BadRequest(e.to_string()))?;

    let report = state
        .engine
        .execute_orders(&pair, Utc::now())
        .await
        .map_err(ApiError::Common)?;

    tracing::debug!(
        "Trigger cycle on {}: {} scanned, {} fills, {} skips",
        report.pair.symbol(),
        report.scanned,
        report.fills.len(),
        report.skips.len()
    );

    Ok(ApiResponse::new(report))
}
