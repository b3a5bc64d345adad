//! Market API handlers: registered pairs, oracle quotes, pool snapshots

use std::sync::Arc;

use axum::extract::{Path, State};
use common::model::market::{PoolSnapshot, PriceQuote};
use common::model::pair::Pair;

use crate::api::response::{ApiListResponse, ApiResponse};
use crate::error::ApiError;
use crate::AppState;

fn parse_pair(raw: &str) -> Result<Pair, ApiError> {
    raw.parse()
        .map_err(|e: common::error::Error| ApiError::BadRequest(e.to_string()))
}

/// List registered trading pairs
#[utoipa::path(
    get,
    path = "/api/v1/pairs",
    responses(
        (status = 200, description = "Pairs retrieved successfully")
    ),
    tag = "market"
)]
pub async fn get_pairs(
    State(state): State<Arc<AppState>>,
) -> Result<ApiListResponse<Pair>, ApiError> {
    Ok(ApiListResponse::new(state.store.pairs()))
}

/// Get the latest oracle quote for a pair
#[utoipa::path(
    get,
    path = "/api/v1/pairs/{pair}/price",
    params(
        ("pair" = String, Path, description = "Trading pair, e.g. ETH-USDC")
    ),
    responses(
        (status = 200, description = "Quote retrieved successfully"),
        (status = 404, description = "No quote for the pair")
    ),
    tag = "market"
)]
pub async fn get_price(
    State(state): State<Arc<AppState>>,
    Path(pair): Path<String>,
) -> Result<ApiResponse<PriceQuote>, ApiError> {
    let pair = parse_pair(&pair)?;
    let quote = state.oracle.price(&pair).await.map_err(ApiError::Common)?;
    Ok(ApiResponse::new(quote))
}

/// Get the current pool reserves for a pair
#[utoipa::path(
    get,
    path = "/api/v1/pairs/{pair}/pool",
    params(
        ("pair" = String, Path, description = "Trading pair, e.g. ETH-USDC")
    ),
    responses(
        (status = 200, description = "Pool snapshot retrieved successfully"),
        (status = 404, description = "No pool for the pair")
    ),
    tag = "market"
)]
pub async fn get_pool(
    State(state): State<Arc<AppState>>,
    Path(pair): Path<String>,
) -> Result<ApiResponse<PoolSnapshot>, ApiError> {
    let pair = parse_pair(&pair)?;
    let snapshot = state.pool.snapshot(&pair).await.map_err(ApiError::Common)?;
    Ok(ApiResponse::new(snapshot))
}
