//! Order API handlers
//!
//! Handlers for order management endpoints including:
//! - Place new orders
//! - Cancel existing orders
//! - Get order details
//! - List orders by owner

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use common::decimal::Quantity;
use common::model::order::{Order, OrderId, PlaceOrderParams};
use common::model::pair::{Direction, Pair};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::response::{ApiListResponse, ApiResponse};
use crate::error::ApiError;
use crate::AppState;

/// Place order request
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    /// Owner account ID
    pub owner_id: Uuid,
    /// Trading pair, e.g. "ETH/USDC"
    pub pair: String,
    /// Trade direction
    pub direction: Direction,
    /// Total output quantity sought
    pub target_base_amount: Quantity,
    /// Total input quantity to escrow
    pub total_input_amount: Quantity,
    /// Allowed price deviation in basis points
    pub tolerance_bps: u32,
    /// DCA interval in minutes; zero or absent places a single-shot order
    #[serde(default)]
    pub interval_minutes: u32,
    /// Number of DCA tranches
    #[serde(default)]
    pub num_intervals: u32,
    /// Optional expiry
    pub expires_at: Option<DateTime<Utc>>,
}

/// Cancel order request; the caller proves ownership with their account ID
#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    /// Owner account ID
    pub owner_id: Uuid,
}

/// Place a new order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order placed successfully"),
        (status = 400, description = "Invalid order parameters or insufficient escrow"),
        (status = 404, description = "Pair not registered"),
        (status = 500, description = "Internal server error")
    ),
    tag = "order"
)]
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<ApiResponse<Order>, ApiError> {
    let pair: Pair = request
        .pair
        .parse()
        .map_err(|e: common::error::Error| ApiError::BadRequest(e.to_string()))?;

    let params = PlaceOrderParams {
        owner: request.owner_id,
        pair,
        direction: request.direction,
        target_base_amount: request.target_base_amount,
        total_input_amount: request.total_input_amount,
        tolerance_bps: request.tolerance_bps,
        interval_minutes: request.interval_minutes,
        num_intervals: request.num_intervals,
        expires_at: request.expires_at,
    };

    let order = state
        .store
        .place(params, Utc::now())
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(order))
}

/// Cancel an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    params(
        ("id" = u64, Path, description = "Order ID to cancel")
    ),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled successfully"),
        (status = 403, description = "Caller does not own the order"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not active"),
        (status = 500, description = "Internal server error")
    ),
    tag = "order"
)]
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<ApiResponse<Order>, ApiError> {
    tracing::info!("Attempting to cancel order: {}", id);

    let order = state
        .store
        .cancel(OrderId(id), request.owner_id, Utc::now())
        .await
        .map_err(ApiError::Common)?;

    tracing::info!("Successfully cancelled order: {}", id);
    Ok(ApiResponse::new(order))
}

/// Get an order by ID
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order retrieved successfully"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "order"
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<ApiResponse<Order>, ApiError> {
    let order = state
        .store
        .get_order(OrderId(id))
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(order))
}

/// Get orders placed by an owner
#[utoipa::path(
    get,
    path = "/api/v1/owners/{id}/orders",
    params(
        ("id" = Uuid, Path, description = "Owner account ID")
    ),
    responses(
        (status = 200, description = "Orders retrieved successfully"),
        (status = 500, description = "Internal server error")
    ),
    tag = "order"
)]
pub async fn get_orders(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
) -> Result<ApiListResponse<Order>, ApiError> {
    let orders = state
        .store
        .orders_by_owner(owner_id)
        .await
        .map_err(ApiError::Common)?;

    Ok(ApiListResponse::new(orders))
}
