//! Escrow API handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use common::decimal::Quantity;
use common::model::escrow::Balance;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::response::{ApiListResponse, ApiResponse};
use crate::error::ApiError;
use crate::AppState;

/// Deposit request
#[derive(Debug, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Owner account ID
    pub owner_id: Uuid,
    /// Asset symbol
    pub asset: String,
    /// Amount to deposit
    pub amount: Quantity,
}

/// Fund an owner's escrow account
#[utoipa::path(
    post,
    path = "/api/v1/escrow/deposit",
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Deposit credited"),
        (status = 400, description = "Invalid deposit amount"),
        (status = 500, description = "Internal server error")
    ),
    tag = "escrow"
)]
pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DepositRequest>,
) -> Result<ApiResponse<Balance>, ApiError> {
    let balance = state
        .store
        .deposit(request.owner_id, &request.asset, request.amount)
        .map_err(ApiError::Common)?;

    Ok(ApiResponse::new(balance))
}

/// Get all escrow balances for an owner
#[utoipa::path(
    get,
    path = "/api/v1/owners/{id}/balances",
    params(
        ("id" = Uuid, Path, description = "Owner account ID")
    ),
    responses(
        (status = 200, description = "Balances retrieved successfully"),
        (status = 500, description = "Internal server error")
    ),
    tag = "escrow"
)]
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
) -> Result<ApiListResponse<Balance>, ApiError> {
    Ok(ApiListResponse::new(state.store.balances(owner_id)))
}
