//! Error handling for the API gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error information
    pub error: ErrorInfo,
    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Detailed error information
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code (string identifier for the error type)
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Common error: {0}")]
    Common(#[from] common::error::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Generate a request ID for tracking errors
        let request_id = Uuid::new_v4().to_string();

        tracing::error!("API Error [{}]: {:?}", request_id, &self);

        let (status, code, details) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
            ApiError::Common(e) => match e {
                // Client errors (4xx)
                common::error::Error::InvalidOrderParameters(_) => {
                    (StatusCode::BAD_REQUEST, "invalid_order_parameters", None)
                }
                common::error::Error::InsufficientEscrow(_) => {
                    (StatusCode::BAD_REQUEST, "insufficient_escrow", None)
                }
                common::error::Error::ValidationError(_) => {
                    (StatusCode::BAD_REQUEST, "validation_error", None)
                }
                common::error::Error::Unauthorized(_) => {
                    (StatusCode::FORBIDDEN, "unauthorized", None)
                }
                common::error::Error::OrderNotFound(_) => {
                    (StatusCode::NOT_FOUND, "order_not_found", None)
                }
                common::error::Error::PairNotFound(_) => {
                    (StatusCode::NOT_FOUND, "pair_not_found", None)
                }
                common::error::Error::OrderNotActive(_) => {
                    (StatusCode::CONFLICT, "order_not_active", None)
                }
                common::error::Error::EscrowExhausted(_) => {
                    (StatusCode::CONFLICT, "escrow_exhausted", None)
                }

                // The oracle cannot back a cycle right now; retry later
                common::error::Error::StalePrice(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "stale_price", None)
                }

                // Server errors (5xx)
                common::error::Error::SwapFailed(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "swap_failed", None)
                }
                common::error::Error::ConfigurationError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    None,
                ),
                common::error::Error::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
                }
                common::error::Error::Database(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    Some(serde_json::json!({
                        "db_error": e.to_string(),
                        "code": e.as_database_error().map(|dbe| dbe.code().map(|c| c.to_string())),
                    })),
                ),
                common::error::Error::Migration(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "migration_error", None)
                }
                common::error::Error::Serialization(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "serialization_error",
                    None,
                ),
                common::error::Error::DecimalError(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "decimal_error", None)
                }
            },
        };

        let error_response = ErrorResponse {
            error: ErrorInfo {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
            request_id: Some(request_id),
        };

        (status, Json(error_response)).into_response()
    }
}
