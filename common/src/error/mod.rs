//! Error types for the order engine
//!
//! This module provides a unified error handling system for all services
//! in the engine. It defines standard error types that can be used across
//! service boundaries and provides consistent error conversion.

use std::fmt::Display;
use thiserror::Error;

/// Order engine error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error raised when order placement parameters fail validation
    #[error("Invalid order parameters: {0}")]
    InvalidOrderParameters(String),

    /// Error when a caller acts on an order it does not own
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Error when an order cannot be found
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Error when an order exists but is not in the active state
    #[error("Order not active: {0}")]
    OrderNotActive(String),

    /// Error when a trading pair is not registered
    #[error("Pair not found: {0}")]
    PairNotFound(String),

    /// Error when an owner has insufficient escrowed funds
    #[error("Insufficient escrow: {0}")]
    InsufficientEscrow(String),

    /// Error when the price oracle data is older than permitted
    #[error("Stale price: {0}")]
    StalePrice(String),

    /// Error when a pool swap cannot be completed
    #[error("Swap failed: {0}")]
    SwapFailed(String),

    /// Error when a fill would consume more than the order's remaining escrow
    #[error("Escrow exhausted: {0}")]
    EscrowExhausted(String),

    /// Generic validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decimal conversion error
    #[error("Decimal conversion error: {0}")]
    DecimalError(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait to add context to error results
pub trait ErrorExt<T> {
    /// Add context information to an error
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display;
}

impl<T> ErrorExt<T> for Result<T> {
    fn with_context<C, F>(self, context_fn: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Display,
    {
        self.map_err(|e| {
            let context = context_fn().to_string();
            match e {
                Error::InvalidOrderParameters(msg) => {
                    Error::InvalidOrderParameters(format!("{}: {}", context, msg))
                }
                Error::Unauthorized(msg) => Error::Unauthorized(format!("{}: {}", context, msg)),
                Error::OrderNotFound(msg) => Error::OrderNotFound(format!("{}: {}", context, msg)),
                Error::OrderNotActive(msg) => {
                    Error::OrderNotActive(format!("{}: {}", context, msg))
                }
                Error::PairNotFound(msg) => Error::PairNotFound(format!("{}: {}", context, msg)),
                Error::InsufficientEscrow(msg) => {
                    Error::InsufficientEscrow(format!("{}: {}", context, msg))
                }
                Error::StalePrice(msg) => Error::StalePrice(format!("{}: {}", context, msg)),
                Error::SwapFailed(msg) => Error::SwapFailed(format!("{}: {}", context, msg)),
                Error::EscrowExhausted(msg) => {
                    Error::EscrowExhausted(format!("{}: {}", context, msg))
                }
                Error::ValidationError(msg) => {
                    Error::ValidationError(format!("{}: {}", context, msg))
                }
                Error::ConfigurationError(msg) => {
                    Error::ConfigurationError(format!("{}: {}", context, msg))
                }
                Error::Internal(msg) => Error::Internal(format!("{}: {}", context, msg)),
                Error::Database(e) => Error::Database(e),
                Error::Migration(e) => Error::Migration(e),
                Error::Serialization(e) => Error::Serialization(e),
                Error::DecimalError(msg) => Error::DecimalError(format!("{}: {}", context, msg)),
            }
        })
    }
}

/// Trait for converting other error types to our Error type
pub trait IntoError {
    /// Convert to Error
    fn into_error(self, message: &str) -> Error;
}

impl<E: std::error::Error> IntoError for E {
    fn into_error(self, message: &str) -> Error {
        Error::Internal(format!("{}: {}", message, self))
    }
}

/// Convert string messages into an error
impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Internal(message)
    }
}

/// Convert static string references into an error
impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Internal(message.to_string())
    }
}

/// From rust_decimal::Error
impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::DecimalError(err.to_string())
    }
}
