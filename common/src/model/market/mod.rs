//! Market collaborator types: oracle quotes, pool snapshots, swap outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Price, Quantity};
use crate::model::pair::Pair;
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// A price observation from the oracle.
///
/// The price is quoted in asset1-per-asset0 of the canonical pair. Staleness
/// is judged by the engine against the quote's timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct PriceQuote {
    /// Trading pair the quote covers
    pub pair: Pair,
    /// asset1 per asset0
    pub price: Price,
    /// When the oracle last updated this price
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of a pool's reserves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct PoolSnapshot {
    /// Trading pair
    pub pair: Pair,
    /// Reserve of asset0
    pub reserve0: Quantity,
    /// Reserve of asset1
    pub reserve1: Quantity,
    /// Swap fee charged on input, in basis points
    pub fee_bps: u32,
}

/// Result of a settled swap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct SwapOutcome {
    /// Input amount the pool took
    pub input_consumed: Quantity,
    /// Output amount the pool paid out
    pub output_received: Quantity,
}
