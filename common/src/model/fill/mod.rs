//! Fill records emitted by the execution engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Price, Quantity};
use crate::model::order::{OrderId, OrderStatus};
use crate::model::pair::{Direction, Pair};
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Record of a single successful execution against an order.
///
/// One of these is emitted per processed order so observers can reconstruct
/// the full fill history of every order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Fill {
    /// The order that was filled
    pub order_id: OrderId,
    /// Trading pair
    pub pair: Pair,
    /// Trade direction
    pub direction: Direction,
    /// Input escrow consumed by the swap
    pub input_consumed: Quantity,
    /// Output received from the swap
    pub output_received: Quantity,
    /// Realized price in input-per-output units
    pub execution_price: Price,
    /// Order status after the fill was applied
    pub new_status: OrderStatus,
    /// When the fill settled
    pub executed_at: DateTime<Utc>,
}

impl Fill {
    /// Build a fill record from a settled swap
    pub fn new(
        order_id: OrderId,
        pair: Pair,
        direction: Direction,
        input_consumed: Quantity,
        output_received: Quantity,
        new_status: OrderStatus,
        executed_at: DateTime<Utc>,
    ) -> Self {
        let execution_price = if output_received > Quantity::ZERO {
            input_consumed / output_received
        } else {
            Price::ZERO
        };
        Self {
            order_id,
            pair,
            direction,
            input_consumed,
            output_received,
            execution_price,
            new_status,
            executed_at,
        }
    }
}
