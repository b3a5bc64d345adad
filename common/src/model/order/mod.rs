//! Order models and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Price, Quantity, TOLERANCE_AGNOSTIC};
use crate::model::pair::{Direction, Pair};
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Unique order identifier, monotonically assigned by the store at creation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order is eligible for evaluation and execution
    Active,
    /// Target reached or escrow exhausted; never re-evaluated
    Completed,
    /// Cancelled by the owner (or by expiry); remaining escrow released
    Cancelled,
}

impl OrderStatus {
    /// Database/text representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "active",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(OrderStatus::Active),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(crate::error::Error::Internal(format!(
                "Unknown order status: {}",
                other
            ))),
        }
    }
}

/// Recurring execution schedule for a DCA order.
///
/// Absent for single-shot limit orders. The tranche is fixed at placement as
/// `target_base_amount / num_intervals`; the final tranche may be smaller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct DcaSchedule {
    /// Minutes that must elapse between successful fills
    pub interval_minutes: u32,
    /// Output quantity targeted per tick
    pub tranche_base_amount: Quantity,
}

/// Parameters for placing a new order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderParams {
    /// The account placing the order
    pub owner: Uuid,
    /// Trading pair
    pub pair: Pair,
    /// Which asset is sold for which
    pub direction: Direction,
    /// Total output quantity the order seeks over its lifetime
    pub target_base_amount: Quantity,
    /// Total input quantity to escrow (covers the target plus a fee buffer)
    pub total_input_amount: Quantity,
    /// Allowed deviation between reference and oracle price, in basis points.
    /// `TOLERANCE_AGNOSTIC` means "execute on schedule regardless of price"
    /// and is only valid for DCA orders.
    pub tolerance_bps: u32,
    /// Zero for a single-shot limit order; otherwise the DCA interval
    pub interval_minutes: u32,
    /// Number of DCA tranches the target is split into (ignored for limit orders)
    pub num_intervals: u32,
    /// Optional expiry; an expired Active order is auto-cancelled
    pub expires_at: Option<DateTime<Utc>>,
}

/// Order model, the central entity of the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Order {
    /// Unique order ID
    pub id: OrderId,
    /// Owning account; only the owner may cancel
    pub owner: Uuid,
    /// Trading pair
    pub pair: Pair,
    /// Which asset is sold for which
    pub direction: Direction,
    /// Total output quantity sought over the order's lifetime
    pub target_base_amount: Quantity,
    /// Total input quantity escrowed at placement
    pub total_input_amount: Quantity,
    /// Acceptable price deviation band in basis points
    pub tolerance_bps: u32,
    /// DCA schedule; `None` means single-shot limit order
    pub schedule: Option<DcaSchedule>,
    /// Cumulative output received so far
    pub filled_base_amount: Quantity,
    /// Escrowed input not yet consumed
    pub remaining_input_amount: Quantity,
    /// Timestamp of the most recent successful fill
    pub last_execution_at: Option<DateTime<Utc>>,
    /// Optional expiry
    pub expires_at: Option<DateTime<Utc>>,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a new Active order from validated placement parameters.
    pub fn new(id: OrderId, params: PlaceOrderParams, now: DateTime<Utc>) -> Self {
        let schedule = if params.interval_minutes > 0 {
            Some(DcaSchedule {
                interval_minutes: params.interval_minutes,
                tranche_base_amount: params.target_base_amount
                    / Quantity::from(params.num_intervals.max(1)),
            })
        } else {
            None
        };

        Self {
            id,
            owner: params.owner,
            pair: params.pair,
            direction: params.direction,
            target_base_amount: params.target_base_amount,
            total_input_amount: params.total_input_amount,
            tolerance_bps: params.tolerance_bps,
            schedule,
            filled_base_amount: Quantity::ZERO,
            remaining_input_amount: params.total_input_amount,
            last_execution_at: None,
            expires_at: params.expires_at,
            status: OrderStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the order is in the Active state
    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }

    /// Check if this is a recurring DCA order
    pub fn is_dca(&self) -> bool {
        self.schedule.is_some()
    }

    /// Check if this order executes on schedule regardless of price
    pub fn is_price_agnostic(&self) -> bool {
        self.tolerance_bps == TOLERANCE_AGNOSTIC
    }

    /// Output quantity still to be acquired
    pub fn remaining_target(&self) -> Quantity {
        self.target_base_amount - self.filled_base_amount
    }

    /// The order's implied reference price in input-per-output units,
    /// computed over the unfilled remainder. `None` once nothing remains.
    pub fn reference_price(&self) -> Option<Price> {
        let remaining = self.remaining_target();
        if remaining <= Quantity::ZERO {
            return None;
        }
        Some(self.remaining_input_amount / remaining)
    }

    /// Whether the interval gate permits execution at `now`.
    ///
    /// Always true for single-shot orders; first DCA eligibility is immediate.
    pub fn interval_elapsed(&self, now: DateTime<Utc>) -> bool {
        match (&self.schedule, self.last_execution_at) {
            (Some(schedule), Some(last)) => {
                now >= last + Duration::minutes(schedule.interval_minutes as i64)
            }
            _ => true,
        }
    }

    /// Whether the order has passed its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |t| now >= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::dec;

    fn params(interval_minutes: u32, num_intervals: u32) -> PlaceOrderParams {
        PlaceOrderParams {
            owner: Uuid::new_v4(),
            pair: Pair::new("ETH", "USDC").unwrap(),
            direction: Direction::OneForZero,
            target_base_amount: dec!(6),
            total_input_amount: dec!(18540),
            tolerance_bps: 100,
            interval_minutes,
            num_intervals,
            expires_at: None,
        }
    }

    #[test]
    fn limit_order_has_no_schedule() {
        let order = Order::new(OrderId(1), params(0, 0), Utc::now());
        assert!(!order.is_dca());
        assert!(order.interval_elapsed(Utc::now()));
    }

    #[test]
    fn dca_tranche_splits_target() {
        let order = Order::new(OrderId(1), params(5, 6), Utc::now());
        let schedule = order.schedule.unwrap();
        assert_eq!(schedule.tranche_base_amount, dec!(1));
        assert_eq!(schedule.interval_minutes, 5);
    }

    #[test]
    fn interval_gate_respects_last_execution() {
        let now = Utc::now();
        let mut order = Order::new(OrderId(1), params(5, 6), now);
        assert!(order.interval_elapsed(now), "first eligibility is immediate");

        order.last_execution_at = Some(now);
        assert!(!order.interval_elapsed(now + Duration::minutes(4)));
        assert!(order.interval_elapsed(now + Duration::minutes(5)));
    }

    #[test]
    fn reference_price_tracks_remaining_portion() {
        let now = Utc::now();
        let mut order = Order::new(OrderId(1), params(0, 0), now);
        // 18540 / 6 = 3090 input per output
        assert_eq!(order.reference_price().unwrap(), dec!(3090));

        order.filled_base_amount = dec!(3);
        order.remaining_input_amount = dec!(9270);
        assert_eq!(order.reference_price().unwrap(), dec!(3090));

        order.filled_base_amount = dec!(6);
        assert!(order.reference_price().is_none());
    }
}
