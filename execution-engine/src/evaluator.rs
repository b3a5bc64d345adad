//! Condition evaluation and fill sizing
//!
//! Pure functions over an order, an oracle quote, and a pool snapshot. All
//! prices inside this module are in input-per-output units from the order's
//! point of view; the oracle's asset1-per-asset0 quote is converted on entry.

use common::decimal::{bps_fraction, Price, Quantity};
use common::model::market::{PoolSnapshot, PriceQuote};
use common::model::order::Order;
use common::model::pair::Direction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Evaluation knobs that come from the engine configuration
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Cap on per-fill input relative to the pool's input reserve, in bps
    pub max_price_impact_bps: u32,
}

/// Why an order was passed over this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Oracle price deviates from the order's reference price beyond its
    /// tolerance band
    OutOfBand {
        current_price: Price,
        reference_price: Price,
    },
    /// Remaining escrow cannot buy a meaningful amount; the order is done
    EscrowDust,
    /// The pool rejected the swap (slippage, empty pool)
    SwapFailed { detail: String },
    /// The order's state changed under the cycle (e.g. a concurrent cancel)
    FillRejected { detail: String },
}

/// Outcome of evaluating one order against one quote
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Leave the order untouched this cycle
    NotEligible(SkipReason),
    /// Execute a swap spending `input_to_spend`, rejecting any outcome
    /// below `min_output`
    Eligible {
        input_to_spend: Quantity,
        min_output: Quantity,
    },
}

/// Convert an asset1-per-asset0 oracle quote into the order's
/// input-per-output price.
fn current_price(quote: &PriceQuote, direction: Direction) -> Option<Price> {
    match direction {
        // Spending asset0 for asset1: asset0-per-asset1 is the reciprocal
        Direction::ZeroForOne => {
            if quote.price <= Price::ZERO {
                None
            } else {
                Some(Decimal::ONE / quote.price)
            }
        }
        Direction::OneForZero => Some(quote.price),
    }
}

/// Decide whether an order should execute against the current quote, and if
/// so how much input to spend and what output floor to demand.
pub fn evaluate(
    order: &Order,
    quote: &PriceQuote,
    pool: &PoolSnapshot,
    config: &EvaluatorConfig,
) -> Decision {
    let remaining_target = order.remaining_target();
    if remaining_target <= Quantity::ZERO {
        return Decision::NotEligible(SkipReason::EscrowDust);
    }

    let current = match current_price(quote, order.direction) {
        Some(p) if p > Price::ZERO => p,
        _ => {
            return Decision::NotEligible(SkipReason::SwapFailed {
                detail: "Oracle quote is not a usable price".to_string(),
            })
        }
    };

    let reference = order.reference_price();

    if !order.is_price_agnostic() {
        let reference = match reference {
            Some(r) if r > Price::ZERO => r,
            _ => return Decision::NotEligible(SkipReason::EscrowDust),
        };

        // Two-sided band: too expensive and suspiciously cheap both skip.
        let deviation = (current - reference).abs() / reference;
        if deviation > bps_fraction(order.tolerance_bps) {
            return Decision::NotEligible(SkipReason::OutOfBand {
                current_price: current,
                reference_price: reference,
            });
        }
    }

    // Output allotment for this fill: one tranche for DCA, the whole
    // remainder for a single-shot order, never past the target.
    let allotment = match &order.schedule {
        Some(schedule) => schedule.tranche_base_amount.min(remaining_target),
        None => remaining_target,
    };

    let impact_cap = reserve_in(pool, order.direction) * bps_fraction(config.max_price_impact_bps);
    if impact_cap <= Quantity::ZERO {
        // Empty pool is a venue condition, not escrow exhaustion; the order
        // stays open for later ticks.
        return Decision::NotEligible(SkipReason::SwapFailed {
            detail: "Pool has no input-side liquidity".to_string(),
        });
    }

    let input_to_spend = (allotment * current)
        .min(order.remaining_input_amount)
        .min(impact_cap);

    if input_to_spend <= Quantity::ZERO {
        return Decision::NotEligible(SkipReason::EscrowDust);
    }

    // The output floor comes from the worst price the order accepts: the
    // edge of its band, or for price-agnostic orders the current price
    // degraded by the impact allowance.
    let worst_price = if order.is_price_agnostic() {
        current * (Decimal::ONE + bps_fraction(config.max_price_impact_bps))
    } else {
        // reference is Some here: remaining_target > 0 was checked above
        reference.unwrap_or(current) * (Decimal::ONE + bps_fraction(order.tolerance_bps))
    };

    Decision::Eligible {
        input_to_spend,
        min_output: input_to_spend / worst_price,
    }
}

fn reserve_in(pool: &PoolSnapshot, direction: Direction) -> Quantity {
    match direction {
        Direction::ZeroForOne => pool.reserve0,
        Direction::OneForZero => pool.reserve1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::decimal::{dec, TOLERANCE_AGNOSTIC};
    use common::model::order::{OrderId, PlaceOrderParams};
    use common::model::pair::Pair;
    use uuid::Uuid;

    fn eth_usdc() -> Pair {
        Pair::new("ETH", "USDC").unwrap()
    }

    fn order(tolerance_bps: u32, interval_minutes: u32, num_intervals: u32) -> Order {
        Order::new(
            OrderId(1),
            PlaceOrderParams {
                owner: Uuid::new_v4(),
                pair: eth_usdc(),
                direction: Direction::OneForZero,
                target_base_amount: dec!(6),
                total_input_amount: dec!(18540),
                tolerance_bps,
                interval_minutes,
                num_intervals,
                expires_at: None,
            },
            Utc::now(),
        )
    }

    fn quote(price: Price) -> PriceQuote {
        PriceQuote {
            pair: eth_usdc(),
            price,
            timestamp: Utc::now(),
        }
    }

    fn deep_pool() -> PoolSnapshot {
        PoolSnapshot {
            pair: eth_usdc(),
            reserve0: dec!(1000000),
            reserve1: dec!(3090000000),
            fee_bps: 0,
        }
    }

    fn config() -> EvaluatorConfig {
        EvaluatorConfig {
            max_price_impact_bps: 100,
        }
    }

    #[test]
    fn in_band_limit_order_spends_full_remainder() {
        let order = order(100, 0, 0);
        // Reference 3090, quote exactly on it
        match evaluate(&order, &quote(dec!(3090)), &deep_pool(), &config()) {
            Decision::Eligible {
                input_to_spend,
                min_output,
            } => {
                assert_eq!(input_to_spend, dec!(18540));
                // 18540 / (3090 * 1.01)
                assert!(min_output > dec!(5.94) && min_output < dec!(5.95));
            }
            other => panic!("Expected Eligible, got {:?}", other),
        }
    }

    #[test]
    fn out_of_band_skips_both_sides() {
        let order = order(100, 0, 0);

        // 3.5% above reference
        match evaluate(&order, &quote(dec!(3198)), &deep_pool(), &config()) {
            Decision::NotEligible(SkipReason::OutOfBand { .. }) => (),
            other => panic!("Expected OutOfBand, got {:?}", other),
        }

        // 3.5% below reference is also outside the band
        match evaluate(&order, &quote(dec!(2982)), &deep_pool(), &config()) {
            Decision::NotEligible(SkipReason::OutOfBand { .. }) => (),
            other => panic!("Expected OutOfBand, got {:?}", other),
        }

        // Just inside the band on the cheap side
        assert!(matches!(
            evaluate(&order, &quote(dec!(3060)), &deep_pool(), &config()),
            Decision::Eligible { .. }
        ));
    }

    #[test]
    fn dca_spends_one_tranche() {
        let order = order(100, 5, 6);
        match evaluate(&order, &quote(dec!(3090)), &deep_pool(), &config()) {
            Decision::Eligible { input_to_spend, .. } => {
                // One tranche of 1 ETH at 3090
                assert_eq!(input_to_spend, dec!(3090));
            }
            other => panic!("Expected Eligible, got {:?}", other),
        }
    }

    #[test]
    fn price_agnostic_ignores_the_band() {
        let order = order(TOLERANCE_AGNOSTIC, 5, 6);
        // Far from the implied reference, still eligible
        match evaluate(&order, &quote(dec!(4000)), &deep_pool(), &config()) {
            Decision::Eligible {
                input_to_spend,
                min_output,
            } => {
                assert_eq!(input_to_spend, dec!(4000));
                // Floor derived from the quote, not a reference band
                assert!(min_output < dec!(1));
                assert!(min_output > dec!(0.99));
            }
            other => panic!("Expected Eligible, got {:?}", other),
        }
    }

    #[test]
    fn impact_cap_clamps_input() {
        let order = order(100, 0, 0);
        let shallow = PoolSnapshot {
            pair: eth_usdc(),
            reserve0: dec!(100),
            reserve1: dec!(309000),
            fee_bps: 0,
        };

        match evaluate(&order, &quote(dec!(3090)), &shallow, &config()) {
            Decision::Eligible { input_to_spend, .. } => {
                // 309000 * 100 / 10000 = 3090, far below the 18540 remainder
                assert_eq!(input_to_spend, dec!(3090));
            }
            other => panic!("Expected Eligible, got {:?}", other),
        }
    }

    #[test]
    fn empty_pool_is_not_escrow_exhaustion() {
        let order = order(100, 0, 0);
        let drained = PoolSnapshot {
            pair: eth_usdc(),
            reserve0: Quantity::ZERO,
            reserve1: Quantity::ZERO,
            fee_bps: 0,
        };

        // The order is healthy; only the venue is unusable right now
        match evaluate(&order, &quote(dec!(3090)), &drained, &config()) {
            Decision::NotEligible(SkipReason::SwapFailed { .. }) => (),
            other => panic!("Expected SwapFailed, got {:?}", other),
        }
    }

    #[test]
    fn escrow_clamp_and_dust() {
        let mut order = order(100, 0, 0);
        // 0.1 ETH left to buy with 100 USDC: implied reference 1000
        order.remaining_input_amount = dec!(100);
        order.filled_base_amount = dec!(5.9);

        // In band at 1005, but 0.1 * 1005 overruns the escrow
        match evaluate(&order, &quote(dec!(1005)), &deep_pool(), &config()) {
            Decision::Eligible { input_to_spend, .. } => {
                assert_eq!(input_to_spend, dec!(100));
            }
            other => panic!("Expected Eligible, got {:?}", other),
        }

        order.remaining_input_amount = Quantity::ZERO;
        assert!(matches!(
            evaluate(&order, &quote(dec!(1005)), &deep_pool(), &config()),
            Decision::NotEligible(SkipReason::EscrowDust)
        ));
    }

    #[test]
    fn sell_direction_converts_the_quote() {
        // Sell 1 ETH for 3000 USDC: reference 1/3000 ETH per USDC
        let order = Order::new(
            OrderId(2),
            PlaceOrderParams {
                owner: Uuid::new_v4(),
                pair: eth_usdc(),
                direction: Direction::ZeroForOne,
                target_base_amount: dec!(3000),
                total_input_amount: dec!(1),
                tolerance_bps: 100,
                interval_minutes: 0,
                num_intervals: 0,
                expires_at: None,
            },
            Utc::now(),
        );

        // Quote 3000 USDC per ETH sits exactly on the reference
        match evaluate(&order, &quote(dec!(3000)), &deep_pool(), &config()) {
            Decision::Eligible { input_to_spend, .. } => {
                assert_eq!(input_to_spend, dec!(1));
            }
            other => panic!("Expected Eligible, got {:?}", other),
        }

        // Quote 2900 (ETH cheap in USDC terms) is out of the 1% band
        assert!(matches!(
            evaluate(&order, &quote(dec!(2900)), &deep_pool(), &config()),
            Decision::NotEligible(SkipReason::OutOfBand { .. })
        ));
    }
}
