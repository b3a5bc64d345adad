//! Liquidity pool boundary and constant-product simulation

use async_trait::async_trait;
use common::decimal::{bps_fraction, Quantity};
use common::error::{Error, Result};
use common::model::market::{PoolSnapshot, SwapOutcome};
use common::model::pair::{Direction, Pair};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;

/// Venue the engine settles swaps against
#[async_trait]
pub trait LiquidityPool: Send + Sync {
    /// Current reserves and fee for a pair
    async fn snapshot(&self, pair: &Pair) -> Result<PoolSnapshot>;

    /// Swap `input` of the direction's input asset. Fails with `SwapFailed`
    /// if the resulting output would be below `min_output`.
    async fn swap(
        &self,
        pair: &Pair,
        direction: Direction,
        input: Quantity,
        min_output: Quantity,
    ) -> Result<SwapOutcome>;
}

struct PoolState {
    reserve0: Quantity,
    reserve1: Quantity,
    fee_bps: u32,
}

/// In-process x·y=k pool with a bps fee charged on input
pub struct ConstantProductPool {
    pools: DashMap<Pair, PoolState>,
}

impl ConstantProductPool {
    /// Create a pool venue with no pairs
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Seed (or replace) a pair's reserves
    pub fn add_pool(&self, pair: Pair, reserve0: Quantity, reserve1: Quantity, fee_bps: u32) {
        self.pools.insert(
            pair,
            PoolState {
                reserve0,
                reserve1,
                fee_bps,
            },
        );
    }

    /// Marginal asset1-per-asset0 price implied by the reserves
    pub fn spot_price(&self, pair: &Pair) -> Result<Decimal> {
        let pool = self
            .pools
            .get(pair)
            .ok_or_else(|| Error::PairNotFound(format!("No pool for {}", pair.symbol())))?;
        if pool.reserve0 <= Quantity::ZERO {
            return Err(Error::SwapFailed(format!(
                "Pool {} has no asset0 reserve",
                pair.symbol()
            )));
        }
        Ok(pool.reserve1 / pool.reserve0)
    }
}

impl Default for ConstantProductPool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiquidityPool for ConstantProductPool {
    async fn snapshot(&self, pair: &Pair) -> Result<PoolSnapshot> {
        let pool = self
            .pools
            .get(pair)
            .ok_or_else(|| Error::PairNotFound(format!("No pool for {}", pair.symbol())))?;
        Ok(PoolSnapshot {
            pair: pair.clone(),
            reserve0: pool.reserve0,
            reserve1: pool.reserve1,
            fee_bps: pool.fee_bps,
        })
    }

    async fn swap(
        &self,
        pair: &Pair,
        direction: Direction,
        input: Quantity,
        min_output: Quantity,
    ) -> Result<SwapOutcome> {
        if input <= Quantity::ZERO {
            return Err(Error::SwapFailed("Swap input must be positive".to_string()));
        }

        let mut pool = self
            .pools
            .get_mut(pair)
            .ok_or_else(|| Error::PairNotFound(format!("No pool for {}", pair.symbol())))?;

        let (reserve_in, reserve_out) = match direction {
            Direction::ZeroForOne => (pool.reserve0, pool.reserve1),
            Direction::OneForZero => (pool.reserve1, pool.reserve0),
        };

        if reserve_in <= Quantity::ZERO || reserve_out <= Quantity::ZERO {
            return Err(Error::SwapFailed(format!(
                "Pool {} is empty",
                pair.symbol()
            )));
        }

        let input_after_fee = input * (Decimal::ONE - bps_fraction(pool.fee_bps));
        let output = input_after_fee * reserve_out / (reserve_in + input_after_fee);

        if output < min_output {
            return Err(Error::SwapFailed(format!(
                "Output {} below minimum {} on {}",
                output,
                min_output,
                pair.symbol()
            )));
        }

        match direction {
            Direction::ZeroForOne => {
                pool.reserve0 += input;
                pool.reserve1 -= output;
            }
            Direction::OneForZero => {
                pool.reserve1 += input;
                pool.reserve0 -= output;
            }
        }

        debug!(
            "Swap on {}: {} in, {} out ({:?})",
            pair.symbol(),
            input,
            output,
            direction
        );

        Ok(SwapOutcome {
            input_consumed: input,
            output_received: output,
        })
    }
}
