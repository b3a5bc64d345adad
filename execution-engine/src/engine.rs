//! Trigger-driven execution cycles

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::decimal::{Price, Quantity};
use common::error::{Error, Result};
use common::model::fill::Fill;
use common::model::order::{Order, OrderId};
use common::model::pair::Pair;
use dashmap::DashMap;
use market_adapter::{LiquidityPool, PriceOracle};
use order_store::OrderStore;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::evaluator::{evaluate, Decision, EvaluatorConfig, SkipReason};
use crate::events::FillFeed;

/// What happens to a single-shot limit order after its first fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitFillPolicy {
    /// Keep the order active until its target is met or it is cancelled
    RemainActive,
    /// Complete the order on its first fill, releasing leftover escrow
    ForceComplete,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Oldest oracle quote the engine will act on, in seconds
    pub max_staleness_secs: i64,
    /// Most orders processed per trigger; the rest wait for the next one
    pub batch_size: usize,
    /// Cap on per-fill input relative to the pool reserve, in bps
    pub max_price_impact_bps: u32,
    /// Single-shot completion policy
    pub limit_fill_policy: LimitFillPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_staleness_secs: 60,
            batch_size: 50,
            max_price_impact_bps: 100,
            limit_fill_policy: LimitFillPolicy::RemainActive,
        }
    }
}

/// An order passed over during a cycle, with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSkip {
    /// The order that was skipped
    pub order_id: OrderId,
    /// Why it was skipped
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Summary of one execution cycle over a pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// The pair the cycle ran over
    pub pair: Pair,
    /// Oracle price the cycle executed against; absent when the cycle did
    /// not run (duplicate trigger)
    pub oracle_price: Option<Price>,
    /// Eligible orders found, including ones deferred past the batch limit
    pub scanned: usize,
    /// Fills settled this cycle
    pub fills: Vec<Fill>,
    /// Orders evaluated but not filled
    pub skips: Vec<OrderSkip>,
}

impl CycleReport {
    fn empty(pair: Pair) -> Self {
        Self {
            pair,
            oracle_price: None,
            scanned: 0,
            fills: Vec::new(),
            skips: Vec::new(),
        }
    }
}

/// The execution engine: turns external triggers into order fills
pub struct ExecutionEngine {
    store: Arc<OrderStore>,
    oracle: Arc<dyn PriceOracle>,
    pool: Arc<dyn LiquidityPool>,
    config: EngineConfig,
    /// One guard per pair; a held guard means a cycle is in flight
    cycle_guards: DashMap<Pair, Arc<Mutex<()>>>,
    fill_feed: FillFeed,
}

impl ExecutionEngine {
    /// Create an engine over a store, an oracle, and a pool
    pub fn new(
        store: Arc<OrderStore>,
        oracle: Arc<dyn PriceOracle>,
        pool: Arc<dyn LiquidityPool>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            pool,
            config,
            cycle_guards: DashMap::new(),
            fill_feed: FillFeed::new(),
        }
    }

    /// Subscribe to the engine's fill stream
    pub fn subscribe_fills(&self) -> broadcast::Receiver<Fill> {
        self.fill_feed.subscribe()
    }

    /// The engine's configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn cycle_guard(&self, pair: &Pair) -> Arc<Mutex<()>> {
        self.cycle_guards
            .entry(pair.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run one execution cycle over a pair. This is the trigger target: an
    /// external tick maps to exactly one call.
    ///
    /// A trigger arriving while a cycle for the same pair is still running
    /// returns an empty report; the orders it would have covered ride the
    /// next trigger instead.
    pub async fn execute_orders(&self, pair: &Pair, now: DateTime<Utc>) -> Result<CycleReport> {
        let guard = self.cycle_guard(pair);
        let _held = match guard.try_lock() {
            Ok(held) => held,
            Err(_) => {
                debug!("Cycle already running for {}, trigger dropped", pair.symbol());
                return Ok(CycleReport::empty(pair.clone()));
            }
        };

        let quote = self.oracle.price(pair).await?;
        let age = (now - quote.timestamp).num_seconds();
        if age > self.config.max_staleness_secs {
            return Err(Error::StalePrice(format!(
                "Quote for {} is {}s old (limit {}s)",
                pair.symbol(),
                age,
                self.config.max_staleness_secs
            )));
        }

        let eligible = self.store.eligible_orders(pair, now).await?;
        let scanned = eligible.len();
        if scanned > self.config.batch_size {
            debug!(
                "Deferring {} of {} eligible orders on {}",
                scanned - self.config.batch_size,
                scanned,
                pair.symbol()
            );
        }

        let mut report = CycleReport {
            pair: pair.clone(),
            oracle_price: Some(quote.price),
            scanned,
            fills: Vec::new(),
            skips: Vec::new(),
        };

        let evaluator_config = EvaluatorConfig {
            max_price_impact_bps: self.config.max_price_impact_bps,
        };

        for order in eligible.into_iter().take(self.config.batch_size) {
            // A fresh snapshot per order: earlier fills in this cycle have
            // already moved the reserves.
            let snapshot = self.pool.snapshot(pair).await?;

            match evaluate(&order, &quote, &snapshot, &evaluator_config) {
                Decision::NotEligible(SkipReason::EscrowDust) => {
                    // Nothing left worth spending; close the order out.
                    if let Err(e) = self.store.finalize(order.id, now).await {
                        warn!("Failed to finalize exhausted order {}: {}", order.id, e);
                    }
                    report.skips.push(OrderSkip {
                        order_id: order.id,
                        reason: SkipReason::EscrowDust,
                    });
                }
                Decision::NotEligible(reason) => {
                    report.skips.push(OrderSkip {
                        order_id: order.id,
                        reason,
                    });
                }
                Decision::Eligible {
                    input_to_spend,
                    min_output,
                } => match self.settle(&order, input_to_spend, min_output, now).await {
                    Ok(fill) => {
                        info!(
                            "Filled order {} on {}: {} in, {} out",
                            order.id,
                            pair.symbol(),
                            fill.input_consumed,
                            fill.output_received
                        );
                        self.fill_feed.publish(fill.clone());
                        report.fills.push(fill);
                    }
                    Err(Error::SwapFailed(detail)) => {
                        warn!("Swap failed for order {}: {}", order.id, detail);
                        report.skips.push(OrderSkip {
                            order_id: order.id,
                            reason: SkipReason::SwapFailed { detail },
                        });
                    }
                    Err(e) => {
                        // The order's state moved under us; leave it to the
                        // next trigger.
                        warn!("Fill rejected for order {}: {}", order.id, e);
                        report.skips.push(OrderSkip {
                            order_id: order.id,
                            reason: SkipReason::FillRejected {
                                detail: e.to_string(),
                            },
                        });
                    }
                },
            }
        }

        Ok(report)
    }

    async fn settle(
        &self,
        order: &Order,
        input_to_spend: Quantity,
        min_output: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Fill> {
        // Claim the input before touching the pool. The swap is irrevocable,
        // so a cancel racing this fill must not be able to refund escrow the
        // pool is about to consume.
        self.store.claim_fill(order.id, input_to_spend, now).await?;

        let outcome = match self
            .pool
            .swap(&order.pair, order.direction, input_to_spend, min_output)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // The swap never happened; hand the claim back.
                if let Err(release) = self.store.abort_claim(order.id, input_to_spend, now).await {
                    warn!(
                        "Failed to return claimed escrow to order {}: {}",
                        order.id, release
                    );
                }
                return Err(e);
            }
        };

        let unspent = input_to_spend - outcome.input_consumed;
        if unspent > Quantity::ZERO {
            self.store.abort_claim(order.id, unspent, now).await?;
        }

        let mut updated = self
            .store
            .settle_claimed_fill(order.id, outcome.input_consumed, outcome.output_received, now)
            .await?;

        if !order.is_dca()
            && self.config.limit_fill_policy == LimitFillPolicy::ForceComplete
            && updated.is_active()
        {
            updated = self.store.finalize(updated.id, now).await?;
        }

        Ok(Fill::new(
            updated.id,
            updated.pair.clone(),
            updated.direction,
            outcome.input_consumed,
            outcome.output_received,
            updated.status,
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::decimal::dec;
    use common::model::order::PlaceOrderParams;
    use common::model::pair::Direction;
    use market_adapter::{ConstantProductPool, OracleFeed};
    use uuid::Uuid;

    fn eth_usdc() -> Pair {
        Pair::new("ETH", "USDC").unwrap()
    }

    async fn engine_with_order() -> (ExecutionEngine, Pair) {
        let pair = eth_usdc();
        let store = Arc::new(OrderStore::in_memory());
        store.register_pair(pair.clone());

        let owner = Uuid::new_v4();
        store.deposit(owner, "USDC", dec!(20000)).unwrap();
        store
            .place(
                PlaceOrderParams {
                    owner,
                    pair: pair.clone(),
                    direction: Direction::OneForZero,
                    target_base_amount: dec!(6),
                    total_input_amount: dec!(18540),
                    tolerance_bps: 100,
                    interval_minutes: 0,
                    num_intervals: 0,
                    expires_at: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let oracle = Arc::new(OracleFeed::new());
        oracle.publish(pair.clone(), dec!(3090), Utc::now());

        let pool = Arc::new(ConstantProductPool::new());
        pool.add_pool(pair.clone(), dec!(1000000), dec!(3090000000), 0);

        let engine = ExecutionEngine::new(store, oracle, pool, EngineConfig::default());
        (engine, pair)
    }

    #[tokio::test]
    async fn duplicate_trigger_returns_empty_report() {
        let (engine, pair) = engine_with_order().await;

        let guard = engine.cycle_guard(&pair);
        let _held = guard.lock().await;

        let report = engine.execute_orders(&pair, Utc::now()).await.unwrap();
        assert_eq!(report.scanned, 0);
        assert!(report.oracle_price.is_none());
        assert!(report.fills.is_empty());
        assert!(report.skips.is_empty());
    }

    #[tokio::test]
    async fn released_guard_lets_the_next_trigger_run() {
        let (engine, pair) = engine_with_order().await;

        {
            let guard = engine.cycle_guard(&pair);
            let _held = guard.lock().await;
        }

        let report = engine.execute_orders(&pair, Utc::now()).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.fills.len(), 1);
    }
}
