use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::decimal::{dec, Quantity, TOLERANCE_AGNOSTIC};
use common::error::Error;
use common::model::market::{PoolSnapshot, SwapOutcome};
use common::model::order::{Order, OrderId, OrderStatus, PlaceOrderParams};
use common::model::pair::{Direction, Pair};
use execution_engine::{EngineConfig, ExecutionEngine, LimitFillPolicy, SkipReason};
use market_adapter::{ConstantProductPool, LiquidityPool, OracleFeed};
use order_store::OrderStore;
use uuid::Uuid;

fn eth_usdc() -> Pair {
    Pair::new("ETH", "USDC").unwrap()
}

struct Harness {
    store: Arc<OrderStore>,
    oracle: Arc<OracleFeed>,
    pool: Arc<ConstantProductPool>,
    engine: ExecutionEngine,
    pair: Pair,
    owner: Uuid,
}

/// Deep zero-fee pool at spot 3090 so fills land close to the quote
fn harness(config: EngineConfig) -> Harness {
    let pair = eth_usdc();
    let store = Arc::new(OrderStore::in_memory());
    store.register_pair(pair.clone());

    let owner = Uuid::new_v4();
    store.deposit(owner, "USDC", dec!(100000)).unwrap();

    let oracle = Arc::new(OracleFeed::new());
    let pool = Arc::new(ConstantProductPool::new());
    pool.add_pool(pair.clone(), dec!(1000000), dec!(3090000000), 0);

    let engine = ExecutionEngine::new(
        store.clone(),
        oracle.clone(),
        pool.clone(),
        config,
    );

    Harness {
        store,
        oracle,
        pool,
        engine,
        pair,
        owner,
    }
}

// Buy 6 ETH with 18540 USDC escrow: implied reference price 3090
fn buy_six_eth(owner: Uuid, tolerance_bps: u32, interval_minutes: u32, num_intervals: u32) -> PlaceOrderParams {
    PlaceOrderParams {
        owner,
        pair: eth_usdc(),
        direction: Direction::OneForZero,
        target_base_amount: dec!(6),
        total_input_amount: dec!(18540),
        tolerance_bps,
        interval_minutes,
        num_intervals,
        expires_at: None,
    }
}

async fn place(h: &Harness, params: PlaceOrderParams) -> Order {
    h.store.place(params, Utc::now()).await.unwrap()
}

#[tokio::test]
async fn in_band_limit_order_fills_to_completion() {
    let h = harness(EngineConfig::default());
    let order = place(&h, buy_six_eth(h.owner, 100, 0, 0)).await;

    let now = Utc::now();
    h.oracle.publish(h.pair.clone(), dec!(3090), now);

    let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.oracle_price, Some(dec!(3090)));

    // All 18540 USDC of escrow was spent, completing the order
    let done = h.store.get_order(order.id).await.unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.remaining_input_amount, Quantity::ZERO);
    assert!(done.filled_base_amount > dec!(5.99));

    let eth = h.store.balance(h.owner, "ETH");
    assert_eq!(eth.available, done.filled_base_amount);
    assert_eq!(h.store.balance(h.owner, "USDC").locked, Quantity::ZERO);
}

#[tokio::test]
async fn out_of_band_order_is_untouched() {
    let h = harness(EngineConfig::default());
    let order = place(&h, buy_six_eth(h.owner, 100, 0, 0)).await;

    let now = Utc::now();
    // 3.5% above the 3090 reference, outside the 1% band
    h.oracle.publish(h.pair.clone(), dec!(3198), now);

    let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
    assert!(report.fills.is_empty());
    assert_eq!(report.skips.len(), 1);
    assert!(matches!(
        report.skips[0].reason,
        SkipReason::OutOfBand { .. }
    ));

    let untouched = h.store.get_order(order.id).await.unwrap();
    assert_eq!(untouched.status, OrderStatus::Active);
    assert_eq!(untouched.filled_base_amount, Quantity::ZERO);
    assert_eq!(untouched.remaining_input_amount, dec!(18540));
}

#[tokio::test]
async fn dca_completes_over_six_ticks() {
    let h = harness(EngineConfig::default());
    let order = place(&h, buy_six_eth(h.owner, 100, 5, 6)).await;

    let start = Utc::now();
    for tick in 0..6 {
        let now = start + Duration::minutes(5 * tick);
        h.oracle.publish(h.pair.clone(), dec!(3090), now);
        let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
        assert_eq!(report.fills.len(), 1, "tick {} should fill", tick);
    }

    let done = h.store.get_order(order.id).await.unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.remaining_input_amount, Quantity::ZERO);
    assert!(done.filled_base_amount > dec!(5.999));

    // A further tick finds nothing to do
    let now = start + Duration::minutes(30);
    h.oracle.publish(h.pair.clone(), dec!(3090), now);
    let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
    assert_eq!(report.scanned, 0);
}

#[tokio::test]
async fn dca_early_tick_is_not_eligible() {
    let h = harness(EngineConfig::default());
    let order = place(&h, buy_six_eth(h.owner, 100, 5, 6)).await;

    let start = Utc::now();
    h.oracle.publish(h.pair.clone(), dec!(3090), start);
    let report = h.engine.execute_orders(&h.pair, start).await.unwrap();
    assert_eq!(report.fills.len(), 1);

    // One minute later the interval gate is still closed
    let early = start + Duration::minutes(1);
    h.oracle.publish(h.pair.clone(), dec!(3090), early);
    let report = h.engine.execute_orders(&h.pair, early).await.unwrap();
    assert_eq!(report.scanned, 0);
    assert!(report.fills.is_empty());

    let after = h.store.get_order(order.id).await.unwrap();
    assert!(after.filled_base_amount < dec!(1.01));
}

#[tokio::test]
async fn price_agnostic_dca_fills_off_reference() {
    let h = harness(EngineConfig::default());
    let order = place(&h, buy_six_eth(h.owner, TOLERANCE_AGNOSTIC, 5, 6)).await;

    let now = Utc::now();
    // Far above the implied 3090 reference; a banded order would skip
    h.oracle.publish(h.pair.clone(), dec!(4000), now);

    let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
    assert_eq!(report.fills.len(), 1);

    let after = h.store.get_order(order.id).await.unwrap();
    assert!(after.filled_base_amount > dec!(0.99));
    assert_eq!(after.remaining_input_amount, dec!(18540) - dec!(4000));
}

#[tokio::test]
async fn swap_failure_is_isolated_per_order() {
    let h = harness(EngineConfig::default());
    // Shallow pool with a 30 bps fee: a tight min-output cannot be met
    h.pool
        .add_pool(h.pair.clone(), dec!(1000), dec!(3090000), 30);

    // 1 bps band demands nearly the reference price; the fee alone breaks it
    let strict = place(&h, buy_six_eth(h.owner, 1, 0, 0)).await;
    // Price-agnostic tranche tolerates the fee and impact
    let lenient = place(&h, buy_six_eth(h.owner, TOLERANCE_AGNOSTIC, 5, 6)).await;

    let now = Utc::now();
    h.oracle.publish(h.pair.clone(), dec!(3090), now);

    let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
    assert_eq!(report.skips.len(), 1);
    assert_eq!(report.skips[0].order_id, strict.id);
    assert!(matches!(
        report.skips[0].reason,
        SkipReason::SwapFailed { .. }
    ));
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].order_id, lenient.id);

    // The failed order kept all of its state
    let untouched = h.store.get_order(strict.id).await.unwrap();
    assert_eq!(untouched.status, OrderStatus::Active);
    assert_eq!(untouched.remaining_input_amount, dec!(18540));
}

#[tokio::test]
async fn stale_quote_aborts_the_cycle() {
    let h = harness(EngineConfig::default());
    let order = place(&h, buy_six_eth(h.owner, 100, 0, 0)).await;

    let now = Utc::now();
    h.oracle
        .publish(h.pair.clone(), dec!(3090), now - Duration::seconds(120));

    let result = h.engine.execute_orders(&h.pair, now).await;
    assert!(matches!(result, Err(Error::StalePrice(_))));

    let untouched = h.store.get_order(order.id).await.unwrap();
    assert_eq!(untouched.filled_base_amount, Quantity::ZERO);
}

#[tokio::test]
async fn batch_limit_defers_excess_orders() {
    let h = harness(EngineConfig {
        batch_size: 1,
        ..EngineConfig::default()
    });

    let first = place(
        &h,
        PlaceOrderParams {
            target_base_amount: dec!(1),
            total_input_amount: dec!(3090),
            ..buy_six_eth(h.owner, 100, 0, 0)
        },
    )
    .await;
    let second = place(
        &h,
        PlaceOrderParams {
            target_base_amount: dec!(1),
            total_input_amount: dec!(3090),
            ..buy_six_eth(h.owner, 100, 0, 0)
        },
    )
    .await;

    let now = Utc::now();
    h.oracle.publish(h.pair.clone(), dec!(3090), now);

    let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].order_id, first.id);

    // The deferred order rides the next trigger
    let later = now + Duration::seconds(10);
    h.oracle.publish(h.pair.clone(), dec!(3090), later);
    let report = h.engine.execute_orders(&h.pair, later).await.unwrap();
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].order_id, second.id);
}

#[tokio::test]
async fn remain_active_keeps_partially_filled_limit_order() {
    // A 10 bps impact cap clamps each fill to 3090 USDC of input
    let h = harness(EngineConfig {
        max_price_impact_bps: 10,
        ..EngineConfig::default()
    });
    h.pool.add_pool(h.pair.clone(), dec!(1000), dec!(3090000), 0);

    let order = place(&h, buy_six_eth(h.owner, 100, 0, 0)).await;
    let now = Utc::now();
    h.oracle.publish(h.pair.clone(), dec!(3090), now);

    let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
    assert_eq!(report.fills.len(), 1);

    let after = h.store.get_order(order.id).await.unwrap();
    assert_eq!(after.status, OrderStatus::Active);
    assert_eq!(after.remaining_input_amount, dec!(15450));
    assert!(after.filled_base_amount < dec!(6));
}

#[tokio::test]
async fn force_complete_closes_limit_order_on_first_fill() {
    let h = harness(EngineConfig {
        max_price_impact_bps: 10,
        limit_fill_policy: LimitFillPolicy::ForceComplete,
        ..EngineConfig::default()
    });
    h.pool.add_pool(h.pair.clone(), dec!(1000), dec!(3090000), 0);

    let order = place(&h, buy_six_eth(h.owner, 100, 0, 0)).await;
    let now = Utc::now();
    h.oracle.publish(h.pair.clone(), dec!(3090), now);

    let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].new_status, OrderStatus::Completed);

    let after = h.store.get_order(order.id).await.unwrap();
    assert_eq!(after.status, OrderStatus::Completed);

    // Leftover escrow went back to available: 100000 - 3090 spent
    let usdc = h.store.balance(h.owner, "USDC");
    assert_eq!(usdc.locked, Quantity::ZERO);
    assert_eq!(usdc.available, dec!(96910));
}

#[tokio::test]
async fn fills_are_broadcast_on_the_feed() {
    let h = harness(EngineConfig::default());
    let order = place(&h, buy_six_eth(h.owner, 100, 0, 0)).await;

    let mut fills = h.engine.subscribe_fills();
    let now = Utc::now();
    h.oracle.publish(h.pair.clone(), dec!(3090), now);
    h.engine.execute_orders(&h.pair, now).await.unwrap();

    let fill = fills.recv().await.unwrap();
    assert_eq!(fill.order_id, order.id);
    assert_eq!(fill.input_consumed, dec!(18540));
    assert!(fill.execution_price > dec!(3090));
}

/// Pool that cancels a chosen order partway through the cycle, standing in
/// for an owner cancel racing the engine.
struct CancelRacingPool {
    inner: Arc<ConstantProductPool>,
    store: Arc<OrderStore>,
    victim: OrderId,
    owner: Uuid,
    cancel_during_swap: bool,
}

#[async_trait]
impl LiquidityPool for CancelRacingPool {
    async fn snapshot(&self, pair: &Pair) -> common::error::Result<PoolSnapshot> {
        if !self.cancel_during_swap {
            self.store
                .cancel(self.victim, self.owner, Utc::now())
                .await
                .unwrap();
        }
        self.inner.snapshot(pair).await
    }

    async fn swap(
        &self,
        pair: &Pair,
        direction: Direction,
        input: Quantity,
        min_output: Quantity,
    ) -> common::error::Result<SwapOutcome> {
        if self.cancel_during_swap {
            self.store
                .cancel(self.victim, self.owner, Utc::now())
                .await
                .unwrap();
        }
        self.inner.swap(pair, direction, input, min_output).await
    }
}

fn racing_setup() -> (Arc<OrderStore>, Arc<OracleFeed>, Arc<ConstantProductPool>, Pair, Uuid) {
    let pair = eth_usdc();
    let store = Arc::new(OrderStore::in_memory());
    store.register_pair(pair.clone());

    let owner = Uuid::new_v4();
    store.deposit(owner, "USDC", dec!(20000)).unwrap();

    let inner = Arc::new(ConstantProductPool::new());
    inner.add_pool(pair.clone(), dec!(1000000), dec!(3090000000), 0);

    let oracle = Arc::new(OracleFeed::new());
    (store, oracle, inner, pair, owner)
}

#[tokio::test]
async fn cancel_during_swap_still_pays_the_output() {
    let (store, oracle, inner, pair, owner) = racing_setup();
    let order = store
        .place(buy_six_eth(owner, 100, 0, 0), Utc::now())
        .await
        .unwrap();

    let pool = Arc::new(CancelRacingPool {
        inner: inner.clone(),
        store: store.clone(),
        victim: order.id,
        owner,
        cancel_during_swap: true,
    });

    let now = Utc::now();
    oracle.publish(pair.clone(), dec!(3090), now);

    let engine = ExecutionEngine::new(store.clone(), oracle, pool, EngineConfig::default());
    let report = engine.execute_orders(&pair, now).await.unwrap();

    // The input was claimed before the swap, so the cancel could not refund
    // what the pool consumed; the output still belongs to the owner.
    assert_eq!(report.fills.len(), 1);
    assert_eq!(report.fills[0].new_status, OrderStatus::Cancelled);

    let after = store.get_order(order.id).await.unwrap();
    assert_eq!(after.status, OrderStatus::Cancelled);

    let usdc = store.balance(owner, "USDC");
    assert_eq!(usdc.available, dec!(1460));
    assert_eq!(usdc.locked, Quantity::ZERO);
    assert!(store.balance(owner, "ETH").available > dec!(5.99));

    // The pool paid the owner, not the void
    let reserves = inner.snapshot(&pair).await.unwrap();
    assert!(reserves.reserve0 < dec!(1000000));
}

#[tokio::test]
async fn cancel_before_settlement_rejects_the_fill() {
    let (store, oracle, inner, pair, owner) = racing_setup();
    let order = store
        .place(buy_six_eth(owner, 100, 0, 0), Utc::now())
        .await
        .unwrap();

    let pool = Arc::new(CancelRacingPool {
        inner: inner.clone(),
        store: store.clone(),
        victim: order.id,
        owner,
        cancel_during_swap: false,
    });

    let now = Utc::now();
    oracle.publish(pair.clone(), dec!(3090), now);

    let engine = ExecutionEngine::new(store.clone(), oracle, pool, EngineConfig::default());
    let report = engine.execute_orders(&pair, now).await.unwrap();

    assert!(report.fills.is_empty());
    assert_eq!(report.skips.len(), 1);
    assert!(matches!(
        report.skips[0].reason,
        SkipReason::FillRejected { .. }
    ));

    // Nothing moved: the pool is untouched and the full escrow came back
    let reserves = inner.snapshot(&pair).await.unwrap();
    assert_eq!(reserves.reserve0, dec!(1000000));

    let usdc = store.balance(owner, "USDC");
    assert_eq!(usdc.available, dec!(20000));
    assert_eq!(usdc.locked, Quantity::ZERO);
}

#[tokio::test]
async fn escrow_is_conserved_through_fills() {
    let h = harness(EngineConfig::default());
    let order = place(&h, buy_six_eth(h.owner, 100, 5, 6)).await;

    let start = Utc::now();
    let mut consumed = Quantity::ZERO;
    for tick in 0..3 {
        let now = start + Duration::minutes(5 * tick);
        h.oracle.publish(h.pair.clone(), dec!(3090), now);
        let report = h.engine.execute_orders(&h.pair, now).await.unwrap();
        for fill in &report.fills {
            consumed += fill.input_consumed;
        }

        let current = h.store.get_order(order.id).await.unwrap();
        assert_eq!(
            current.remaining_input_amount + consumed,
            current.total_input_amount
        );
    }
}
