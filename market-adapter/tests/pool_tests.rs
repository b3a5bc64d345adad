use common::decimal::{dec, Quantity};
use common::error::Error;
use common::model::pair::{Direction, Pair};
use market_adapter::{ConstantProductPool, LiquidityPool};

fn eth_usdc() -> Pair {
    Pair::new("ETH", "USDC").unwrap()
}

// 1000 ETH / 3_090_000 USDC, spot price 3090, 30 bps fee
fn seeded_pool() -> ConstantProductPool {
    let pool = ConstantProductPool::new();
    pool.add_pool(eth_usdc(), dec!(1000), dec!(3090000), 30);
    pool
}

#[tokio::test]
async fn spot_price_from_reserves() {
    let pool = seeded_pool();
    assert_eq!(pool.spot_price(&eth_usdc()).unwrap(), dec!(3090));
}

#[tokio::test]
async fn swap_charges_fee_on_input() {
    let pool = seeded_pool();

    // Sell 3090 USDC for ETH: ideal output just under 1 ETH before fee/impact
    let outcome = pool
        .swap(&eth_usdc(), Direction::OneForZero, dec!(3090), Quantity::ZERO)
        .await
        .unwrap();

    assert_eq!(outcome.input_consumed, dec!(3090));
    assert!(outcome.output_received < dec!(1));
    // Fee plus price impact cost stays well under 1%
    assert!(outcome.output_received > dec!(0.99));
}

#[tokio::test]
async fn swap_moves_reserves() {
    let pool = seeded_pool();
    let before = pool.snapshot(&eth_usdc()).await.unwrap();

    let outcome = pool
        .swap(&eth_usdc(), Direction::ZeroForOne, dec!(10), Quantity::ZERO)
        .await
        .unwrap();

    let after = pool.snapshot(&eth_usdc()).await.unwrap();
    assert_eq!(after.reserve0, before.reserve0 + dec!(10));
    assert_eq!(after.reserve1, before.reserve1 - outcome.output_received);
    // The marginal price of asset0 fell after selling it into the pool
    assert!(pool.spot_price(&eth_usdc()).unwrap() < dec!(3090));
}

#[tokio::test]
async fn swap_enforces_min_output() {
    let pool = seeded_pool();

    let result = pool
        .swap(&eth_usdc(), Direction::OneForZero, dec!(3090), dec!(1))
        .await;
    assert!(matches!(result, Err(Error::SwapFailed(_))));

    // The failed swap left the reserves untouched
    let snapshot = pool.snapshot(&eth_usdc()).await.unwrap();
    assert_eq!(snapshot.reserve1, dec!(3090000));
}

#[tokio::test]
async fn swap_rejects_zero_input_and_unknown_pair() {
    let pool = seeded_pool();

    let zero = pool
        .swap(&eth_usdc(), Direction::ZeroForOne, Quantity::ZERO, Quantity::ZERO)
        .await;
    assert!(matches!(zero, Err(Error::SwapFailed(_))));

    let unknown = pool
        .swap(
            &Pair::new("BTC", "USDT").unwrap(),
            Direction::ZeroForOne,
            dec!(1),
            Quantity::ZERO,
        )
        .await;
    assert!(matches!(unknown, Err(Error::PairNotFound(_))));
}
