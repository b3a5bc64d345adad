//! Market adapter: price oracle and liquidity pool boundary
//!
//! The engine only talks to markets through the `PriceOracle` and
//! `LiquidityPool` traits. The implementations here are the in-process
//! collaborators the binary and tests run against: a push-updated quote
//! feed and a constant-product pool simulation.

pub mod oracle;
pub mod pool;

pub use oracle::{OracleFeed, PriceOracle};
pub use pool::{ConstantProductPool, LiquidityPool};
