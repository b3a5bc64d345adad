//! Price oracle boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::decimal::Price;
use common::error::{Error, Result};
use common::model::market::PriceQuote;
use common::model::pair::Pair;
use dashmap::DashMap;
use tracing::debug;

/// Source of external price quotes.
///
/// Quotes are always denominated in asset1 per asset0. Freshness is the
/// caller's concern; the oracle returns whatever it last saw.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Latest quote for a pair
    async fn price(&self, pair: &Pair) -> Result<PriceQuote>;
}

/// Push-updated oracle feed holding the latest quote per pair
pub struct OracleFeed {
    quotes: DashMap<Pair, PriceQuote>,
}

impl OracleFeed {
    /// Create a new, empty feed
    pub fn new() -> Self {
        Self {
            quotes: DashMap::new(),
        }
    }

    /// Publish a quote, replacing any previous quote for the pair
    pub fn publish(&self, pair: Pair, price: Price, timestamp: DateTime<Utc>) {
        debug!("Quote {} = {} at {}", pair.symbol(), price, timestamp);
        self.quotes.insert(
            pair.clone(),
            PriceQuote {
                pair,
                price,
                timestamp,
            },
        );
    }
}

impl Default for OracleFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceOracle for OracleFeed {
    async fn price(&self, pair: &Pair) -> Result<PriceQuote> {
        self.quotes
            .get(pair)
            .map(|q| q.clone())
            .ok_or_else(|| Error::PairNotFound(format!("No quote for {}", pair.symbol())))
    }
}
