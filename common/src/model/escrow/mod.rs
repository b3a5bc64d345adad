//! Escrow balance model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Quantity;
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Escrow balance for one (owner, asset) pair.
///
/// `total == available + locked` at all times. Placement locks funds, a
/// cancel unlocks them, and a fill consumes from the locked portion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Balance {
    /// Owning account
    pub owner: Uuid,
    /// Asset symbol (e.g. "ETH", "USDC")
    pub asset: String,
    /// Total balance
    pub total: Quantity,
    /// Balance not locked behind an open order
    pub available: Quantity,
    /// Balance locked behind open orders
    pub locked: Quantity,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Create a new balance with zero amounts
    pub fn new(owner: Uuid, asset: String) -> Self {
        Self {
            owner,
            asset,
            total: Quantity::ZERO,
            available: Quantity::ZERO,
            locked: Quantity::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Add funds to the available balance
    pub fn deposit(&mut self, amount: Quantity) {
        self.total += amount;
        self.available += amount;
        self.updated_at = Utc::now();
    }

    /// Lock funds behind an order
    pub fn lock(&mut self, amount: Quantity) -> Result<(), String> {
        if amount > self.available {
            return Err(format!(
                "Insufficient balance: {} {} available",
                self.available, self.asset
            ));
        }
        self.available -= amount;
        self.locked += amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Unlock funds (on order cancel or expiry)
    pub fn unlock(&mut self, amount: Quantity) {
        self.locked -= amount;
        self.available += amount;
        self.updated_at = Utc::now();
    }

    /// Consume locked funds (on a fill settling)
    pub fn consume_locked(&mut self, amount: Quantity) -> Result<(), String> {
        if amount > self.locked {
            return Err(format!(
                "Insufficient locked funds: {} {} locked",
                self.locked, self.asset
            ));
        }
        self.locked -= amount;
        self.total -= amount;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::dec;

    #[test]
    fn lock_unlock_round_trip() {
        let mut balance = Balance::new(Uuid::new_v4(), "USDC".to_string());
        balance.deposit(dec!(100));
        balance.lock(dec!(60)).unwrap();
        assert_eq!(balance.available, dec!(40));
        assert_eq!(balance.locked, dec!(60));

        balance.unlock(dec!(60));
        assert_eq!(balance.available, dec!(100));
        assert_eq!(balance.total, dec!(100));
    }

    #[test]
    fn consume_reduces_total() {
        let mut balance = Balance::new(Uuid::new_v4(), "USDC".to_string());
        balance.deposit(dec!(100));
        balance.lock(dec!(100)).unwrap();
        balance.consume_locked(dec!(30)).unwrap();
        assert_eq!(balance.total, dec!(70));
        assert_eq!(balance.locked, dec!(70));
        assert!(balance.consume_locked(dec!(80)).is_err());
    }

    #[test]
    fn lock_rejects_overdraw() {
        let mut balance = Balance::new(Uuid::new_v4(), "ETH".to_string());
        balance.deposit(dec!(1));
        assert!(balance.lock(dec!(2)).is_err());
        assert_eq!(balance.available, dec!(1));
    }
}
