//! In-memory escrow ledger
//!
//! Tracks per-(owner, asset) balances. Orders never spend funds directly;
//! placement locks input escrow here, cancel unlocks it, and a fill consumes
//! from the locked portion while crediting the output asset.

use common::decimal::Quantity;
use common::error::{Error, Result};
use common::model::escrow::Balance;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Concurrent escrow ledger keyed by (owner, asset)
pub struct EscrowLedger {
    balances: DashMap<(Uuid, String), Balance>,
}

impl EscrowLedger {
    /// Create a new, empty ledger
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
        }
    }

    /// Credit `amount` of `asset` to the owner's available balance
    pub fn deposit(&self, owner: Uuid, asset: &str, amount: Quantity) -> Result<Balance> {
        if amount <= Quantity::ZERO {
            return Err(Error::ValidationError(
                "Deposit amount must be positive".to_string(),
            ));
        }

        let mut balance = self
            .balances
            .entry((owner, asset.to_string()))
            .or_insert_with(|| Balance::new(owner, asset.to_string()));
        balance.deposit(amount);

        debug!("Deposited {} {} for owner {}", amount, asset, owner);
        Ok(balance.clone())
    }

    /// Get the balance for one (owner, asset), zero if never touched
    pub fn balance(&self, owner: Uuid, asset: &str) -> Balance {
        self.balances
            .get(&(owner, asset.to_string()))
            .map(|b| b.clone())
            .unwrap_or_else(|| Balance::new(owner, asset.to_string()))
    }

    /// All balances held by an owner
    pub fn balances_for_owner(&self, owner: Uuid) -> Vec<Balance> {
        let mut balances: Vec<Balance> = self
            .balances
            .iter()
            .filter(|entry| entry.key().0 == owner)
            .map(|entry| entry.value().clone())
            .collect();
        balances.sort_by(|a, b| a.asset.cmp(&b.asset));
        balances
    }

    /// Lock funds behind an order at placement
    pub fn lock(&self, owner: Uuid, asset: &str, amount: Quantity) -> Result<()> {
        let mut balance = self
            .balances
            .entry((owner, asset.to_string()))
            .or_insert_with(|| Balance::new(owner, asset.to_string()));
        balance.lock(amount).map_err(Error::InsufficientEscrow)
    }

    /// Release locked funds back to available (cancel or completion leftover)
    pub fn unlock(&self, owner: Uuid, asset: &str, amount: Quantity) -> Result<()> {
        if amount <= Quantity::ZERO {
            return Ok(());
        }

        let mut balance = self
            .balances
            .get_mut(&(owner, asset.to_string()))
            .ok_or_else(|| {
                Error::Internal(format!("No {} balance for owner {}", asset, owner))
            })?;
        balance.unlock(amount);
        Ok(())
    }

    /// Settle a fill: consume locked input and credit the received output
    pub fn settle_fill(
        &self,
        owner: Uuid,
        input_asset: &str,
        input_consumed: Quantity,
        output_asset: &str,
        output_received: Quantity,
    ) -> Result<()> {
        {
            let mut balance = self
                .balances
                .get_mut(&(owner, input_asset.to_string()))
                .ok_or_else(|| {
                    Error::Internal(format!("No {} balance for owner {}", input_asset, owner))
                })?;
            balance
                .consume_locked(input_consumed)
                .map_err(Error::Internal)?;
        }

        let mut output = self
            .balances
            .entry((owner, output_asset.to_string()))
            .or_insert_with(|| Balance::new(owner, output_asset.to_string()));
        output.deposit(output_received);
        Ok(())
    }
}

impl Default for EscrowLedger {
    fn default() -> Self {
        Self::new()
    }
}
