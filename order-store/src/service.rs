//! Order store service
//!
//! Owns placement validation, the order lifecycle state machine, and the
//! coupling between order records and escrow. All mutations go through the
//! repository's active-only update so a cancel racing a fill resolves to a
//! clean `OrderNotActive` for whichever writer arrives second. A fill claims
//! its input before the swap runs, so a cancel landing mid-swap can only
//! refund the unclaimed remainder.

use std::sync::Arc;

use common::decimal::{Quantity, BPS_DENOMINATOR, TOLERANCE_AGNOSTIC};
use common::error::{Error, ErrorExt, Result};
use common::model::escrow::Balance;
use common::model::order::{Order, OrderId, OrderStatus, PlaceOrderParams};
use common::model::pair::Pair;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ledger::EscrowLedger;
use crate::repository::{InMemoryOrderRepository, OrderRepository, PostgresOrderRepository};

/// Repository backend selection
pub enum RepositoryType {
    /// In-memory repository
    InMemory,
    /// PostgreSQL repository with optional connection string
    Postgres(Option<String>),
}

/// Order store service
pub struct OrderStore {
    /// Repository for order storage
    repository: Arc<dyn OrderRepository>,
    /// Escrow ledger for owner balances
    ledger: EscrowLedger,
    /// Registered trading pairs
    pairs: DashSet<Pair>,
}

impl OrderStore {
    /// Create a new order store with the specified repository type
    pub async fn new(repository_type: RepositoryType) -> Result<Self> {
        let repository: Arc<dyn OrderRepository> = match repository_type {
            RepositoryType::InMemory => {
                info!("Creating order store with in-memory repository");
                Arc::new(InMemoryOrderRepository::new())
            }
            RepositoryType::Postgres(database_url) => {
                info!("Creating order store with PostgreSQL repository");
                Arc::new(PostgresOrderRepository::new(database_url).await?)
            }
        };

        Ok(Self::with_repository(repository))
    }

    /// Create a new order store backed by the in-memory repository
    pub fn in_memory() -> Self {
        Self::with_repository(Arc::new(InMemoryOrderRepository::new()))
    }

    /// Create a new order store with a provided repository
    pub fn with_repository(repository: Arc<dyn OrderRepository>) -> Self {
        Self {
            repository,
            ledger: EscrowLedger::new(),
            pairs: DashSet::new(),
        }
    }

    /// Register a trading pair so orders can be placed against it
    pub fn register_pair(&self, pair: Pair) {
        if self.pairs.insert(pair.clone()) {
            info!("Registered pair {}", pair.symbol());
        }
    }

    /// All registered pairs, sorted by symbol
    pub fn pairs(&self) -> Vec<Pair> {
        let mut pairs: Vec<Pair> = self.pairs.iter().map(|p| p.clone()).collect();
        pairs.sort_by_key(|p| p.symbol());
        pairs
    }

    fn ensure_pair(&self, pair: &Pair) -> Result<()> {
        if self.pairs.contains(pair) {
            Ok(())
        } else {
            Err(Error::PairNotFound(pair.symbol()))
        }
    }

    /// Fund an owner's escrow account
    pub fn deposit(&self, owner: Uuid, asset: &str, amount: Quantity) -> Result<Balance> {
        self.ledger.deposit(owner, asset, amount)
    }

    /// The owner's balance in one asset
    pub fn balance(&self, owner: Uuid, asset: &str) -> Balance {
        self.ledger.balance(owner, asset)
    }

    /// All escrow balances held by an owner
    pub fn balances(&self, owner: Uuid) -> Vec<Balance> {
        self.ledger.balances_for_owner(owner)
    }

    fn validate_placement(&self, params: &PlaceOrderParams, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pair(&params.pair)?;

        if params.target_base_amount <= Quantity::ZERO {
            return Err(Error::InvalidOrderParameters(
                "Target amount must be positive".to_string(),
            ));
        }

        // The escrow floor: input must at least cover the target amount.
        if params.total_input_amount < params.target_base_amount {
            return Err(Error::InvalidOrderParameters(format!(
                "Total input {} does not cover target {}",
                params.total_input_amount, params.target_base_amount
            )));
        }

        let is_dca = params.interval_minutes > 0;
        if params.tolerance_bps == TOLERANCE_AGNOSTIC {
            // Price-agnostic execution only makes sense on a schedule.
            if !is_dca {
                return Err(Error::InvalidOrderParameters(
                    "Price-agnostic tolerance requires a recurring schedule".to_string(),
                ));
            }
        } else if params.tolerance_bps > BPS_DENOMINATOR {
            return Err(Error::InvalidOrderParameters(format!(
                "Tolerance {} bps exceeds {} bps",
                params.tolerance_bps, BPS_DENOMINATOR
            )));
        }

        if is_dca && params.num_intervals == 0 {
            return Err(Error::InvalidOrderParameters(
                "A recurring order needs at least one interval".to_string(),
            ));
        }

        if let Some(expires_at) = params.expires_at {
            if expires_at <= now {
                return Err(Error::InvalidOrderParameters(
                    "Expiry must be in the future".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Place a new order, locking its input escrow atomically with insertion
    pub async fn place(&self, params: PlaceOrderParams, now: DateTime<Utc>) -> Result<Order> {
        self.validate_placement(&params, now)?;

        let input_asset = params.direction.input_asset(&params.pair).to_string();
        let owner = params.owner;
        let amount = params.total_input_amount;

        self.ledger
            .lock(owner, &input_asset, amount)
            .with_context(|| "Failed to lock escrow for placement")?;

        let id = match self.repository.next_order_id().await {
            Ok(id) => id,
            Err(e) => {
                self.ledger.unlock(owner, &input_asset, amount)?;
                return Err(e);
            }
        };

        let order = Order::new(id, params, now);
        match self.repository.insert_order(order).await {
            Ok(order) => {
                info!(
                    "Placed order {} on {} ({:?}, target {})",
                    order.id,
                    order.pair.symbol(),
                    order.direction,
                    order.target_base_amount
                );
                Ok(order)
            }
            Err(e) => {
                // Placement is all-or-nothing: release the lock taken above.
                self.ledger.unlock(owner, &input_asset, amount)?;
                Err(e)
            }
        }
    }

    /// Get an order by ID
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.repository
            .get_order(id)
            .await?
            .ok_or_else(|| Error::OrderNotFound(id.to_string()))
    }

    /// All orders placed by an owner
    pub async fn orders_by_owner(&self, owner: Uuid) -> Result<Vec<Order>> {
        self.repository.orders_by_owner(owner).await
    }

    /// Cancel an order, releasing its remaining escrow
    pub async fn cancel(&self, id: OrderId, caller: Uuid, now: DateTime<Utc>) -> Result<Order> {
        let mut order = self.get_order(id).await?;

        if order.owner != caller {
            return Err(Error::Unauthorized(format!(
                "Caller {} does not own order {}",
                caller, id
            )));
        }

        if !order.is_active() {
            return Err(Error::OrderNotActive(format!(
                "Order {} is {}",
                id,
                order.status.as_str()
            )));
        }

        order.status = OrderStatus::Cancelled;
        order.updated_at = now;

        let order = self.repository.update_if_active(order).await?;
        self.release_remaining_escrow(&order)?;

        info!(
            "Cancelled order {}, released {} {}",
            order.id,
            order.remaining_input_amount,
            order.direction.input_asset(&order.pair)
        );
        Ok(order)
    }

    /// Reserve part of an active order's remaining escrow for a swap that is
    /// about to execute.
    ///
    /// The claimed amount stays locked in the ledger but leaves the order's
    /// refundable remainder, so a cancel landing while the swap is in flight
    /// releases everything except what the pool is about to consume.
    pub async fn claim_fill(
        &self,
        id: OrderId,
        input: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let mut order = self.get_order(id).await?;

        if !order.is_active() {
            return Err(Error::OrderNotActive(format!(
                "Order {} is {}",
                id,
                order.status.as_str()
            )));
        }

        if input > order.remaining_input_amount {
            return Err(Error::EscrowExhausted(format!(
                "Fill needs {} but order {} has {} remaining",
                input, id, order.remaining_input_amount
            )));
        }

        order.remaining_input_amount -= input;
        order.updated_at = now;

        let order = self.repository.update_if_active(order).await?;
        debug!(
            "Claimed {} {} from order {}",
            input,
            order.direction.input_asset(&order.pair),
            order.id
        );
        Ok(order)
    }

    /// Return a claimed amount after the swap did not happen.
    ///
    /// While the order is still active the amount rejoins its remaining
    /// escrow; if it reached a terminal state in the meantime, its cancel
    /// released only the unclaimed remainder, so the amount is unlocked
    /// straight back to the owner.
    pub async fn abort_claim(&self, id: OrderId, input: Quantity, now: DateTime<Utc>) -> Result<()> {
        let order = self.get_order(id).await?;
        let owner = order.owner;
        let input_asset = order.direction.input_asset(&order.pair).to_string();

        if order.is_active() {
            let mut updated = order;
            updated.remaining_input_amount += input;
            updated.updated_at = now;
            match self.repository.update_if_active(updated).await {
                Ok(_) => return Ok(()),
                Err(Error::OrderNotActive(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.ledger.unlock(owner, &input_asset, input)
    }

    /// Settle the ledger and the order record after a swap executed against
    /// a claimed amount.
    ///
    /// The ledger settlement is unconditional: the input is spent and the
    /// output belongs to the owner even when the order was cancelled while
    /// the swap was in flight. Only an active record picks up the fill
    /// bookkeeping and the Completed transition.
    pub async fn settle_claimed_fill(
        &self,
        id: OrderId,
        input_consumed: Quantity,
        output_received: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let order = self.get_order(id).await?;

        let input_asset = order.direction.input_asset(&order.pair).to_string();
        let output_asset = order.direction.output_asset(&order.pair).to_string();
        self.ledger.settle_fill(
            order.owner,
            &input_asset,
            input_consumed,
            &output_asset,
            output_received,
        )?;

        if !order.is_active() {
            debug!(
                "Order {} went {} while its swap was in flight; ledger settled",
                id,
                order.status.as_str()
            );
            return Ok(order);
        }

        let mut updated = order;
        updated.filled_base_amount =
            (updated.filled_base_amount + output_received).min(updated.target_base_amount);
        updated.last_execution_at = Some(now);
        updated.updated_at = now;

        if updated.filled_base_amount >= updated.target_base_amount
            || updated.remaining_input_amount <= Quantity::ZERO
        {
            updated.status = OrderStatus::Completed;
        }

        let tx = self.repository.begin_transaction().await?;
        let result = async {
            let order = self.repository.update_if_active(updated).await?;

            if order.status == OrderStatus::Completed {
                self.release_remaining_escrow(&order)?;
            }

            Ok(order)
        }
        .await;

        match result {
            Ok(order) => {
                tx.commit().await?;
                debug!(
                    "Applied fill to order {}: spent {}, received {}, now {}",
                    order.id,
                    input_consumed,
                    output_received,
                    order.status.as_str()
                );
                Ok(order)
            }
            Err(Error::OrderNotActive(_)) => {
                // The record turned terminal between the fetch above and the
                // write; the ledger settlement stands either way.
                tx.rollback().await?;
                self.get_order(id).await
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Record a successful swap against an order in one step.
    ///
    /// Claims the input, consumes locked escrow, credits the output asset to
    /// the owner, and transitions the order to Completed when the target is
    /// reached or the escrow runs out.
    pub async fn apply_fill(
        &self,
        id: OrderId,
        input_consumed: Quantity,
        output_received: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        self.claim_fill(id, input_consumed, now).await?;
        self.settle_claimed_fill(id, input_consumed, output_received, now)
            .await
    }

    /// Force an active order into the Completed state, releasing leftover
    /// escrow. Used for single-shot orders under a complete-on-first-fill
    /// policy and for orders whose escrow can no longer buy anything.
    pub async fn finalize(&self, id: OrderId, now: DateTime<Utc>) -> Result<Order> {
        let mut order = self.get_order(id).await?;
        if !order.is_active() {
            return Ok(order);
        }

        order.status = OrderStatus::Completed;
        order.updated_at = now;

        let order = self.repository.update_if_active(order).await?;
        self.release_remaining_escrow(&order)?;

        info!("Finalized order {} as completed", order.id);
        Ok(order)
    }

    /// Active orders for a pair, in insertion order, whose interval gate
    /// holds. Expired orders encountered along the way are auto-cancelled
    /// with their escrow released.
    pub async fn eligible_orders(&self, pair: &Pair, now: DateTime<Utc>) -> Result<Vec<Order>> {
        self.ensure_pair(pair)?;

        let mut eligible = Vec::new();
        for order in self.repository.active_orders_for_pair(pair).await? {
            if order.is_expired(now) {
                if let Err(e) = self.expire(order, now).await {
                    warn!("Failed to expire order: {}", e);
                }
                continue;
            }

            if !order.interval_elapsed(now) {
                continue;
            }

            eligible.push(order);
        }

        Ok(eligible)
    }

    async fn expire(&self, mut order: Order, now: DateTime<Utc>) -> Result<()> {
        let id = order.id;
        order.status = OrderStatus::Cancelled;
        order.updated_at = now;

        let order = self.repository.update_if_active(order).await?;
        self.release_remaining_escrow(&order)?;

        info!("Order {} expired, escrow released", id);
        Ok(())
    }

    fn release_remaining_escrow(&self, order: &Order) -> Result<()> {
        let input_asset = order.direction.input_asset(&order.pair);
        self.ledger
            .unlock(order.owner, input_asset, order.remaining_input_amount)
    }
}
