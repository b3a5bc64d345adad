//! Repository for order records

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use common::db::{InMemoryTransactionManager, PgTransactionManager};
use common::decimal::Quantity;
use common::error::{Error, Result};
use common::model::order::{DcaSchedule, Order, OrderId, OrderStatus};
use common::model::pair::{Direction, Pair};
use common::{DBTransaction, TransactionManager};
use dashmap::DashMap;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

/// Order repository trait defining the interface for order storage
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Get the transaction manager
    fn transaction_manager(&self) -> &dyn TransactionManager;

    /// Reserve the next order id from the monotone sequence
    async fn next_order_id(&self) -> Result<OrderId>;

    /// Insert a newly placed order
    async fn insert_order(&self, order: Order) -> Result<Order>;

    /// Get an order by ID
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Get all orders placed by an owner
    async fn orders_by_owner(&self, owner: Uuid) -> Result<Vec<Order>>;

    /// Active orders for a pair, in insertion order. Terminal orders never
    /// come back from this scan, so its cost tracks the number of open
    /// orders rather than the pair's full history.
    async fn active_orders_for_pair(&self, pair: &Pair) -> Result<Vec<Order>>;

    /// Replace an order's record, but only while the stored copy is still
    /// Active. This is the optimistic check that resolves a cancel racing a
    /// fill: whichever writer observes the other's terminal state fails with
    /// `OrderNotActive`.
    async fn update_if_active(&self, order: Order) -> Result<Order>;

    /// Begin a database transaction
    async fn begin_transaction(&self) -> Result<DBTransaction> {
        self.transaction_manager().begin_transaction().await
    }
}

/// In-memory repository for order records
pub struct InMemoryOrderRepository {
    /// Orders by ID
    orders: DashMap<OrderId, Order>,
    /// Per-pair index of order ids, in insertion order
    pair_index: DashMap<Pair, Vec<OrderId>>,
    /// Monotone id sequence
    sequence: AtomicU64,
    /// Transaction manager
    transaction_manager: InMemoryTransactionManager,
}

impl InMemoryOrderRepository {
    /// Create a new in-memory order repository
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            pair_index: DashMap::new(),
            sequence: AtomicU64::new(1),
            transaction_manager: InMemoryTransactionManager::new(),
        }
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    fn transaction_manager(&self) -> &dyn TransactionManager {
        &self.transaction_manager
    }

    async fn next_order_id(&self) -> Result<OrderId> {
        Ok(OrderId(self.sequence.fetch_add(1, Ordering::SeqCst)))
    }

    async fn insert_order(&self, order: Order) -> Result<Order> {
        self.pair_index
            .entry(order.pair.clone())
            .or_default()
            .push(order.id);
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.get(&id).map(|o| o.clone()))
    }

    async fn orders_by_owner(&self, owner: Uuid) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.value().owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }

    async fn active_orders_for_pair(&self, pair: &Pair) -> Result<Vec<Order>> {
        let mut ids = match self.pair_index.get_mut(pair) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };

        // Terminal ids are dropped from the index as the scan passes them
        let mut orders = Vec::new();
        ids.retain(|id| match self.orders.get(id) {
            Some(order) if order.is_active() => {
                orders.push(order.clone());
                true
            }
            _ => false,
        });
        Ok(orders)
    }

    async fn update_if_active(&self, order: Order) -> Result<Order> {
        let mut stored = self
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| Error::OrderNotFound(format!("Order not found: {}", order.id)))?;

        if stored.status != OrderStatus::Active {
            return Err(Error::OrderNotActive(format!(
                "Order {} is {}",
                order.id,
                stored.status.as_str()
            )));
        }

        *stored = order.clone();
        Ok(order)
    }
}

/// PostgreSQL repository for order records
pub struct PostgresOrderRepository {
    /// Database connection pool
    pool: PgPool,
    /// Transaction manager
    transaction_manager: PgTransactionManager,
}

impl PostgresOrderRepository {
    /// Create a new PostgreSQL order repository
    pub async fn new(database_url: Option<String>) -> Result<Self> {
        let url = match database_url {
            Some(url) => url,
            None => std::env::var("DATABASE_URL")
                .map_err(|_| Error::ConfigurationError("DATABASE_URL must be set".to_string()))?,
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(Error::Database)?;

        info!("Connected to PostgreSQL database");

        Ok(Self {
            transaction_manager: PgTransactionManager::new(pool.clone()),
            pool,
        })
    }

    /// Create a new PostgreSQL order repository with configuration
    pub async fn with_config(config: &crate::config::OrderStoreConfig) -> Result<Self> {
        info!(
            "Connecting to PostgreSQL database with pool size: {}",
            config.db_pool_size
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.db_pool_size)
            .connect(&config.database_url)
            .await
            .map_err(Error::Database)?;

        info!("Connected to PostgreSQL database");

        Ok(Self {
            transaction_manager: PgTransactionManager::new(pool.clone()),
            pool,
        })
    }
}

fn direction_to_str(direction: Direction) -> &'static str {
    match direction {
        Direction::ZeroForOne => "zero_for_one",
        Direction::OneForZero => "one_for_zero",
    }
}

fn direction_from_str(s: &str) -> Result<Direction> {
    match s {
        "zero_for_one" => Ok(Direction::ZeroForOne),
        "one_for_zero" => Ok(Direction::OneForZero),
        other => Err(Error::Internal(format!("Unknown direction: {}", other))),
    }
}

fn parse_quantity(value: String, column: &str) -> Result<Quantity> {
    value
        .parse::<Quantity>()
        .map_err(|e| Error::Internal(format!("Invalid {} format: {}", column, e)))
}

/// Convert a database row into an Order
fn row_to_order(row: &sqlx::postgres::PgRow) -> Result<Order> {
    let id: i64 = row.get("id");
    let asset0: String = row.get("asset0");
    let asset1: String = row.get("asset1");
    let direction: String = row.get("direction");
    let status: String = row.get("status");
    let tolerance_bps: i64 = row.get("tolerance_bps");
    let interval_minutes: Option<i64> = row.get("interval_minutes");
    let tranche_base: Option<String> = row.get("tranche_base");

    let schedule = match (interval_minutes, tranche_base) {
        (Some(minutes), Some(tranche)) => Some(DcaSchedule {
            interval_minutes: minutes as u32,
            tranche_base_amount: parse_quantity(tranche, "tranche_base")?,
        }),
        _ => None,
    };

    Ok(Order {
        id: OrderId(id as u64),
        owner: row.get("owner"),
        pair: Pair::new(asset0, asset1)?,
        direction: direction_from_str(&direction)?,
        target_base_amount: parse_quantity(row.get("target_base"), "target_base")?,
        total_input_amount: parse_quantity(row.get("total_input"), "total_input")?,
        tolerance_bps: tolerance_bps as u32,
        schedule,
        filled_base_amount: parse_quantity(row.get("filled_base"), "filled_base")?,
        remaining_input_amount: parse_quantity(row.get("remaining_input"), "remaining_input")?,
        last_execution_at: row.get("last_execution_at"),
        expires_at: row.get("expires_at"),
        status: status.parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const ORDER_COLUMNS: &str = "id, owner, asset0, asset1, direction, target_base, total_input, \
     tolerance_bps, interval_minutes, tranche_base, filled_base, remaining_input, \
     last_execution_at, expires_at, status, created_at, updated_at";

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    fn transaction_manager(&self) -> &dyn TransactionManager {
        &self.transaction_manager
    }

    async fn next_order_id(&self) -> Result<OrderId> {
        let row = sqlx::query("SELECT nextval('order_id_seq') AS id")
            .fetch_one(&self.pool)
            .await?;
        let id: i64 = row.get("id");
        Ok(OrderId(id as u64))
    }

    async fn insert_order(&self, order: Order) -> Result<Order> {
        debug!("Inserting order {} into database", order.id);

        sqlx::query(
            "INSERT INTO orders (id, owner, asset0, asset1, direction, target_base, total_input, \
             tolerance_bps, interval_minutes, tranche_base, filled_base, remaining_input, \
             last_execution_at, expires_at, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(order.id.0 as i64)
        .bind(order.owner)
        .bind(order.pair.asset0())
        .bind(order.pair.asset1())
        .bind(direction_to_str(order.direction))
        .bind(order.target_base_amount.to_string())
        .bind(order.total_input_amount.to_string())
        .bind(order.tolerance_bps as i64)
        .bind(order.schedule.as_ref().map(|s| s.interval_minutes as i64))
        .bind(
            order
                .schedule
                .as_ref()
                .map(|s| s.tranche_base_amount.to_string()),
        )
        .bind(order.filled_base_amount.to_string())
        .bind(order.remaining_input_amount.to_string())
        .bind(order.last_execution_at)
        .bind(order.expires_at)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        debug!("Getting order from database: {}", id);

        let row = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id.0 as i64)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_order(&row)?)),
            None => Ok(None),
        }
    }

    async fn orders_by_owner(&self, owner: Uuid) -> Result<Vec<Order>> {
        debug!("Getting orders for owner: {}", owner);

        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE owner = $1 ORDER BY id",
            ORDER_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    async fn active_orders_for_pair(&self, pair: &Pair) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders \
             WHERE asset0 = $1 AND asset1 = $2 AND status = 'active' ORDER BY id",
            ORDER_COLUMNS
        ))
        .bind(pair.asset0())
        .bind(pair.asset1())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    async fn update_if_active(&self, order: Order) -> Result<Order> {
        debug!("Updating order in database: {}", order.id);

        // The status predicate is the optimistic concurrency check: a row that
        // has already reached a terminal state is never overwritten.
        let result = sqlx::query(
            "UPDATE orders SET filled_base = $2, remaining_input = $3, last_execution_at = $4, \
             status = $5, updated_at = $6 \
             WHERE id = $1 AND status = 'active'",
        )
        .bind(order.id.0 as i64)
        .bind(order.filled_base_amount.to_string())
        .bind(order.remaining_input_amount.to_string())
        .bind(order.last_execution_at)
        .bind(order.status.as_str())
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_order(order.id).await? {
                Some(stored) => Err(Error::OrderNotActive(format!(
                    "Order {} is {}",
                    order.id,
                    stored.status.as_str()
                ))),
                None => Err(Error::OrderNotFound(format!("Order not found: {}", order.id))),
            };
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::decimal::dec;
    use common::model::order::PlaceOrderParams;

    fn eth_usdc_order(id: u64) -> Order {
        Order::new(
            OrderId(id),
            PlaceOrderParams {
                owner: Uuid::new_v4(),
                pair: Pair::new("ETH", "USDC").unwrap(),
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
    }

    #[tokio::test]
    async fn terminal_orders_leave_the_pair_scan() {
        let repo = InMemoryOrderRepository::new();
        let pair = Pair::new("ETH", "USDC").unwrap();

        let first = repo.insert_order(eth_usdc_order(1)).await.unwrap();
        let second = repo.insert_order(eth_usdc_order(2)).await.unwrap();

        let mut cancelled = first.clone();
        cancelled.status = OrderStatus::Cancelled;
        repo.update_if_active(cancelled).await.unwrap();

        let scanned = repo.active_orders_for_pair(&pair).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].id, second.id);

        // The cancelled id was pruned from the index, not just filtered out
        assert_eq!(repo.pair_index.get(&pair).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scan_keeps_insertion_order_across_terminal_gaps() {
        let repo = InMemoryOrderRepository::new();
        let pair = Pair::new("ETH", "USDC").unwrap();

        for id in 1..=4 {
            repo.insert_order(eth_usdc_order(id)).await.unwrap();
        }

        let mut done = repo.get_order(OrderId(2)).await.unwrap().unwrap();
        done.status = OrderStatus::Completed;
        repo.update_if_active(done).await.unwrap();

        let ids: Vec<_> = repo
            .active_orders_for_pair(&pair)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![OrderId(1), OrderId(3), OrderId(4)]);
    }
}
