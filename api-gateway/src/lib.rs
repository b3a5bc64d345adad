// api-gateway/src/lib.rs
pub mod api;
pub mod config;
pub mod error;
pub mod ws;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use execution_engine::ExecutionEngine;
use market_adapter::{LiquidityPool, PriceOracle};
use order_store::OrderStore;

use crate::api::{
    escrow::{deposit, get_balances},
    health::health_check,
    market::{get_pairs, get_pool, get_price},
    order::{cancel_order, get_order, get_orders, place_order},
    trigger::trigger_pair,
};
use crate::ws::handler::ws_handler;

/// App state shared across handlers
pub struct AppState {
    /// Order store
    pub store: Arc<OrderStore>,
    /// Execution engine
    pub engine: Arc<ExecutionEngine>,
    /// Price oracle
    pub oracle: Arc<dyn PriceOracle>,
    /// Liquidity pool
    pub pool: Arc<dyn LiquidityPool>,
}

/// Build the `/api/v1` route tree over the shared state
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Order routes
        .route("/orders", post(place_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/owners/:id/orders", get(get_orders))
        // Escrow routes
        .route("/escrow/deposit", post(deposit))
        .route("/owners/:id/balances", get(get_balances))
        // Market routes
        .route("/pairs", get(get_pairs))
        .route("/pairs/:pair/price", get(get_price))
        .route("/pairs/:pair/pool", get(get_pool))
        // Trigger boundary
        .route("/pairs/:pair/trigger", post(trigger_pair))
}

/// Build the full application router: API, websocket, and health
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(health_check))
        .route("/ws", get(ws_handler))
        .with_state(state)
}
