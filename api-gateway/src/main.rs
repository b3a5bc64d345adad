//! API gateway for the order execution engine

mod api;
mod config;
mod error;
mod ws;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use execution_engine::{EngineConfig, ExecutionEngine};
use market_adapter::{ConstantProductPool, OracleFeed};
use order_store::OrderStore;
use rust_decimal_macros::dec;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_gateway::AppState;

use crate::api::{
    escrow::{deposit, get_balances},
    health::health_check,
    market::{get_pairs, get_pool, get_price},
    order::{cancel_order, get_order, get_orders, place_order},
    trigger::trigger_pair,
};
use crate::config::AppConfig;
use crate::ws::handler::ws_handler;

/// API documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Order routes
        api::order::place_order,
        api::order::cancel_order,
        api::order::get_order,
        api::order::get_orders,
        // Escrow routes
        api::escrow::deposit,
        api::escrow::get_balances,
        // Market routes
        api::market::get_pairs,
        api::market::get_price,
        api::market::get_pool,
        // Trigger boundary
        api::trigger::trigger_pair,
        // Health
        api::health::health_check,
    ),
    components(
        schemas(
            // Order API
            api::order::PlaceOrderRequest,
            api::order::CancelOrderRequest,
            common::model::order::Order,
            common::model::order::OrderId,
            common::model::order::OrderStatus,
            common::model::order::DcaSchedule,
            common::model::pair::Pair,
            common::model::pair::Direction,

            // Escrow API
            api::escrow::DepositRequest,
            common::model::escrow::Balance,

            // Market API
            common::model::market::PriceQuote,
            common::model::market::PoolSnapshot,
            common::model::fill::Fill,

            // Response models
            api::response::ApiResponse<common::model::order::Order>,
            api::response::ApiResponse<common::model::escrow::Balance>,
            api::response::ApiListResponse<common::model::order::Order>,
            api::response::ApiListResponse<common::model::escrow::Balance>,
            api::response::ResponseMetadata,
        )
    ),
    tags(
        (name = "order", description = "Order placement and lifecycle endpoints"),
        (name = "escrow", description = "Escrow funding and balance endpoints"),
        (name = "market", description = "Pair, price, and pool read endpoints"),
        (name = "trigger", description = "External tick boundary"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "Tidewater Order Engine API",
        version = "1.0.0",
        description = "API for placing conditional orders, funding escrow, and relaying execution triggers"
    )
)]
struct ApiDoc;

/// Order engine API server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Listening address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    // Debug logging when DEBUG=1 is set
    let env = std::env::var("DEBUG").unwrap_or_else(|_| "0".to_string());
    let log_level = if env == "1" { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .parse("tower_http=debug,api_gateway=debug")
        .unwrap();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    debug!("Debug logging enabled");

    let _config = AppConfig::new();

    // Initialize services
    let store = Arc::new(OrderStore::in_memory());
    let oracle = Arc::new(OracleFeed::new());
    let pool = Arc::new(ConstantProductPool::new());

    // Register the default pair and seed its pool
    let eth_usdc = common::model::pair::Pair::new("ETH", "USDC")
        .expect("valid default pair");
    store.register_pair(eth_usdc.clone());
    pool.add_pool(eth_usdc.clone(), dec!(1000), dec!(3090000), 30);
    oracle.publish(eth_usdc, dec!(3090), Utc::now());

    let engine = Arc::new(ExecutionEngine::new(
        store.clone(),
        oracle.clone(),
        pool.clone(),
        EngineConfig::default(),
    ));

    let state = Arc::new(AppState {
        store,
        engine,
        oracle,
        pool,
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Set up API routes
    let api_routes = Router::new()
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
        .route("/pairs/:pair/trigger", post(trigger_pair));

    // Set up websocket route
    let ws_routes = Router::new().route("/ws", get(ws_handler));

    // Set up Swagger UI
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    // Combine all routes
    let app = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .merge(ws_routes)
        .merge(swagger_ui)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(log_level))
                .on_request(DefaultOnRequest::new().level(log_level))
                .on_response(DefaultOnResponse::new().level(log_level)),
        )
        .with_state(state);

    // Start the server
    let addr: std::net::SocketAddr = args.addr.parse().expect("Invalid address");
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
