//! Keeper engine integration binary
//!
//! Composes the order store, market adapter, and execution engine behind the
//! API gateway's routes, and runs the simulated external tick relay. The
//! engine itself stays reactive; only this binary owns a timer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use clap::Parser;
use common::model::pair::{Direction, Pair};
use common::model::order::PlaceOrderParams;
use dotenv::dotenv;
use execution_engine::{EngineConfig, ExecutionEngine};
use market_adapter::{ConstantProductPool, OracleFeed};
use order_store::{OrderStore, RepositoryType};
use rust_decimal_macros::dec;
use tokio::signal;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};
use uuid::Uuid;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Run with demo data
    #[clap(short, long)]
    demo: bool,

    /// Seconds between simulated external ticks
    #[clap(long, default_value = "30")]
    tick_secs: u64,
}

// Static variable to track service start time
static START_TIME: AtomicU64 = AtomicU64::new(0);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // Initialize tracing with debug level if DEBUG=1 in .env
    let env_debug = std::env::var("DEBUG").unwrap_or_else(|_| "0".to_string());
    let log_level = if env_debug == "1" { Level::DEBUG } else { Level::INFO };

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .parse("tower_http=debug,api_gateway=debug,order_store=debug,execution_engine=debug,market_adapter=debug")
        .unwrap();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        info!("Tracing initialized");
        if env_debug == "1" {
            debug!("Debug logging enabled");
        }
    }

    info!("Starting Tidewater order engine...");

    // Initialize service start time for uptime tracking
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    START_TIME.store(now, Ordering::Relaxed);

    // Initialize the store: Postgres when DATABASE_URL is set
    let store = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            info!("Using PostgreSQL order repository");
            Arc::new(OrderStore::new(RepositoryType::Postgres(Some(url))).await?)
        }
        Err(_) => {
            info!("Using in-memory order repository");
            Arc::new(OrderStore::in_memory())
        }
    };

    let oracle = Arc::new(OracleFeed::new());
    let pool = Arc::new(ConstantProductPool::new());

    // Register pairs and seed their pools
    let eth_usdc = Pair::new("ETH", "USDC")?;
    store.register_pair(eth_usdc.clone());
    pool.add_pool(eth_usdc.clone(), dec!(1000), dec!(3090000), 30);
    oracle.publish(eth_usdc.clone(), dec!(3090), Utc::now());

    let btc_usdc = Pair::new("BTC", "USDC")?;
    store.register_pair(btc_usdc.clone());
    pool.add_pool(btc_usdc.clone(), dec!(100), dec!(6500000), 30);
    oracle.publish(btc_usdc.clone(), dec!(65000), Utc::now());

    let engine = Arc::new(ExecutionEngine::new(
        store.clone(),
        oracle.clone(),
        pool.clone(),
        EngineConfig::default(),
    ));

    // Create demo data if requested
    if args.demo {
        info!("Creating demo data...");
        create_demo_data(&store, &eth_usdc).await?;
    }

    // Simulated external tick relay: refresh the oracle from the pool's
    // marginal price and trigger each registered pair.
    let tick_handle = {
        let store = store.clone();
        let oracle = oracle.clone();
        let pool = pool.clone();
        let engine = engine.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(args.tick_secs));
            interval.tick().await; // first tick fires immediately

            loop {
                interval.tick().await;
                let now = Utc::now();

                for pair in store.pairs() {
                    match pool.spot_price(&pair) {
                        Ok(price) => oracle.publish(pair.clone(), price, now),
                        Err(e) => {
                            warn!("No spot price for {}: {}", pair.symbol(), e);
                            continue;
                        }
                    }

                    match engine.execute_orders(&pair, now).await {
                        Ok(report) => {
                            if !report.fills.is_empty() || !report.skips.is_empty() {
                                info!(
                                    "Tick on {}: {} scanned, {} fills, {} skips",
                                    pair.symbol(),
                                    report.scanned,
                                    report.fills.len(),
                                    report.skips.len()
                                );
                            }
                        }
                        Err(e) => warn!("Tick cycle failed on {}: {}", pair.symbol(), e),
                    }
                }
            }
        })
    };

    // Start API server in a separate task
    let api_handle = {
        let state = Arc::new(api_gateway::AppState {
            store,
            engine,
            oracle,
            pool,
        });

        tokio::spawn(async move {
            let cors = tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any);

            let app = axum::Router::new()
                .nest("/api/v1", api_gateway::api_routes())
                .route("/health", axum::routing::get(health_check))
                .route(
                    "/ws",
                    axum::routing::get(api_gateway::ws::handler::ws_handler),
                )
                .layer(cors)
                .layer(
                    tower_http::trace::TraceLayer::new_for_http()
                        .make_span_with(
                            tower_http::trace::DefaultMakeSpan::new().level(log_level),
                        )
                        .on_request(tower_http::trace::DefaultOnRequest::new().level(log_level))
                        .on_response(
                            tower_http::trace::DefaultOnResponse::new().level(log_level),
                        ),
                )
                .with_state(state);

            let port = std::env::var("API_PORT").unwrap_or_else(|_| "8081".to_string());
            let port: u16 = port.parse().expect("Invalid API_PORT value");
            info!("Starting API server on 0.0.0.0:{}", port);
            let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .expect("Failed to bind to address");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .expect("Server error");
        })
    };

    // Run until the API server exits
    api_handle.await?;
    tick_handle.abort();

    info!("Shutting down");
    Ok(())
}

// Health check endpoint
async fn health_check(
    State(state): State<Arc<api_gateway::AppState>>,
) -> impl IntoResponse {
    let pairs = state.store.pairs();

    // A store that can list pairs and an oracle with a quote for each pair
    // is everything a tick needs.
    let mut quoted = 0usize;
    for pair in &pairs {
        if state.oracle.price(pair).await.is_ok() {
            quoted += 1;
        }
    }

    let overall_status = if !pairs.is_empty() && quoted == pairs.len() {
        "healthy"
    } else {
        "degraded"
    };

    let health_info = serde_json::json!({
        "status": overall_status,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": get_uptime_seconds(),
        "pairs": {
            "registered": pairs.len(),
            "quoted": quoted,
        },
    });

    if overall_status == "healthy" {
        (axum::http::StatusCode::OK, Json(health_info))
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(health_info))
    }
}

// Helper function to get uptime in seconds
fn get_uptime_seconds() -> u64 {
    let current_start = START_TIME.load(Ordering::Relaxed);
    if current_start == 0 {
        return 0;
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    now.saturating_sub(current_start)
}

/// Create demo data for testing
async fn create_demo_data(
    store: &Arc<OrderStore>,
    pair: &Pair,
) -> Result<(), Box<dyn std::error::Error>> {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    info!("Created demo owners: Alice = {}, Bob = {}", alice, bob);

    store.deposit(alice, "USDC", dec!(100000))?;
    store.deposit(bob, "USDC", dec!(50000))?;

    let now = Utc::now();

    // Alice: single-shot limit order, buy 2 ETH near the current price
    store
        .place(
            PlaceOrderParams {
                owner: alice,
                pair: pair.clone(),
                direction: Direction::OneForZero,
                target_base_amount: dec!(2),
                total_input_amount: dec!(6300),
                tolerance_bps: 200,
                interval_minutes: 0,
                num_intervals: 0,
                expires_at: None,
            },
            now,
        )
        .await?;

    // Bob: DCA into 5 ETH over ten price-agnostic tranches
    store
        .place(
            PlaceOrderParams {
                owner: bob,
                pair: pair.clone(),
                direction: Direction::OneForZero,
                target_base_amount: dec!(5),
                total_input_amount: dec!(16000),
                tolerance_bps: common::decimal::TOLERANCE_AGNOSTIC,
                interval_minutes: 1,
                num_intervals: 10,
                expires_at: None,
            },
            now,
        )
        .await?;

    info!("Demo data created successfully");
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
