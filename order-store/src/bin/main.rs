//! Order store standalone binary

use clap::{Parser, Subcommand};
use common::error::Result;
use order_store::{OrderStore, OrderStoreConfig, RepositoryType};
use tracing::info;

#[derive(Parser)]
#[command(name = "order-store")]
#[command(about = "Order record and escrow store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the order store
    Start {
        /// Use the in-memory repository instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { in_memory } => {
            let _store = if in_memory {
                info!("Starting order store with in-memory repository");
                OrderStore::new(RepositoryType::InMemory).await?
            } else {
                let config = OrderStoreConfig::from_env();
                info!("Starting order store against {}", config.database_url);

                if config.run_migrations {
                    let pool = common::db::init_db_pool().await?;
                    common::db::run_migrations(&pool).await?;
                    info!("Migrations applied");
                }

                OrderStore::new(RepositoryType::Postgres(Some(config.database_url))).await?
            };

            info!("Order store ready");
            tokio::signal::ctrl_c()
                .await
                .map_err(|e| common::error::Error::Internal(e.to_string()))?;
            info!("Shutting down");
        }
    }

    Ok(())
}
