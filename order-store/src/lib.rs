//! Order store: durable order records, escrow ledger, and lifecycle rules

pub mod service;
pub mod repository;
pub mod ledger;
pub mod config;

pub use service::OrderStore;
pub use service::RepositoryType;
pub use repository::{InMemoryOrderRepository, OrderRepository, PostgresOrderRepository};
pub use ledger::EscrowLedger;
pub use config::OrderStoreConfig;
