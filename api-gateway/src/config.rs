//! Application configuration

use std::env;

/// Application configuration
pub struct AppConfig {
    /// API port
    pub port: u16,
    /// Database URL; absent means the in-memory repository
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Create a new configuration from environment variables
    pub fn new() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url: env::var("DATABASE_URL").ok(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}
