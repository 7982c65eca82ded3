//! Shared application state

use crate::config::ServerConfig;
use crate::error::Result;
use meridian_core::GisError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Application state shared across request handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub pool: PgPool,
}

impl AppState {
    /// Build state with a lazily-connecting pool.
    ///
    /// The pool opens connections on first use, so constructing state
    /// never blocks on the database; metadata-only routes stay usable
    /// in tests without one.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect_lazy(&config.database_url)
            .map_err(GisError::from)?;
        Ok(AppState { config, pool })
    }
}
