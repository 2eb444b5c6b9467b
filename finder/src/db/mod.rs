//! Database connection

use std::str::FromStr;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::Config;
use crate::orm::{Entity, Finder, Queryable};

/// Database wrapper providing connection pool access
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database wrapper from an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new database connection pool
    pub async fn connect(config: &Config) -> Result<Self> {
        let url = if config.database_url.starts_with("sqlite:") {
            config.database_url.clone()
        } else {
            format!("sqlite://{}", config.database_url)
        };

        let options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("Invalid database URL '{}'", config.database_url))?
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.is_in_memory() {
            // Closing the last connection drops an in-memory database
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {}", config.database_url))?;

        tracing::debug!(
            url = %config.database_url,
            max_connections = config.max_connections,
            "Connected to database"
        );

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get an untyped finder for an entity
    pub fn finder<E: Entity>(&self) -> Finder<E> {
        Finder::new(&self.pool)
    }

    /// Get the generated query scope for an entity
    pub fn query<E: Queryable>(&self) -> E::Finder {
        E::finder(&self.pool)
    }
}
