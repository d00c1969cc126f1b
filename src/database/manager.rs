use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::engine::sanitizer;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection pools keyed by database name, created lazily from DATABASE_URL
pub struct DatabaseManager {
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

impl DatabaseManager {
    fn instance() -> &'static DatabaseManager {
        static INSTANCE: OnceLock<DatabaseManager> = OnceLock::new();
        INSTANCE.get_or_init(|| DatabaseManager {
            pools: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Pool for `database_name`, or for the database named in DATABASE_URL
    /// when none is given
    pub async fn connect(
        settings: &DatabaseConfig,
        database_name: Option<&str>,
    ) -> Result<PgPool, DatabaseError> {
        if let Some(name) = database_name {
            if !Self::is_valid_db_name(name) {
                return Err(DatabaseError::InvalidDatabaseName(name.to_string()));
            }
        }
        Self::instance().get_pool(settings, database_name).await
    }

    /// Get existing pool or create a new one lazily
    async fn get_pool(
        &self,
        settings: &DatabaseConfig,
        database_name: Option<&str>,
    ) -> Result<PgPool, DatabaseError> {
        let key = database_name.unwrap_or("").to_string();

        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(&key) {
                return Ok(pool.clone());
            }
        }

        let connection_string = Self::build_connection_string(database_name)?;

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(settings.connection_timeout))
            .connect(&connection_string)
            .await?;

        // Another task may have raced us here; keep whichever landed first
        let pool = {
            let mut pools = self.pools.write().await;
            pools.entry(key).or_insert(pool).clone()
        };

        info!("Created database pool for: {}", database_name.unwrap_or("<default>"));
        Ok(pool)
    }

    fn build_connection_string(database_name: Option<&str>) -> Result<String, DatabaseError> {
        let base = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let mut url = url::Url::parse(&base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if let Some(name) = database_name {
            // Replace the path to the database name (ensure leading slash)
            url.set_path(&format!("/{}", name));
        }
        Ok(url.into())
    }

    /// Pings the default pool to ensure connectivity
    pub async fn health_check(settings: &DatabaseConfig) -> Result<(), DatabaseError> {
        let pool = Self::connect(settings, None).await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all() {
        let manager = Self::instance();
        let mut pools = manager.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", if name.is_empty() { "<default>" } else { &name });
        }
    }

    /// Database names follow the same rules as table identifiers
    fn is_valid_db_name(name: &str) -> bool {
        sanitizer::quote(name).is_ok()
    }
}
