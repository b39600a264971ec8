//! Connection pool for the archive database

use crate::{DbError, DbResult};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::info;

/// Archive writes are serialized per frame, so a small pool suffices
const MAX_CONNECTIONS: u32 = 4;

#[derive(Clone)]
pub struct DbClient {
    pool: MySqlPool,
}

impl DbClient {
    /// Connect to the MySQL server at `database_url`
    pub async fn new(database_url: &str) -> DbResult<Self> {
        if database_url.trim().is_empty() {
            return Err(DbError::ConfigError("database URL is empty".into()));
        }
        let opts: MySqlConnectOptions = database_url.parse()?;
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Wait for checked-out connections and close the pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
