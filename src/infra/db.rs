use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let pool = pool_options(config)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Build the pool without opening a connection; the first query connects.
    pub fn connect_lazy(config: &AppConfig) -> Result<Self> {
        let pool = pool_options(config).connect_lazy(&config.database_url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn pool_options(config: &AppConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
}
