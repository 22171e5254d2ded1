use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;

/// Opens the connection pool backing the curriculum store.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    info!("Connecting to the curriculum store...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!("Curriculum store pool established");
    Ok(pool)
}
