use crate::config::get_config;
use crate::error::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

const MAX_CONNECTIONS: u32 = 50;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection pool shared by every handler for the lifetime of the process.
pub async fn create_pool() -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&get_config().database_url)
        .await?;
    Ok(pool)
}
