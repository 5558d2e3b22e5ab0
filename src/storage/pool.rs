//! Database connection pool management.
//!
//! One pool is shared by every export: cap 10 connections, 2 s connect
//! timeout, 30 s idle timeout. An export that cannot acquire a connection
//! within the timeout fails instead of queueing indefinitely.

use log::info;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::{POOL_CONNECT_TIMEOUT, POOL_IDLE_TIMEOUT, POOL_MAX_CONNECTIONS};
use crate::error_handling::ExportError;

/// Initializes and returns the shared Postgres connection pool.
///
/// # Errors
///
/// Returns `ExportError::CursorFailed` if the initial connection cannot be
/// established.
pub async fn init_db_pool(database_url: &str) -> Result<PgPool, ExportError> {
    let pool = PgPoolOptions::new()
        .max_connections(POOL_MAX_CONNECTIONS)
        .acquire_timeout(POOL_CONNECT_TIMEOUT)
        .idle_timeout(POOL_IDLE_TIMEOUT)
        .connect(database_url)
        .await
        .map_err(ExportError::CursorFailed)?;

    info!(
        "Database pool ready (max {} connections)",
        POOL_MAX_CONNECTIONS
    );
    Ok(pool)
}
