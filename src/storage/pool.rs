//! Database connection pool management.
//!
//! This module initializes and configures the SQLite connection pool with:
//! - WAL mode enabled for concurrent access
//! - Busy timeout and pool acquire timeout bound to the store timeout
//! - Automatic database file creation

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::{error, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error_handling::DatabaseError;

/// Initializes a connection pool on a database file.
///
/// Creates the database file if it doesn't exist and enables WAL mode so
/// readers never block the single writer.
pub async fn init_db_pool_with_path(
    db_path: &Path,
    max_connections: u32,
    timeout: Duration,
) -> Result<SqlitePool, DatabaseError> {
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(db_path)
    {
        Ok(_) => info!("Database file {} created.", db_path.display()),
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
            info!("Database file {} already exists.", db_path.display())
        }
        Err(e) => {
            error!("Failed to create database file: {e}");
            return Err(DatabaseError::BackendUnavailable(format!(
                "cannot create {}: {e}",
                db_path.display()
            )));
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(timeout)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(timeout)
        .connect_with(options)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {e}");
            DatabaseError::BackendUnavailable(e.to_string())
        })
}

/// Initializes a pool on a private in-memory database.
///
/// Every SQLite connection to `:memory:` opens its own database, so the pool
/// holds exactly one connection and never recycles it.
pub async fn init_memory_pool(timeout: Duration) -> Result<SqlitePool, DatabaseError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| DatabaseError::ConfigError(e.to_string()))?
        .busy_timeout(timeout)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(timeout)
        .connect_with(options)
        .await
        .map_err(|e| {
            error!("Failed to open in-memory database: {e}");
            DatabaseError::BackendUnavailable(e.to_string())
        })
}
