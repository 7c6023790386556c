//! Configuration constants.
//!
//! Defaults used when a connection URL or `StoreConfig` leaves a value unset.

use std::time::Duration;

/// Index name prefix when the connection URL has no path.
pub const DEFAULT_PREFIX: &str = "ivre-";
/// Logical name of the active hosts index.
pub const DEFAULT_HOSTS_INDEX: &str = "hosts";
/// Logical name of the merged views index.
pub const DEFAULT_VIEWS_INDEX: &str = "views";
pub const DEFAULT_DB_PATH: &str = "./hostdb.db";
/// Special `db` option value that opens a private in-memory SQLite database.
pub const MEMORY_DB: &str = ":memory:";

/// Bound on every single backend call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Records fetched per scan page.
pub const DEFAULT_PAGE_SIZE: usize = 500;
/// SQLite connection pool size.
/// A private in-memory database always uses a single connection.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

// Merge conflict retries
/// First backoff delay in milliseconds
pub const MERGE_RETRY_BASE_MS: u64 = 2;
/// Backoff growth factor between attempts
pub const MERGE_RETRY_FACTOR: u64 = 5;
/// Cap on a single backoff delay
pub const MERGE_RETRY_MAX_DELAY: Duration = Duration::from_millis(200);
/// Retries after the first attempt before giving up with `MergeConflict`
pub const MERGE_RETRY_ATTEMPTS: usize = 16;
