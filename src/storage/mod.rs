// storage/mod.rs
// Storage backends for host records

mod document;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod sqlite;
mod store;
#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use log::{info, warn};

use crate::config::{Backend, StoreConfig};
use crate::error_handling::DatabaseError;

// Re-export commonly used items
pub use memory::MemoryStore;
pub use migrations::run_migrations;
pub use pool::{init_db_pool_with_path, init_memory_pool};
pub use sqlite::SqliteStore;
pub use store::{RecordStore, RecordStream, VersionedRecord};

/// Opens the backend a configuration names.
///
/// For SQLite this creates the pool and applies pending migrations.
///
/// # Errors
///
/// `DatabaseError::BackendUnavailable` if the database cannot be opened or
/// migrated.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, DatabaseError> {
    let store: Arc<dyn RecordStore> = match &config.backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::Sqlite { path } => {
            let pool = if config.is_memory_sqlite() {
                init_memory_pool(config.timeout).await?
            } else {
                init_db_pool_with_path(path, config.max_connections, config.timeout).await?
            };
            run_migrations(&pool).await.map_err(|e| {
                DatabaseError::BackendUnavailable(format!("migrations failed: {e}"))
            })?;
            info!("SQLite store ready at {}", path.display());
            Arc::new(SqliteStore::new(pool, config.timeout))
        }
    };

    if let Some(creds) = &config.credentials {
        if !store.supports_credentials() {
            warn!(
                "The {} backend ignores credentials (user {})",
                store.backend_name(),
                creds.username
            );
        }
    }
    Ok(store)
}
