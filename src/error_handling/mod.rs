//! Error handling and operation statistics.
//!
//! This module provides:
//! - The `DatabaseError` taxonomy returned by every store operation
//! - Field-less error kinds for counting
//! - Operation statistics tracking

mod stats;
mod types;

// Re-export public API
pub use stats::{Operation, StoreStats};
pub use types::{DatabaseError, ErrorKind, InitializationError};
