//! Host database configuration and constants.
//!
//! This module provides:
//! - Default values (index names, timeouts, page size, retry budget)
//! - The `StoreConfig` struct and its connection URL parser
//! - Logging option types

mod connection;
mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{Backend, Credentials, Flavor, LogFormat, LogLevel, StoreConfig};
