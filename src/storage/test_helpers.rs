//! Shared test helpers for storage module tests.
//!
//! This module provides common utilities for store setup and test data
//! creation used across the crate's unit tests.

#[cfg(test)]
use std::time::Duration;

#[cfg(test)]
use chrono::{TimeZone, Utc};

#[cfg(test)]
use crate::mapping::{IndexSpec, Mapping};
#[cfg(test)]
use crate::record::{HostRecord, Port};
#[cfg(test)]
use crate::storage::{init_memory_pool, run_migrations, RecordStore, SqliteStore};

/// Index created by [`create_test_store`].
#[cfg(test)]
pub const HOSTS: &str = "ivre-hosts";

/// Creates an in-memory SQLite store with migrations applied and an empty
/// [`HOSTS`] index using the default mapping.
#[cfg(test)]
pub async fn create_test_store() -> SqliteStore {
    let pool = init_memory_pool(Duration::from_secs(5))
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    let store = SqliteStore::new(pool, Duration::from_secs(5));
    store
        .init_index(&IndexSpec::new(HOSTS, Mapping::hosts_default()))
        .await
        .expect("Failed to create test index");
    store
}

/// Creates a host record with a source, a scan window, three open TCP
/// ports, a tag and a small binary field.
#[cfg(test)]
pub fn sample_host(addr: &str) -> HostRecord {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
    HostRecord::new(addr.parse().expect("valid test address"))
        .with_source("test-scan")
        .with_scan_window(start, end)
        .with_port(Port::new("tcp", 22).with_detail("state", "open"))
        .with_port(
            Port::new("tcp", 80)
                .with_detail("state", "open")
                .with_detail("service_name", "http"),
        )
        .with_port(Port::new("tcp", 443).with_detail("state", "open"))
        .with_tag("web")
        .with_binary("screenshot", vec![0x89, b'P', b'N', b'G', 0, 0xff])
}
