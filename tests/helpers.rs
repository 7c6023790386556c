// Shared test helpers for database setup and test data creation.
//
// This module provides common utilities used across multiple test files to reduce duplication.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};

use hostdb::{Backend, Flavor, HostDb, HostRecord, Port, StoreConfig};

/// Creates an initialized host database on the in-process backend.
#[allow(dead_code)] // Used by other test files
pub async fn memory_db() -> HostDb {
    let db = HostDb::connect("memory:///ivre-", Flavor::Active)
        .await
        .expect("Failed to open memory backend");
    db.init().await.expect("Failed to init hosts index");
    db
}

/// Creates an initialized host database on a SQLite file.
/// The file is created if missing; its hosts index is always recreated.
#[allow(dead_code)] // Used by other test files
pub async fn sqlite_db(db_path: &Path) -> HostDb {
    let config = StoreConfig {
        backend: Backend::Sqlite {
            path: db_path.to_path_buf(),
        },
        ..StoreConfig::for_flavor(Flavor::Active)
    };
    let db = HostDb::from_config(config)
        .await
        .expect("Failed to open SQLite database");
    db.init().await.expect("Failed to init hosts index");
    db
}

/// 2024-01-01 at the given hour, UTC.
#[allow(dead_code)]
pub fn t(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0)
        .single()
        .expect("valid test time")
}

/// A host with one open port per entry of `ports`, scanned between hours
/// `start` and `end`.
#[allow(dead_code)]
pub fn scanned_host(addr: &str, ports: &[u16], start: u32, end: u32) -> HostRecord {
    let mut record = HostRecord::new(addr.parse().expect("valid test address"))
        .with_scan_window(t(start), t(end));
    for port in ports {
        record = record.with_port(Port::new("tcp", *port).with_detail("state", "open"));
    }
    record
}
