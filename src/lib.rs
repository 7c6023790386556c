//! hostdb library: storage and query layer for network scan host records
//!
//! This library stores loosely structured host records (an address, the
//! ports found open on it, tags, hostnames and opaque binary blobs) in
//! named indexes, answers filtered count and scan queries, and merges
//! repeated observations of the same host into one record.
//!
//! # Example
//!
//! ```no_run
//! use hostdb::{Filter, Flavor, HostDb, HostRecord, Port};
//! use futures::TryStreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = HostDb::connect("sqlite:///ivre-?db=./scans.db", Flavor::Active).await?;
//! db.init().await?;
//!
//! let record = HostRecord::new("192.0.2.1".parse()?)
//!     .with_source("weekly")
//!     .with_port(Port::new("tcp", 443).with_detail("state", "open"));
//! db.store_or_merge_host(record).await?;
//!
//! let web = Filter::in_set("ports.port", [80u16, 443])?;
//! println!("{} web hosts", db.count(&web).await?);
//! let hosts: Vec<_> = db.scan(&web).try_collect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

pub mod codec;
pub mod config;
mod db;
mod error_handling;
pub mod filter;
pub mod initialization;
pub mod mapping;
pub mod merge;
pub mod record;
pub mod storage;

// Re-export public API
pub use config::{Backend, Credentials, Flavor, LogFormat, LogLevel, StoreConfig};
pub use db::{HostDb, IndexInitResult, InitReport};
pub use error_handling::{DatabaseError, ErrorKind, InitializationError, Operation, StoreStats};
pub use filter::{Field, FieldValue, Filter};
pub use mapping::{FieldType, IndexSpec, Mapping};
pub use merge::{merge_records, MergeOutcome, MergeScope};
pub use record::{HostRecord, Port, RecordId};
pub use storage::{MemoryStore, RecordStore, RecordStream, SqliteStore};
