//! The storage capability interface.
//!
//! Each backend implements [`RecordStore`]; the rest of the crate only sees
//! the trait, so backends are selected at construction and a fake backend can
//! stand in for a real one in tests.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error_handling::DatabaseError;
use crate::filter::Filter;
use crate::mapping::{IndexSpec, Mapping};
use crate::record::{HostRecord, RecordId};

/// Lazy, single-pass sequence of records produced by a scan.
///
/// Pages are fetched on demand; dropping the stream stops paging.
pub type RecordStream<'a> = BoxStream<'a, Result<HostRecord, DatabaseError>>;

/// A stored record together with its id and conditional-write version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedRecord {
    pub id: RecordId,
    pub version: i64,
    pub record: HostRecord,
}

/// Storage operations a backend provides for named indexes.
///
/// Implementations hold no locks across calls and never retry on their own.
/// Connectivity failures and timeouts surface as
/// `DatabaseError::BackendUnavailable`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Whether connection credentials mean anything to this backend.
    fn supports_credentials(&self) -> bool {
        false
    }

    /// Drops the index (and every record in it) and recreates it empty with
    /// the given mapping. Other indexes are untouched.
    async fn init_index(&self, spec: &IndexSpec) -> Result<(), DatabaseError>;

    /// Mapping of an existing index, `None` if the index does not exist.
    async fn index_mapping(&self, index: &str) -> Result<Option<Mapping>, DatabaseError>;

    /// Inserts the record unconditionally and returns its new id.
    async fn store(&self, index: &str, record: &HostRecord) -> Result<RecordId, DatabaseError>;

    /// Exact number of records matching the filter.
    async fn count(&self, index: &str, filter: &Filter) -> Result<u64, DatabaseError>;

    /// Every record matching the filter, fetched `page_size` records at a time.
    fn scan<'a>(&'a self, index: &'a str, filter: &'a Filter, page_size: usize) -> RecordStream<'a>;

    async fn get(&self, index: &str, id: RecordId) -> Result<Option<HostRecord>, DatabaseError>;

    /// Removes a whole record. Returns whether it existed.
    async fn remove(&self, index: &str, id: RecordId) -> Result<bool, DatabaseError>;

    /// First record matching the filter, with its version.
    async fn first_versioned(
        &self,
        index: &str,
        filter: &Filter,
    ) -> Result<Option<VersionedRecord>, DatabaseError>;

    /// Inserts the record unless a record matching `filter` exists, as one
    /// atomic backend operation. Returns `None` when a match was found.
    async fn insert_if_absent(
        &self,
        index: &str,
        filter: &Filter,
        record: &HostRecord,
    ) -> Result<Option<RecordId>, DatabaseError>;

    /// Replaces the record if its version is still `version`. Returns
    /// `false` when another writer got there first.
    async fn replace_if_version(
        &self,
        index: &str,
        id: RecordId,
        version: i64,
        record: &HostRecord,
    ) -> Result<bool, DatabaseError>;
}
