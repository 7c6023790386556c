//! The host database facade.
//!
//! A [`HostDb`] is bound to one backend and one hosts index. It validates
//! input before any backend call, logs what it does and keeps operation
//! statistics. Both the active and the view databases are a `HostDb`; they
//! only differ by [`Flavor`].

use std::sync::Arc;

use futures::StreamExt;
use log::{debug, error, info};

use crate::config::{Flavor, StoreConfig};
use crate::error_handling::{DatabaseError, Operation, StoreStats};
use crate::filter::Filter;
use crate::mapping::{IndexSpec, Mapping};
use crate::merge::{merge_only, merge_retry_strategy, store_or_merge, MergeOutcome};
use crate::record::{validate, HostRecord, RecordId};
use crate::storage::{open_store, RecordStore, RecordStream};

/// Outcome of initializing one index.
#[derive(Debug)]
pub struct IndexInitResult {
    pub index: String,
    pub result: Result<(), DatabaseError>,
}

/// Per-index outcomes of [`HostDb::init_indexes`].
#[derive(Debug, Default)]
pub struct InitReport {
    pub results: Vec<IndexInitResult>,
}

impl InitReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.result.is_ok())
    }

    /// Indexes that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &DatabaseError)> {
        self.results
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (r.index.as_str(), e)))
    }
}

/// Storage and query layer for host records.
///
/// Cheap to share across tasks through `Arc`; all methods take `&self`.
pub struct HostDb {
    store: Arc<dyn RecordStore>,
    config: StoreConfig,
    hosts_index: String,
    stats: Arc<StoreStats>,
}

impl HostDb {
    /// Opens the backend named by a connection URL.
    ///
    /// # Errors
    ///
    /// `ConfigError` for a bad URL or unsupported scheme,
    /// `BackendUnavailable` if the backend cannot be opened.
    pub async fn connect(url: &str, flavor: Flavor) -> Result<Self, DatabaseError> {
        Self::from_config(StoreConfig::from_url(url, flavor)?).await
    }

    pub async fn from_config(config: StoreConfig) -> Result<Self, DatabaseError> {
        let store = open_store(&config).await?;
        Ok(Self::with_backend(store, config))
    }

    /// Binds an already opened backend.
    pub fn with_backend(store: Arc<dyn RecordStore>, config: StoreConfig) -> Self {
        info!(
            "Host database on {} backend, hosts index {}{}",
            store.backend_name(),
            config.prefix,
            config.hosts_index
        );
        let hosts_index = format!("{}{}", config.prefix, config.hosts_index);
        HostDb {
            store,
            config,
            hosts_index,
            stats: Arc::new(StoreStats::new()),
        }
    }

    /// Concrete name of a logical index (`prefix + logical`).
    pub fn index_name(&self, logical: &str) -> String {
        format!("{}{}", self.config.prefix, logical)
    }

    pub fn hosts_index(&self) -> &str {
        &self.hosts_index
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn flavor(&self) -> Flavor {
        self.config.flavor
    }

    pub fn stats(&self) -> Arc<StoreStats> {
        Arc::clone(&self.stats)
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Index specs [`init`](Self::init) recreates.
    pub fn index_specs(&self) -> Vec<IndexSpec> {
        vec![IndexSpec::new(self.hosts_index.clone(), Mapping::hosts_default())]
    }

    /// Mapping the hosts index was created with, `None` before [`init`](Self::init).
    pub async fn hosts_mapping(&self) -> Result<Option<Mapping>, DatabaseError> {
        self.store.index_mapping(&self.hosts_index).await
    }

    /// Drops and recreates this database's indexes, discarding their records.
    ///
    /// Must not run concurrently with ingestion into the same indexes.
    pub async fn init(&self) -> Result<(), DatabaseError> {
        let report = self.init_indexes(&self.index_specs()).await;
        match report.results.into_iter().find_map(|r| r.result.err()) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Recreates each index, continuing past failures.
    pub async fn init_indexes(&self, specs: &[IndexSpec]) -> InitReport {
        let mut report = InitReport::default();
        for spec in specs {
            let result = match spec.mapping.validate() {
                Ok(()) => self.store.init_index(spec).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                error!("Failed to initialize index {}: {e}", spec.name);
            }
            report.results.push(IndexInitResult {
                index: spec.name.clone(),
                result: self.track(Operation::InitIndex, result),
            });
        }
        report
    }

    /// Stores a record as a new document and returns its id.
    ///
    /// # Errors
    ///
    /// `InvalidRecord` before any backend call; `StoreError` if the index is
    /// missing or the write is rejected.
    pub async fn store_host(&self, record: &HostRecord) -> Result<RecordId, DatabaseError> {
        let result = match validate(record) {
            Ok(()) => self.store.store(&self.hosts_index, record).await,
            Err(e) => Err(e),
        };
        if let Ok(id) = &result {
            debug!("Stored {} as {id}", record.addr);
        }
        self.track(Operation::Store, result)
    }

    /// Exact number of records matching `filter`.
    pub async fn count(&self, filter: &Filter) -> Result<u64, DatabaseError> {
        let index = &self.hosts_index;
        debug!("count {index}: {}", filter.to_query_json());
        let result = self.store.count(index, filter).await;
        self.track(Operation::Count, result)
    }

    /// Lazily streams every record matching `filter`, one page at a time.
    pub fn scan<'a>(&'a self, filter: &'a Filter) -> RecordStream<'a> {
        self.scan_with_page_size(filter, self.config.page_size)
    }

    pub fn scan_with_page_size<'a>(&'a self, filter: &'a Filter, page_size: usize) -> RecordStream<'a> {
        let index = &self.hosts_index;
        debug!("scan {index} (pages of {page_size}): {}", filter.to_query_json());
        self.stats.increment_operation(Operation::Scan);
        let stats = &self.stats;
        self.store
            .scan(index, filter, page_size)
            .inspect(move |item| {
                if let Err(e) = item {
                    stats.increment_error(e.kind());
                }
            })
            .boxed()
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<HostRecord>, DatabaseError> {
        self.store.get(&self.hosts_index, id).await
    }

    /// Removes a whole record. Returns whether it existed.
    pub async fn remove_host(&self, id: RecordId) -> Result<bool, DatabaseError> {
        let result = self.store.remove(&self.hosts_index, id).await;
        self.track(Operation::Remove, result)
    }

    /// Stores `record`, or merges it into the record already in the
    /// configured merge scope.
    ///
    /// # Errors
    ///
    /// `InvalidRecord` before any backend call, `MergeConflict` when
    /// concurrent writers keep winning, or the backend's error.
    pub async fn store_or_merge_host(&self, record: HostRecord) -> Result<MergeOutcome, DatabaseError> {
        let result = store_or_merge(
            self.store.as_ref(),
            &self.hosts_index,
            record,
            self.config.merge_scope,
            merge_retry_strategy(),
        )
        .await;
        self.track_merge(result)
    }

    /// Merges `record` into an existing record in scope. Returns `None`
    /// without writing when there is none.
    pub async fn merge_host(&self, record: HostRecord) -> Result<Option<MergeOutcome>, DatabaseError> {
        let result = merge_only(
            self.store.as_ref(),
            &self.hosts_index,
            record,
            self.config.merge_scope,
            merge_retry_strategy(),
        )
        .await;
        match result {
            Ok(Some(outcome)) => self.track_merge(Ok(outcome)).map(Some),
            Ok(None) => Ok(None),
            Err(e) => self.track_merge(Err(e)).map(Some),
        }
    }

    fn track<T>(&self, op: Operation, result: Result<T, DatabaseError>) -> Result<T, DatabaseError> {
        match &result {
            Ok(_) => self.stats.increment_operation(op),
            Err(e) => self.stats.increment_error(e.kind()),
        }
        result
    }

    fn track_merge(
        &self,
        result: Result<MergeOutcome, DatabaseError>,
    ) -> Result<MergeOutcome, DatabaseError> {
        match &result {
            Ok(outcome) => self.stats.increment_operation(match outcome {
                MergeOutcome::Inserted(_) => Operation::MergeInsert,
                MergeOutcome::Merged(_) => Operation::MergeUpdate,
                MergeOutcome::Unchanged(_) => Operation::MergeUnchanged,
            }),
            Err(e) => self.stats.increment_error(e.kind()),
        }
        result
    }
}
