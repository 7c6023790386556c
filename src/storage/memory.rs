//! In-process backend.
//!
//! Keeps every index in memory behind one mutex, which plays the part of the
//! backend's own atomicity: each trait call is one critical section, exactly
//! like one statement against a real database. Used for tests and for
//! `memory://` connection URLs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use serde_json::Value;

use super::document::{from_document, to_document};
use super::store::{RecordStore, RecordStream, VersionedRecord};
use crate::error_handling::DatabaseError;
use crate::filter::{eval, Filter};
use crate::mapping::{IndexSpec, Mapping};
use crate::record::{HostRecord, RecordId};

struct StoredDoc {
    version: i64,
    doc: String,
}

struct MemoryIndex {
    mapping: Mapping,
    records: BTreeMap<i64, StoredDoc>,
}

/// In-memory [`RecordStore`].
pub struct MemoryStore {
    indexes: Mutex<HashMap<String, MemoryIndex>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            indexes: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, MemoryIndex>>, DatabaseError> {
        self.indexes.lock().map_err(|_| {
            DatabaseError::BackendUnavailable("memory backend lock poisoned".to_string())
        })
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Ids and documents of records matching a resolved filter, in id order,
    /// starting after `after`.
    fn matching(
        index: &MemoryIndex,
        resolved: &Filter,
        after: i64,
        limit: usize,
    ) -> Result<Vec<(i64, i64, String)>, DatabaseError> {
        let mut out = Vec::new();
        for (id, stored) in index.records.range(after.saturating_add(1)..) {
            if out.len() >= limit {
                break;
            }
            let value: Value = serde_json::from_str(&stored.doc)
                .map_err(|e| DatabaseError::StoreError(format!("corrupt document {id}: {e}")))?;
            if eval::matches(resolved, &value) {
                out.push((*id, stored.version, stored.doc.clone()));
            }
        }
        Ok(out)
    }

    fn fetch_page(
        &self,
        index: &str,
        filter: &Filter,
        after: i64,
        page_size: usize,
    ) -> Result<Vec<(i64, String)>, DatabaseError> {
        let indexes = self.lock()?;
        let idx = existing(&indexes, index)?;
        let resolved = idx.mapping.resolve(filter)?;
        Ok(Self::matching(idx, &resolved, after, page_size)?
            .into_iter()
            .map(|(id, _, doc)| (id, doc))
            .collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn existing<'a>(
    indexes: &'a HashMap<String, MemoryIndex>,
    index: &str,
) -> Result<&'a MemoryIndex, DatabaseError> {
    indexes
        .get(index)
        .ok_or_else(|| DatabaseError::QueryError(format!("index {index} does not exist")))
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn init_index(&self, spec: &IndexSpec) -> Result<(), DatabaseError> {
        let mut indexes = self.lock()?;
        indexes.insert(
            spec.name.clone(),
            MemoryIndex {
                mapping: spec.mapping.clone(),
                records: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn index_mapping(&self, index: &str) -> Result<Option<Mapping>, DatabaseError> {
        Ok(self.lock()?.get(index).map(|i| i.mapping.clone()))
    }

    async fn store(&self, index: &str, record: &HostRecord) -> Result<RecordId, DatabaseError> {
        let doc = to_document(record)?;
        let mut indexes = self.lock()?;
        let idx = indexes
            .get_mut(index)
            .ok_or_else(|| DatabaseError::StoreError(format!("index {index} does not exist")))?;
        let id = self.allocate_id();
        idx.records.insert(id, StoredDoc { version: 1, doc });
        Ok(RecordId::new(id))
    }

    async fn count(&self, index: &str, filter: &Filter) -> Result<u64, DatabaseError> {
        let indexes = self.lock()?;
        let idx = existing(&indexes, index)?;
        let resolved = idx.mapping.resolve(filter)?;
        let n = Self::matching(idx, &resolved, 0, usize::MAX)?.len();
        Ok(n as u64)
    }

    fn scan<'a>(&'a self, index: &'a str, filter: &'a Filter, page_size: usize) -> RecordStream<'a> {
        let page_size = page_size.max(1);
        stream::try_unfold(Some(0i64), move |cursor| async move {
            let Some(after) = cursor else {
                return Ok(None);
            };
            let page = self.fetch_page(index, filter, after, page_size)?;
            if page.is_empty() {
                return Ok(None);
            }
            let next = if page.len() < page_size {
                None
            } else {
                page.last().map(|(id, _)| *id)
            };
            let records = page
                .into_iter()
                .map(|(id, doc)| from_document(RecordId::new(id), &doc))
                .collect::<Vec<_>>();
            Ok::<_, DatabaseError>(Some((stream::iter(records), next)))
        })
        .try_flatten()
        .boxed()
    }

    async fn get(&self, index: &str, id: RecordId) -> Result<Option<HostRecord>, DatabaseError> {
        let doc = {
            let indexes = self.lock()?;
            indexes
                .get(index)
                .and_then(|i| i.records.get(&id.get()))
                .map(|s| s.doc.clone())
        };
        doc.map(|d| from_document(id, &d)).transpose()
    }

    async fn remove(&self, index: &str, id: RecordId) -> Result<bool, DatabaseError> {
        let mut indexes = self.lock()?;
        Ok(indexes
            .get_mut(index)
            .map(|i| i.records.remove(&id.get()).is_some())
            .unwrap_or(false))
    }

    async fn first_versioned(
        &self,
        index: &str,
        filter: &Filter,
    ) -> Result<Option<VersionedRecord>, DatabaseError> {
        let found = {
            let indexes = self.lock()?;
            let idx = existing(&indexes, index)?;
            let resolved = idx.mapping.resolve(filter)?;
            Self::matching(idx, &resolved, 0, 1)?.into_iter().next()
        };
        found
            .map(|(id, version, doc)| {
                let id = RecordId::new(id);
                Ok(VersionedRecord {
                    id,
                    version,
                    record: from_document(id, &doc)?,
                })
            })
            .transpose()
    }

    async fn insert_if_absent(
        &self,
        index: &str,
        filter: &Filter,
        record: &HostRecord,
    ) -> Result<Option<RecordId>, DatabaseError> {
        let doc = to_document(record)?;
        let mut indexes = self.lock()?;
        let idx = indexes
            .get_mut(index)
            .ok_or_else(|| DatabaseError::StoreError(format!("index {index} does not exist")))?;
        let resolved = idx.mapping.resolve(filter)?;
        if !Self::matching(idx, &resolved, 0, 1)?.is_empty() {
            return Ok(None);
        }
        let id = self.allocate_id();
        idx.records.insert(id, StoredDoc { version: 1, doc });
        Ok(Some(RecordId::new(id)))
    }

    async fn replace_if_version(
        &self,
        index: &str,
        id: RecordId,
        version: i64,
        record: &HostRecord,
    ) -> Result<bool, DatabaseError> {
        let doc = to_document(record)?;
        let mut indexes = self.lock()?;
        let stored = indexes
            .get_mut(index)
            .and_then(|i| i.records.get_mut(&id.get()));
        match stored {
            Some(stored) if stored.version == version => {
                stored.version += 1;
                stored.doc = doc;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
