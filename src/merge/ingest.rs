//! Store-or-merge ingestion.
//!
//! Each attempt reads the record in scope, then writes conditionally: a
//! fresh insert only succeeds if nothing in scope appeared meanwhile, and a
//! merge only replaces the version it read. Losing either race restarts the
//! whole attempt after a jittered backoff.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use log::{debug, warn};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use super::policy::merge_records;
use super::scope::MergeScope;
use crate::config::{
    MERGE_RETRY_ATTEMPTS, MERGE_RETRY_BASE_MS, MERGE_RETRY_FACTOR, MERGE_RETRY_MAX_DELAY,
};
use crate::error_handling::DatabaseError;
use crate::record::{normalize, validate, HostRecord, RecordId};
use crate::storage::RecordStore;

/// What `store_or_merge` did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No record was in scope; a new one was stored.
    Inserted(RecordId),
    /// The record was merged into an existing one.
    Merged(RecordId),
    /// The stored record already held everything; nothing was written.
    Unchanged(RecordId),
}

impl MergeOutcome {
    /// Id of the record that now holds the ingested data.
    pub fn id(&self) -> RecordId {
        match self {
            MergeOutcome::Inserted(id) | MergeOutcome::Merged(id) | MergeOutcome::Unchanged(id) => {
                *id
            }
        }
    }
}

/// Creates the backoff schedule for merge conflict retries.
///
/// Exponential from `MERGE_RETRY_BASE_MS` by `MERGE_RETRY_FACTOR`, capped at
/// `MERGE_RETRY_MAX_DELAY`, jittered, and limited to `MERGE_RETRY_ATTEMPTS`
/// retries.
pub fn merge_retry_strategy() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(MERGE_RETRY_BASE_MS)
        .factor(MERGE_RETRY_FACTOR)
        .max_delay(MERGE_RETRY_MAX_DELAY)
        .map(jitter)
        .take(MERGE_RETRY_ATTEMPTS)
}

enum AttemptError {
    /// Another writer changed the scope between our read and our write.
    Conflict,
    Failed(DatabaseError),
}

impl From<DatabaseError> for AttemptError {
    fn from(e: DatabaseError) -> Self {
        AttemptError::Failed(e)
    }
}

/// Stores `record`, or merges it into the record already in `scope`.
///
/// The record is validated and normalized first, so ingesting the same
/// record twice leaves the store unchanged the second time.
///
/// # Errors
///
/// - `DatabaseError::InvalidRecord` before any backend call
/// - `DatabaseError::MergeConflict` once `retry` is exhausted
/// - any backend error, unretried
pub async fn store_or_merge<S, I>(
    store: &S,
    index: &str,
    record: HostRecord,
    scope: MergeScope,
    retry: I,
) -> Result<MergeOutcome, DatabaseError>
where
    S: RecordStore + ?Sized,
    I: IntoIterator<Item = Duration>,
{
    validate(&record)?;
    let record = normalize(record);
    let outcome = run_attempts(store, index, &record, scope, retry, true).await?;
    // Inserting attempts always produce an outcome.
    outcome.ok_or_else(|| {
        DatabaseError::StoreError(format!("no record stored for {}", record.addr))
    })
}

/// Merges `record` into the record in `scope` if there is one.
///
/// Returns `None`, without writing, when nothing is in scope.
pub async fn merge_only<S, I>(
    store: &S,
    index: &str,
    record: HostRecord,
    scope: MergeScope,
    retry: I,
) -> Result<Option<MergeOutcome>, DatabaseError>
where
    S: RecordStore + ?Sized,
    I: IntoIterator<Item = Duration>,
{
    validate(&record)?;
    let record = normalize(record);
    run_attempts(store, index, &record, scope, retry, false).await
}

async fn run_attempts<S, I>(
    store: &S,
    index: &str,
    record: &HostRecord,
    scope: MergeScope,
    retry: I,
    insert_missing: bool,
) -> Result<Option<MergeOutcome>, DatabaseError>
where
    S: RecordStore + ?Sized,
    I: IntoIterator<Item = Duration>,
{
    let attempts = AtomicUsize::new(0);
    let result = RetryIf::start(
        retry,
        || {
            attempts.fetch_add(1, Ordering::SeqCst);
            attempt(store, index, record, scope, insert_missing)
        },
        |e: &AttemptError| match e {
            AttemptError::Conflict => {
                warn!(
                    "Merge conflict on {} in {index} (attempt {})",
                    record.addr,
                    attempts.load(Ordering::SeqCst)
                );
                true
            }
            AttemptError::Failed(_) => false,
        },
    )
    .await;

    match result {
        Ok(outcome) => Ok(outcome),
        Err(AttemptError::Failed(e)) => Err(e),
        Err(AttemptError::Conflict) => Err(DatabaseError::MergeConflict {
            addr: record.addr.to_string(),
            attempts: attempts.load(Ordering::SeqCst),
        }),
    }
}

async fn attempt<S>(
    store: &S,
    index: &str,
    record: &HostRecord,
    scope: MergeScope,
    insert_missing: bool,
) -> Result<Option<MergeOutcome>, AttemptError>
where
    S: RecordStore + ?Sized,
{
    let key = scope.key_filter(record);
    let Some(current) = store.first_versioned(index, &key).await? else {
        if !insert_missing {
            return Ok(None);
        }
        return match store.insert_if_absent(index, &key, record).await? {
            Some(id) => {
                debug!("Inserted {} into {index} as {id}", record.addr);
                Ok(Some(MergeOutcome::Inserted(id)))
            }
            None => Err(AttemptError::Conflict),
        };
    };

    let merged = merge_records(&current.record, record);
    if merged == current.record {
        return Ok(Some(MergeOutcome::Unchanged(current.id)));
    }
    if store
        .replace_if_version(index, current.id, current.version, &merged)
        .await?
    {
        debug!(
            "Merged {} into record {} of {index} (version {})",
            record.addr,
            current.id,
            current.version + 1
        );
        Ok(Some(MergeOutcome::Merged(current.id)))
    } else {
        Err(AttemptError::Conflict)
    }
}
