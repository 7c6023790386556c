//! SQLite backend.
//!
//! Indexes are rows of the `indexes` table; records are JSON documents in
//! `records`, partitioned by `index_name`. Filters are resolved against the
//! index mapping and translated into JSON1 predicates (see [`query`]).
//!
//! Every call is bounded by the configured timeout. The conditional writes
//! used by merge are single statements, so SQLite's write lock makes them
//! atomic.

mod query;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::{stream, StreamExt, TryStreamExt};
use log::{debug, info};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::document::{from_document, to_document};
use super::store::{RecordStore, RecordStream, VersionedRecord};
use crate::error_handling::DatabaseError;
use crate::filter::Filter;
use crate::mapping::{IndexSpec, Mapping};
use crate::record::{HostRecord, RecordId};

use query::push_filter;

/// Extended result code SQLite returns when a WAL snapshot went stale
/// before the statement could write.
const SQLITE_BUSY_SNAPSHOT: &str = "517";

/// [`RecordStore`] over a SQLite connection pool.
pub struct SqliteStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteStore {
    /// Wraps a pool whose schema is already migrated.
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        SqliteStore { pool, timeout }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Runs one backend call under the configured timeout.
    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, DatabaseError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                DatabaseError::BackendUnavailable(format!(
                    "{what} timed out after {:?}",
                    self.timeout
                ))
            })?
    }

    /// Mapping of an index that must exist.
    async fn required_mapping(&self, index: &str) -> Result<Mapping, DatabaseError> {
        self.load_mapping(index)
            .await?
            .ok_or_else(|| DatabaseError::QueryError(format!("index {index} does not exist")))
    }

    async fn load_mapping(&self, index: &str) -> Result<Option<Mapping>, DatabaseError> {
        let text: Option<String> = sqlx::query_scalar("SELECT mapping FROM indexes WHERE name = ?")
            .bind(index)
            .fetch_optional(&self.pool)
            .await
            .map_err(read_error)?;
        text.map(|t| {
            serde_json::from_str(&t).map_err(|e| {
                DatabaseError::QueryError(format!("corrupt mapping for index {index}: {e}"))
            })
        })
        .transpose()
    }

    async fn fetch_page(
        &self,
        index: &str,
        filter: &Filter,
        after: i64,
        page_size: usize,
    ) -> Result<Vec<(i64, String)>, DatabaseError> {
        self.bounded("scan", async {
            let resolved = self.required_mapping(index).await?.resolve(filter)?;
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, doc FROM records WHERE index_name = ");
            qb.push_bind(index.to_string());
            qb.push(" AND id > ");
            qb.push_bind(after);
            qb.push(" AND (");
            push_filter(&mut qb, &resolved);
            qb.push(") ORDER BY id LIMIT ");
            qb.push_bind(i64::try_from(page_size).unwrap_or(i64::MAX));

            let rows = qb.build().fetch_all(&self.pool).await.map_err(read_error)?;
            rows.iter()
                .map(|row| -> Result<(i64, String), DatabaseError> {
                    Ok((
                        row.try_get::<i64, _>("id").map_err(read_error)?,
                        row.try_get::<String, _>("doc").map_err(read_error)?,
                    ))
                })
                .collect()
        })
        .await
    }
}

/// Classifies a failed read.
fn read_error(e: sqlx::Error) -> DatabaseError {
    classify(e, DatabaseError::QueryError)
}

/// Classifies a failed write.
fn write_error(e: sqlx::Error) -> DatabaseError {
    classify(e, DatabaseError::StoreError)
}

fn classify(e: sqlx::Error, otherwise: fn(String) -> DatabaseError) -> DatabaseError {
    if is_unavailable(&e) {
        DatabaseError::BackendUnavailable(e.to_string())
    } else {
        otherwise(e.to_string())
    }
}

fn is_unavailable(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        // SQLITE_BUSY / SQLITE_LOCKED and their extended codes
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|c| c.parse::<i32>().ok())
            .is_some_and(|c| matches!(c & 0xff, 5 | 6)),
        _ => false,
    }
}

/// A conditional write that lost a race against a concurrent writer.
fn is_stale_snapshot(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(SQLITE_BUSY_SNAPSHOT))
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn init_index(&self, spec: &IndexSpec) -> Result<(), DatabaseError> {
        let mapping = serde_json::to_string(&spec.mapping)
            .map_err(|e| DatabaseError::StoreError(format!("cannot serialize mapping: {e}")))?;
        self.bounded("init_index", async {
            let mut tx = self.pool.begin().await.map_err(write_error)?;
            let dropped = sqlx::query("DELETE FROM records WHERE index_name = ?")
                .bind(&spec.name)
                .execute(&mut *tx)
                .await
                .map_err(write_error)?
                .rows_affected();
            sqlx::query("DELETE FROM indexes WHERE name = ?")
                .bind(&spec.name)
                .execute(&mut *tx)
                .await
                .map_err(write_error)?;
            sqlx::query("INSERT INTO indexes (name, mapping, created_at_ms) VALUES (?, ?, ?)")
                .bind(&spec.name)
                .bind(&mapping)
                .bind(Utc::now().timestamp_millis())
                .execute(&mut *tx)
                .await
                .map_err(write_error)?;
            tx.commit().await.map_err(write_error)?;
            info!("Recreated index {} ({dropped} records dropped)", spec.name);
            Ok(())
        })
        .await
    }

    async fn index_mapping(&self, index: &str) -> Result<Option<Mapping>, DatabaseError> {
        self.bounded("index_mapping", self.load_mapping(index)).await
    }

    async fn store(&self, index: &str, record: &HostRecord) -> Result<RecordId, DatabaseError> {
        let doc = to_document(record)?;
        self.bounded("store", async {
            let result = sqlx::query(
                "INSERT INTO records (index_name, addr, source, doc)
                 SELECT name, ?, ?, ? FROM indexes WHERE name = ?",
            )
            .bind(record.addr.to_string())
            .bind(record.source.as_deref())
            .bind(&doc)
            .bind(index)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
            if result.rows_affected() == 0 {
                return Err(DatabaseError::StoreError(format!(
                    "index {index} does not exist"
                )));
            }
            Ok(RecordId::new(result.last_insert_rowid()))
        })
        .await
    }

    async fn count(&self, index: &str, filter: &Filter) -> Result<u64, DatabaseError> {
        self.bounded("count", async {
            let resolved = self.required_mapping(index).await?.resolve(filter)?;
            let mut qb =
                QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM records WHERE index_name = ");
            qb.push_bind(index.to_string());
            qb.push(" AND (");
            push_filter(&mut qb, &resolved);
            qb.push(")");
            debug!("count {index}: {}", qb.sql());
            let n: i64 = qb
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await
                .map_err(read_error)?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
        .await
    }

    fn scan<'a>(&'a self, index: &'a str, filter: &'a Filter, page_size: usize) -> RecordStream<'a> {
        let page_size = page_size.max(1);
        stream::try_unfold(Some(0i64), move |cursor| async move {
            let Some(after) = cursor else {
                return Ok(None);
            };
            let page = self.fetch_page(index, filter, after, page_size).await?;
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
        let doc: Option<String> = self
            .bounded("get", async {
                sqlx::query_scalar("SELECT doc FROM records WHERE index_name = ? AND id = ?")
                    .bind(index)
                    .bind(id.get())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(read_error)
            })
            .await?;
        doc.map(|d| from_document(id, &d)).transpose()
    }

    async fn remove(&self, index: &str, id: RecordId) -> Result<bool, DatabaseError> {
        self.bounded("remove", async {
            let result = sqlx::query("DELETE FROM records WHERE index_name = ? AND id = ?")
                .bind(index)
                .bind(id.get())
                .execute(&self.pool)
                .await
                .map_err(write_error)?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn first_versioned(
        &self,
        index: &str,
        filter: &Filter,
    ) -> Result<Option<VersionedRecord>, DatabaseError> {
        let row = self
            .bounded("first_versioned", async {
                let resolved = self.required_mapping(index).await?.resolve(filter)?;
                let mut qb = QueryBuilder::<Sqlite>::new(
                    "SELECT id, version, doc FROM records WHERE index_name = ",
                );
                qb.push_bind(index.to_string());
                qb.push(" AND (");
                push_filter(&mut qb, &resolved);
                qb.push(") ORDER BY id LIMIT 1");
                let row = qb
                    .build()
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(read_error)?;
                row.map(|r| -> Result<(i64, i64, String), DatabaseError> {
                    Ok((
                        r.try_get("id").map_err(read_error)?,
                        r.try_get("version").map_err(read_error)?,
                        r.try_get("doc").map_err(read_error)?,
                    ))
                })
                .transpose()
            })
            .await?;

        row.map(|(id, version, doc)| {
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
        self.bounded("insert_if_absent", async {
            let mapping = self
                .load_mapping(index)
                .await?
                .ok_or_else(|| DatabaseError::StoreError(format!("index {index} does not exist")))?;
            let resolved = mapping.resolve(filter)?;

            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO records (index_name, addr, source, doc) SELECT ",
            );
            qb.push_bind(index.to_string());
            qb.push(", ");
            qb.push_bind(record.addr.to_string());
            qb.push(", ");
            qb.push_bind(record.source.clone());
            qb.push(", ");
            qb.push_bind(doc.clone());
            qb.push(" WHERE NOT EXISTS (SELECT 1 FROM records WHERE index_name = ");
            qb.push_bind(index.to_string());
            qb.push(" AND (");
            push_filter(&mut qb, &resolved);
            qb.push("))");

            match qb.build().execute(&self.pool).await {
                Ok(result) if result.rows_affected() == 1 => {
                    Ok(Some(RecordId::new(result.last_insert_rowid())))
                }
                Ok(_) => Ok(None),
                Err(e) if is_stale_snapshot(&e) => Ok(None),
                Err(e) => Err(write_error(e)),
            }
        })
        .await
    }

    async fn replace_if_version(
        &self,
        index: &str,
        id: RecordId,
        version: i64,
        record: &HostRecord,
    ) -> Result<bool, DatabaseError> {
        let doc = to_document(record)?;
        self.bounded("replace_if_version", async {
            let result = sqlx::query(
                "UPDATE records SET doc = ?, source = ?, version = version + 1
                 WHERE index_name = ? AND id = ? AND version = ?",
            )
            .bind(&doc)
            .bind(record.source.as_deref())
            .bind(index)
            .bind(id.get())
            .bind(version)
            .execute(&self.pool)
            .await;
            match result {
                Ok(r) => Ok(r.rows_affected() == 1),
                Err(e) if is_stale_snapshot(&e) => Ok(false),
                Err(e) => Err(write_error(e)),
            }
        })
        .await
    }
}
