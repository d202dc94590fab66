//! # dualstore-router
//!
//! The hybrid query router: classifies queries as OLTP or OLAP, dispatches
//! `create_table`/`insert`/`update`/`delete`/`select`/`show_tables`/`close`
//! between the B-tree primary and the columnar replica, and runs the
//! periodic sync worker that keeps the replica caught up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use dualstore_olap::OlapReplica;
use dualstore_oltp::OltpEngine;
use dualstore_sql::parser::{Assignment, Predicate};
use dualstore_sql::storage::{Storage, StorageError};
use dualstore_sql::value::{Row, Schema};

/// The fixed, non-configurable set of column names the classifier treats as
/// identifier columns.
const ID_COLUMNS: [&str; 3] = ["id", "_id", "pk"];

/// Errors the router itself can surface, on top of whatever either engine
/// raises (propagated through [`StorageError`] unchanged).
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type RouterResult<T> = Result<T, RouterError>;

/// Classification outcome for a query, used both for dispatch and for the
/// `EXPLAIN` meta-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Oltp,
    Olap,
}

impl Classification {
    #[must_use]
    pub const fn engine_name(self) -> &'static str {
        match self {
            Self::Oltp => "primary (OLTP)",
            Self::Olap => "replica (OLAP)",
        }
    }
}

/// `is_olap(columns, where)` is true iff the predicate is empty, the
/// projection is `*`/empty, or the predicate touches any column outside the
/// fixed id-set.
#[must_use]
pub fn is_olap(columns: &[String], predicate: &Predicate) -> bool {
    if predicate.is_empty() {
        return true;
    }
    if columns.is_empty() || columns.iter().any(|c| c == "*") {
        return true;
    }
    predicate
        .0
        .iter()
        .any(|eq| !ID_COLUMNS.iter().any(|id| id.eq_ignore_ascii_case(&eq.column)))
}

#[must_use]
pub fn classify(columns: &[String], predicate: &Predicate) -> Classification {
    if is_olap(columns, predicate) {
        Classification::Olap
    } else {
        Classification::Oltp
    }
}

/// Composes the B-tree primary and the columnar replica behind their own
/// reader/writer locks, and runs the sync worker.
pub struct Router {
    primary: RwLock<OltpEngine>,
    replica: RwLock<OlapReplica>,
    sync_gate: Mutex<()>,
    sync_interval: Duration,
    last_sync_at: RwLock<Option<Instant>>,
}

impl Router {
    #[must_use]
    pub fn new(primary: OltpEngine, replica: OlapReplica, sync_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            primary: RwLock::new(primary),
            replica: RwLock::new(replica),
            sync_gate: Mutex::new(()),
            sync_interval,
            last_sync_at: RwLock::new(None),
        })
    }

    pub async fn create_table(&self, schema: Schema) -> RouterResult<()> {
        self.primary.write().await.create_table(schema.clone())?;
        if let Err(e) = self.replica.write().await.create_table(schema) {
            tracing::warn!(error = %e, "best-effort replica create_table failed");
        }
        Ok(())
    }

    pub async fn insert(&self, table: &str, row: Row) -> RouterResult<()> {
        self.primary.write().await.insert(table, row)?;
        Ok(())
    }

    pub async fn update(
        &self,
        table: &str,
        assignments: &[Assignment],
        predicate: &Predicate,
    ) -> RouterResult<usize> {
        Ok(self.primary.write().await.update(table, assignments, predicate)?)
    }

    pub async fn delete(&self, table: &str, predicate: &Predicate) -> RouterResult<usize> {
        Ok(self.primary.write().await.delete(table, predicate)?)
    }

    /// Always try `primary` first; fall back to `replica` only when
    /// `primary` came back empty and the query classifies as OLAP. A table
    /// that only the replica still knows about (e.g. the primary's file was
    /// deleted out from under it) is treated the same as an empty primary
    /// rather than an error, so the replica fallback below still runs.
    pub async fn select(
        &self,
        table: &str,
        columns: &[String],
        predicate: &Predicate,
    ) -> RouterResult<Vec<Row>> {
        let olap = is_olap(columns, predicate);
        let expanded;
        let columns = if columns.is_empty() || columns.iter().any(|c| c == "*") {
            expanded = match self.primary.read().await.get_schema(table) {
                Ok(schema) => schema.column_names(),
                Err(StorageError::UnknownTable(_)) => {
                    self.replica.read().await.get_schema(table)?.column_names()
                }
                Err(e) => return Err(e.into()),
            };
            expanded.as_slice()
        } else {
            columns
        };

        let primary_rows = match self.primary.read().await.select(table, columns, predicate) {
            Ok(rows) => rows,
            Err(StorageError::UnknownTable(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        if !primary_rows.is_empty() || !olap {
            return Ok(primary_rows);
        }

        match self.replica.read().await.select(table, columns, predicate) {
            Ok(rows) => Ok(rows),
            Err(StorageError::UnknownTable(_)) => Ok(primary_rows),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn show_tables(&self) -> RouterResult<Vec<String>> {
        Ok(self.primary.read().await.show_tables()?)
    }

    pub async fn get_schema(&self, table: &str) -> RouterResult<Schema> {
        Ok(self.primary.read().await.get_schema(table)?)
    }

    /// Closes both engines; the first error is returned but the second
    /// close is still attempted.
    pub async fn close(&self) -> RouterResult<()> {
        let primary_result = self.primary.write().await.close();
        let replica_result = self.replica.write().await.close();
        primary_result?;
        replica_result?;
        Ok(())
    }

    #[must_use]
    pub fn explain(&self, columns: &[String], predicate: &Predicate) -> Classification {
        classify(columns, predicate)
    }

    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    pub async fn last_sync_at(&self) -> Option<Instant> {
        *self.last_sync_at.read().await
    }

    /// Runs one sync iteration inline: for every primary table, copy its
    /// schema into the replica if absent, snapshot all its rows under a
    /// shared read lock, then release that lock before rewriting the
    /// replica's file under its own write lock. Only one sync
    /// may be in flight at a time; `last_sync_at` advances only on full
    /// success.
    pub async fn sync_now(&self) -> RouterResult<Duration> {
        let _gate = self.sync_gate.lock().await;
        let started = Instant::now();

        let tables = self.primary.read().await.show_tables()?;
        for table in &tables {
            let (schema, rows) = {
                let primary = self.primary.read().await;
                let schema = primary.get_schema(table)?;
                let rows = primary.select(table, &schema.column_names(), &Predicate::default())?;
                (schema, rows)
            };

            let mut replica = self.replica.write().await;
            if replica.get_schema(table).is_err() {
                if let Err(e) = replica.create_table(schema.clone()) {
                    tracing::warn!(table, error = %e, "sync: failed to create replica schema");
                }
            }
            if let Err(e) = replica.sync_table(&schema, rows) {
                tracing::warn!(table, error = %e, "sync: failed to rewrite replica table");
                return Err(e.into());
            }
        }

        let elapsed = started.elapsed();
        *self.last_sync_at.write().await = Some(Instant::now());
        Ok(elapsed)
    }

    /// Spawns the periodic sync worker. The returned handle's `abort()`
    /// (or simply dropping it) stops the worker within one pending-tick
    /// interval.
    pub fn spawn_sync_worker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(router.sync_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = router.sync_now().await {
                    tracing::warn!(error = %e, "scheduled sync failed");
                }
            }
        })
    }
}
