//! The `Storage` contract shared by the OLTP and OLAP engines, and the
//! error kinds both surface.

use thiserror::Error;

use crate::parser::{Assignment, Predicate};
use crate::value::{Row, Schema};

/// Error kinds surfaced by either storage engine. Propagated to callers
/// unchanged.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("missing required column '{0}'")]
    MissingRequired(String),

    #[error("no rows matched the predicate")]
    NoRowsMatched,

    #[error("storage engine is read-only")]
    ReadOnly,

    #[error("page would exceed the fixed page size")]
    StorageFull,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Common operations both the B-tree OLTP engine and the columnar OLAP
/// replica implement.
///
/// Mutating operations take `&mut self`: the router places each engine
/// behind its own reader/writer lock rather than relying on
/// interior mutability inside the engines themselves.
pub trait Storage {
    fn create_table(&mut self, schema: Schema) -> StorageResult<()>;

    fn insert(&mut self, table: &str, row: Row) -> StorageResult<()>;

    /// `columns` may contain the reserved spelling `"COUNT(*)"`, in which
    /// case the result is a single row `{"count": N}`.
    fn select(&self, table: &str, columns: &[String], predicate: &Predicate)
        -> StorageResult<Vec<Row>>;

    /// Returns the number of rows mutated. Zero matches against a
    /// non-empty predicate is a `NoRowsMatched` error.
    fn update(
        &mut self,
        table: &str,
        assignments: &[Assignment],
        predicate: &Predicate,
    ) -> StorageResult<usize>;

    fn delete(&mut self, table: &str, predicate: &Predicate) -> StorageResult<usize>;

    fn show_tables(&self) -> StorageResult<Vec<String>>;

    fn get_schema(&self, table: &str) -> StorageResult<Schema>;

    fn close(&mut self) -> StorageResult<()>;
}
