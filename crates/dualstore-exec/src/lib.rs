//! # dualstore-exec
//!
//! Binds a parsed statement to router calls: positional `INSERT` binding,
//! `SELECT *` / `COUNT(*)` projection handling, and type coercion, composing
//! the per-crate error enums into one `EngineError` the CLI matches on.

use thiserror::Error;

use dualstore_router::{Router, RouterError};
use dualstore_sql::coerce;
use dualstore_sql::parser::{ParseError, Projection, Statement};
use dualstore_sql::storage::StorageError;
use dualstore_sql::value::{Row, Scalar, Schema};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error("expected {expected} value(s) for table '{table}', got {got}")]
    Arity {
        table: String,
        expected: usize,
        got: usize,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// The outcome of running one statement, shaped for the CLI to render.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(Vec<Row>),
    RowsAffected(usize),
    TableCreated(String),
    Tables(Vec<String>),
}

/// Runs one parsed statement against `router`.
pub async fn execute(router: &Router, statement: Statement) -> EngineResult<QueryResult> {
    match statement {
        Statement::Create(create) => {
            let schema = Schema::new(create.table.clone(), create.columns);
            router.create_table(schema).await?;
            Ok(QueryResult::TableCreated(create.table))
        }
        Statement::Insert(insert) => {
            let schema = router.get_schema(&insert.table).await?;
            let row = bind_positional(&schema, &insert.values)?;
            router.insert(&insert.table, row).await?;
            Ok(QueryResult::RowsAffected(1))
        }
        Statement::Select(select) => {
            let columns = resolve_projection(&select.projection);
            let rows = router
                .select(&select.table, &columns, &select.predicate)
                .await?;
            Ok(QueryResult::Rows(rows))
        }
        Statement::Update(update) => {
            let affected = router
                .update(&update.table, &update.assignments, &update.predicate)
                .await?;
            Ok(QueryResult::RowsAffected(affected))
        }
        Statement::Delete(delete) => {
            let affected = router.delete(&delete.table, &delete.predicate).await?;
            Ok(QueryResult::RowsAffected(affected))
        }
        Statement::ShowTables => Ok(QueryResult::Tables(router.show_tables().await?)),
    }
}

/// `SELECT *` is passed through as the `"*"` sentinel the router expands
/// against the live schema; `COUNT(*)` keeps its reserved spelling.
fn resolve_projection(projection: &Projection) -> Vec<String> {
    match projection {
        Projection::Star => vec!["*".to_string()],
        Projection::Columns(columns) => columns.clone(),
    }
}

/// Binds `values` positionally against `schema`'s column order, coercing
/// each to its column's declared type.
fn bind_positional(schema: &Schema, values: &[Scalar]) -> EngineResult<Row> {
    if values.len() != schema.columns.len() {
        return Err(EngineError::Arity {
            table: schema.name.clone(),
            expected: schema.columns.len(),
            got: values.len(),
        });
    }

    let mut row = Row::new();
    for (column, value) in schema.columns.iter().zip(values) {
        row.insert(column.name.clone(), coerce(value, column.ty)?);
    }
    Ok(row)
}
