//! # dualstore-oltp
//!
//! The paged B-tree storage engine: a degenerate (single-data-page)
//! leaf-only B-tree that is the transactional source of truth for table
//! schemas and rows.

mod page;

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use dualstore_sql::parser::{Assignment, Predicate};
use dualstore_sql::storage::{Storage, StorageError, StorageResult};
use dualstore_sql::value::{Row, Scalar, Schema};
use dualstore_sql::{coerce, row_matches};

use page::{Pager, DATA_PAGE, METADATA_PAGE};

const TABLE_KEY_PREFIX: &str = "__table__";

/// The OLTP engine: one file holding a fixed header page, a metadata page
/// of serialised schemas, and a data page of serialised rows (spec
/// §4.3.1). Schemas and the next-row-id counters are cached in memory and
/// kept in lockstep with what's on disk.
pub struct OltpEngine {
    path: PathBuf,
    pager: Option<Pager>,
    schemas: HashMap<String, Schema>,
    next_row_id: HashMap<String, u64>,
}

impl OltpEngine {
    /// Opens (creating if absent) the B-tree file at `path`, creating its
    /// parent directory if needed.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let is_new = !path.exists();
        let file: File = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let pager = Pager::open(file)?;
        if is_new {
            page::init_file(&pager)?;
        }

        let mut engine = Self {
            path,
            pager: Some(pager),
            schemas: HashMap::new(),
            next_row_id: HashMap::new(),
        };
        engine.rebuild_caches()?;
        Ok(engine)
    }

    fn pager(&self) -> StorageResult<&Pager> {
        self.pager
            .as_ref()
            .ok_or_else(|| StorageError::Io(closed_error()))
    }

    /// Rebuilds the in-memory schema cache and per-table row-id counters
    /// from disk.
    fn rebuild_caches(&mut self) -> StorageResult<()> {
        let metadata = self.pager()?.read_page(METADATA_PAGE)?;
        self.schemas.clear();
        for (key, value) in page::decode_entries(&metadata) {
            if let Some(name) = key.strip_prefix(TABLE_KEY_PREFIX) {
                let schema: Schema = serde_json::from_slice(&value)
                    .map_err(|e| StorageError::TypeError(format!("corrupt schema: {e}")))?;
                self.schemas.insert(name.to_string(), schema);
            }
        }

        let data = self.pager()?.read_page(DATA_PAGE)?;
        self.next_row_id.clear();
        for (key, _) in page::decode_entries(&data) {
            if let Some((table, id)) = key.rsplit_once(':') {
                if let Ok(id) = id.parse::<u64>() {
                    let counter = self.next_row_id.entry(table.to_string()).or_insert(0);
                    *counter = (*counter).max(id + 1);
                }
            }
        }

        Ok(())
    }

    fn require_schema(&self, table: &str) -> StorageResult<&Schema> {
        self.schemas
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))
    }

    fn read_all_rows(&self, table: &str) -> StorageResult<Vec<(String, Row)>> {
        let prefix = format!("{table}:");
        let page = self.pager()?.read_page(DATA_PAGE)?;
        page::decode_entries(&page)
            .into_iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| {
                let row: Row = serde_json::from_slice(&value)
                    .map_err(|e| StorageError::TypeError(format!("corrupt row: {e}")))?;
                Ok((key, row))
            })
            .collect()
    }

    /// Rewrites the whole data page with `rows_by_key` plus every other
    /// table's untouched rows — the minimal core keeps all tables in one
    /// leaf page, so any row mutation rewrites the full page.
    fn rewrite_data_page(
        &mut self,
        table: &str,
        rows_by_key: Vec<(String, Row)>,
    ) -> StorageResult<()> {
        let prefix = format!("{table}:");
        let page = self.pager()?.read_page(DATA_PAGE)?;
        let mut entries: Vec<(String, Vec<u8>)> = page::decode_entries(&page)
            .into_iter()
            .filter(|(key, _)| !key.starts_with(&prefix))
            .collect();

        for (key, row) in rows_by_key {
            let value = serde_json::to_vec(&row)
                .map_err(|e| StorageError::TypeError(format!("cannot serialise row: {e}")))?;
            entries.push((key, value));
        }

        let encoded = page::encode_entries(&entries)?;
        self.pager()?.write_page(DATA_PAGE, &encoded)?;
        Ok(())
    }

    /// Validates and coerces a row against `schema`:
    /// every non-nullable column must be present; provided values are
    /// coerced to the column's declared type.
    fn validate_row(schema: &Schema, row: &Row) -> StorageResult<Row> {
        let mut out = Row::new();
        for column in &schema.columns {
            match row.get(&column.name) {
                Some(Scalar::Null) | None => {
                    if !column.nullable && row.get(&column.name).is_none() {
                        return Err(StorageError::MissingRequired(column.name.clone()));
                    }
                    if matches!(row.get(&column.name), Some(Scalar::Null)) && !column.nullable {
                        return Err(StorageError::MissingRequired(column.name.clone()));
                    }
                    out.insert(column.name.clone(), Scalar::Null);
                }
                Some(value) => {
                    out.insert(column.name.clone(), coerce(value, column.ty)?);
                }
            }
        }
        Ok(out)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn closed_error() -> std::io::Error {
    std::io::Error::other("storage engine is closed")
}

impl Storage for OltpEngine {
    fn create_table(&mut self, schema: Schema) -> StorageResult<()> {
        if self.schemas.contains_key(&schema.name) {
            return Err(StorageError::DuplicateTable(schema.name.clone()));
        }

        let page = self.pager()?.read_page(METADATA_PAGE)?;
        let mut entries = page::decode_entries(&page);
        let value = serde_json::to_vec(&schema)
            .map_err(|e| StorageError::TypeError(format!("cannot serialise schema: {e}")))?;
        entries.push((format!("{TABLE_KEY_PREFIX}{}", schema.name), value));

        let encoded = page::encode_entries(&entries)?;
        self.pager()?.write_page(METADATA_PAGE, &encoded)?;

        tracing::debug!(table = %schema.name, "created table");
        self.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    fn insert(&mut self, table: &str, row: Row) -> StorageResult<()> {
        let schema = self.require_schema(table)?.clone();
        let validated = Self::validate_row(&schema, &row)?;

        let row_id = *self.next_row_id.get(table).unwrap_or(&0);
        let key = format!("{table}:{row_id}");

        let page = self.pager()?.read_page(DATA_PAGE)?;
        let mut entries = page::decode_entries(&page);
        let value = serde_json::to_vec(&validated)
            .map_err(|e| StorageError::TypeError(format!("cannot serialise row: {e}")))?;
        entries.push((key, value));

        let encoded = page::encode_entries(&entries)?;
        self.pager()?.write_page(DATA_PAGE, &encoded)?;

        self.next_row_id.insert(table.to_string(), row_id + 1);
        tracing::debug!(table, row_id, "inserted row");
        Ok(())
    }

    fn select(
        &self,
        table: &str,
        columns: &[String],
        predicate: &Predicate,
    ) -> StorageResult<Vec<Row>> {
        let schema = self.require_schema(table)?;
        let prefix = format!("{table}:");
        let page = self.pager()?.read_page(DATA_PAGE)?;

        if columns.len() == 1 && columns[0] == "COUNT(*)" {
            let count = page::decode_entries(&page)
                .into_iter()
                .filter(|(key, _)| key.starts_with(&prefix))
                .filter_map(|(_, value)| serde_json::from_slice::<Row>(&value).ok())
                .filter(|row| row_matches(row, predicate))
                .count();
            let mut row = Row::new();
            #[allow(clippy::cast_possible_wrap)]
            row.insert("count", Scalar::Int(count as i64));
            return Ok(vec![row]);
        }

        for c in columns {
            if !schema.has_column(c) {
                return Err(StorageError::UnknownColumn(c.clone()));
            }
        }

        let rows = page::decode_entries(&page)
            .into_iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .filter_map(|(_, value)| serde_json::from_slice::<Row>(&value).ok())
            .filter(|row| row_matches(row, predicate))
            .map(|row| row.project(columns))
            .collect();
        Ok(rows)
    }

    fn update(
        &mut self,
        table: &str,
        assignments: &[Assignment],
        predicate: &Predicate,
    ) -> StorageResult<usize> {
        let schema = self.require_schema(table)?.clone();
        for assignment in assignments {
            if !schema.has_column(&assignment.column) {
                return Err(StorageError::UnknownColumn(assignment.column.clone()));
            }
        }

        let rows = self.read_all_rows(table)?;
        let mut matched = 0usize;
        let mut updated = Vec::with_capacity(rows.len());
        for (key, mut row) in rows {
            if row_matches(&row, predicate) {
                matched += 1;
                for assignment in assignments {
                    let column = schema.column(&assignment.column).expect("checked above");
                    row.insert(assignment.column.clone(), coerce(&assignment.value, column.ty)?);
                }
            }
            updated.push((key, row));
        }

        if matched == 0 {
            return Err(StorageError::NoRowsMatched);
        }

        self.rewrite_data_page(table, updated)?;
        tracing::debug!(table, matched, "updated rows");
        Ok(matched)
    }

    fn delete(&mut self, table: &str, predicate: &Predicate) -> StorageResult<usize> {
        self.require_schema(table)?;
        let rows = self.read_all_rows(table)?;
        let before = rows.len();
        let kept: Vec<(String, Row)> = rows
            .into_iter()
            .filter(|(_, row)| !row_matches(row, predicate))
            .collect();
        let matched = before - kept.len();

        if matched == 0 {
            return Err(StorageError::NoRowsMatched);
        }

        self.rewrite_data_page(table, kept)?;
        tracing::debug!(table, matched, "deleted rows");
        Ok(matched)
    }

    fn show_tables(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn get_schema(&self, table: &str) -> StorageResult<Schema> {
        self.require_schema(table).cloned()
    }

    fn close(&mut self) -> StorageResult<()> {
        if let Some(pager) = self.pager.take() {
            pager.flush()?;
        }
        Ok(())
    }
}
