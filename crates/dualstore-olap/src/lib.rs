//! # dualstore-olap
//!
//! The columnar read replica: one JSON file per table under a configured
//! directory, rebuilt wholesale on every sync and read-only through the
//! [`Storage`] contract.

use std::fs::File;
use std::path::{Path, PathBuf};

use dualstore_sql::parser::{Assignment, Predicate};
use dualstore_sql::row_matches;
use dualstore_sql::storage::{Storage, StorageError, StorageResult};
use dualstore_sql::value::{Row, Scalar, Schema};

/// A replica table file's contents: the schema it was synced with plus the
/// rows snapshotted at sync time.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct TableFile {
    schema: Schema,
    rows: Vec<Row>,
}

/// The OLAP replica: read-only, rebuilt by the router's sync worker.
pub struct OlapReplica {
    dir: PathBuf,
}

impl OlapReplica {
    /// Opens the replica directory, creating it if absent.
    pub fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.parquet"))
    }

    fn read_table(&self, table: &str) -> StorageResult<Option<TableFile>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        let table_file: TableFile = serde_json::from_reader(file)
            .map_err(|e| StorageError::TypeError(format!("corrupt replica file: {e}")))?;
        Ok(Some(table_file))
    }

    /// Atomically rewrites the replica file for `table` with `schema` and
    /// `rows`: written to a temporary sibling path, then renamed into place
    /// so a concurrent reader never observes a partial write.
    pub fn sync_table(&self, schema: &Schema, rows: Vec<Row>) -> StorageResult<()> {
        let final_path = self.table_path(&schema.name);
        let tmp_path = self.dir.join(format!(".{}.tmp", schema.name));

        let table_file = TableFile {
            schema: schema.clone(),
            rows,
        };
        let file = File::create(&tmp_path)?;
        serde_json::to_writer(&file, &table_file)
            .map_err(|e| StorageError::TypeError(format!("cannot serialise replica file: {e}")))?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Storage for OlapReplica {
    /// Schema creation is the one mutation the replica accepts directly
    /// (outside of a sync): the router's sync worker copies a table's
    /// schema across before the first row snapshot.
    fn create_table(&mut self, schema: Schema) -> StorageResult<()> {
        if self.table_path(&schema.name).exists() {
            return Err(StorageError::DuplicateTable(schema.name));
        }
        self.sync_table(&schema, Vec::new())
    }

    fn insert(&mut self, _table: &str, _row: Row) -> StorageResult<()> {
        Err(StorageError::ReadOnly)
    }

    fn select(
        &self,
        table: &str,
        columns: &[String],
        predicate: &Predicate,
    ) -> StorageResult<Vec<Row>> {
        let Some(table_file) = self.read_table(table)? else {
            return Ok(if columns.len() == 1 && columns[0] == "COUNT(*)" {
                let mut row = Row::new();
                row.insert("count", Scalar::Int(0));
                vec![row]
            } else {
                Vec::new()
            });
        };

        if columns.len() == 1 && columns[0] == "COUNT(*)" {
            let count = table_file
                .rows
                .iter()
                .filter(|row| row_matches(row, predicate))
                .count();
            let mut row = Row::new();
            #[allow(clippy::cast_possible_wrap)]
            row.insert("count", Scalar::Int(count as i64));
            return Ok(vec![row]);
        }

        for c in columns {
            if !table_file.schema.has_column(c) {
                return Err(StorageError::UnknownColumn(c.clone()));
            }
        }

        Ok(table_file
            .rows
            .into_iter()
            .filter(|row| row_matches(row, predicate))
            .map(|row| row.project(columns))
            .collect())
    }

    fn update(
        &mut self,
        _table: &str,
        _assignments: &[Assignment],
        _predicate: &Predicate,
    ) -> StorageResult<usize> {
        Err(StorageError::ReadOnly)
    }

    fn delete(&mut self, _table: &str, _predicate: &Predicate) -> StorageResult<usize> {
        Err(StorageError::ReadOnly)
    }

    fn show_tables(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn get_schema(&self, table: &str) -> StorageResult<Schema> {
        self.read_table(table)?
            .map(|t| t.schema)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))
    }

    fn close(&mut self) -> StorageResult<()> {
        Ok(())
    }
}
