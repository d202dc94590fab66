//! Scalar values, column definitions and table schemas.
//!
//! This is the shared data model between the SQL front-end and both storage
//! engines: the lexer/parser produce [`Scalar`] literals, the executor binds
//! them against a [`Schema`], and both the B-tree and columnar engines
//! serialise [`Row`]s built from this model.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A tagged scalar value.
///
/// Integers are 64-bit signed; strings are UTF-8 of arbitrary length; `Null`
/// may only appear in columns declared nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Str(String),
    Null,
}

impl Scalar {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "INT",
            Self::Str(_) => "STRING",
            Self::Null => "NULL",
        }
    }

    /// Renders the value as its canonical decimal/text representation, the
    /// same conversion used when coercing a numeric value into a `STRING`
    /// column.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Str(s) => s.clone(),
            Self::Null => "NULL".to_string(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

/// A column's declared SQL type. `TEXT` is a parse-time synonym for
/// `String` and is normalised away before it reaches this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    String,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("INT"),
            Self::String => f.write_str("STRING"),
        }
    }
}

/// A single column definition within a [`Schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub nullable: bool,
}

impl Column {
    #[must_use]
    pub const fn new(name: String, ty: ColumnType, nullable: bool) -> Self {
        Self { name, ty, nullable }
    }
}

/// A table's schema: name plus an ordered, uniquely-named column list.
///
/// Column order is significant: positional `INSERT` binds values to columns
/// in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Schema {
    #[must_use]
    pub fn new(name: String, columns: Vec<Column>) -> Self {
        Self { name, columns }
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The full column list, in declaration order, used to expand `SELECT *`
    ///.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// A single row: a name-keyed mapping from column name to [`Scalar`].
///
/// Backed by a `BTreeMap` so that iteration order (used when projecting
/// `SELECT *`) is deterministic without needing a separate sort step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row(pub BTreeMap<String, Scalar>);

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Scalar) {
        self.0.insert(column.into(), value);
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.0.get(column)
    }

    /// Projects this row down to the given column list. Columns absent from
    /// the row are silently skipped (callers validate column existence
    /// against the schema before projecting).
    #[must_use]
    pub fn project(&self, columns: &[String]) -> Self {
        let mut out = BTreeMap::new();
        for c in columns {
            if let Some(v) = self.0.get(c) {
                out.insert(c.clone(), v.clone());
            }
        }
        Self(out)
    }
}

impl FromIterator<(String, Scalar)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Scalar)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
