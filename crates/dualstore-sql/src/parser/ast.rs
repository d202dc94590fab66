//! AST produced by the parser: one [`Statement`] variant per supported SQL
//! form, plus the meta-commands recognised ahead of the grammar.

use crate::value::{Column, Scalar};

/// A column projection in a `SELECT` list.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `SELECT *`
    Star,
    /// An explicit column list. `COUNT(*)` is represented as the reserved
    /// spelling `"COUNT(*)"` for the executor to recognise.
    Columns(Vec<String>),
}

/// A single `column = literal` equality, the only predicate atom the
/// dialect supports.
#[derive(Debug, Clone, PartialEq)]
pub struct Equality {
    pub column: String,
    pub value: Scalar,
}

/// A `WHERE` clause: a conjunction of equalities. `AND`/`OR` are both
/// accepted by the grammar and both flattened into this conjunction, per the
/// spec's minimal (conjunctive-only) predicate model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate(pub Vec<Equality>);

impl Predicate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.0.iter().map(|e| e.column.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: String,
    pub projection: Projection,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    /// Positional values, in source order; the executor binds them against
    /// the live schema.
    pub values: Vec<Scalar>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Scalar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateStatement {
    pub table: String,
    pub columns: Vec<Column>,
}

/// One parsed SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Create(CreateStatement),
    ShowTables,
}

/// Meta-commands processed before the grammar parser runs.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaCommand {
    ShowTables,
    ShowTable(String),
    Explain(SelectStatement),
    ForceSync,
}
