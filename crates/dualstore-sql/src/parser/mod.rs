//! SQL Parser
//!
//! A hand-written recursive descent parser for a small, fixed SQL subset:
//! `CREATE TABLE`, `INSERT`, `SELECT`, `UPDATE`, `DELETE`, `SHOW TABLES`,
//! plus the meta-commands `SHOW TABLE <name>`, `EXPLAIN` and `FORCE_SYNC`.
//!
//! # Not supported
//!
//! Joins, sub-queries, aggregation beyond `COUNT(*)`, multi-statement
//! transactions, and any expression form other than `column = literal`
//! equality.

mod ast;
mod error;
mod grammar;

pub use ast::{
    Assignment, CreateStatement, DeleteStatement, Equality, InsertStatement, MetaCommand,
    Predicate, Projection, SelectStatement, Statement, UpdateStatement,
};
pub use error::ParseError;
pub use grammar::Parser;
