#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Destination store for the OLAP star schema.
//!
//! The loader talks to the store only through [`StarStore`], which runs
//! parameterised SQL. [`duck::DuckDbStore`] is the `DuckDB` implementation;
//! [`star`] holds the schema and the row inserts.

pub mod duck;
pub mod paths;
pub mod star;

use std::fmt;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A store that accepts parameterised SQL, one statement at a time.
pub trait StarStore {
    /// Runs one statement with `?` placeholders bound to `params`, returning
    /// the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the statement fails.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize, DbError>;

    /// Runs a `SELECT COUNT(*)`-shaped query and returns the single value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn count(&mut self, sql: &str) -> Result<u64, DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_value_conversions() {
        assert_eq!(SqlValue::from(7_u32), SqlValue::Integer(7));
        assert_eq!(SqlValue::from(2013_i32), SqlValue::Integer(2013));
        assert_eq!(SqlValue::from("ASSAULT"), SqlValue::Text("ASSAULT".to_string()));
        assert_eq!(SqlValue::from("A").to_string(), "\"A\"");
    }
}
