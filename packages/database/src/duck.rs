//! `DuckDB`-backed [`StarStore`].

use std::path::Path;

use duckdb::types::Value;
use duckdb::{Connection, params_from_iter};

use crate::{DbError, SqlValue, StarStore};

/// A star schema held in a `DuckDB` file or in memory.
pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    /// Opens (or creates) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the parent directory cannot be created or the
    /// connection fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            crate::paths::ensure_dir(parent)?;
        }

        log::info!("Opening star database at {}", path.display());
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Opens a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// The underlying connection, for ad-hoc queries.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn to_value(param: &SqlValue) -> Value {
    match param {
        SqlValue::Integer(n) => Value::BigInt(*n),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

impl StarStore for DuckDbStore {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter().map(to_value)))?)
    }

    fn count(&mut self, sql: &str) -> Result<u64, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        #[allow(clippy::cast_sign_loss)]
        Ok(count as u64)
    }
}
