//! Star-schema tables: DDL, truncation and row inserts.
//!
//! ```text
//! category(id, name)      district(id, name)
//! timeperiod(id, year, month, week, day)
//! fact(id, district_id, category_id, time_id, crimes)
//! ```
//!
//! Surrogate keys are assigned by the caller, not the database.

use crime_olap_incident_models::{StarTable, TimePeriod};

use crate::{DbError, SqlValue, StarStore};

/// One row to insert, minus its surrogate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StarRow {
    Category { name: String },
    District { name: String },
    TimePeriod(TimePeriod),
    Fact {
        district_id: i64,
        category_id: i64,
        time_id: i64,
        crimes: u32,
    },
}

impl StarRow {
    /// Table the row belongs to.
    #[must_use]
    pub const fn table(&self) -> StarTable {
        match self {
            Self::Category { .. } => StarTable::Category,
            Self::District { .. } => StarTable::District,
            Self::TimePeriod(_) => StarTable::TimePeriod,
            Self::Fact { .. } => StarTable::Fact,
        }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Category { .. } | Self::District { .. } => &["name"],
            Self::TimePeriod(_) => &["year", "month", "week", "day"],
            Self::Fact { .. } => &["district_id", "category_id", "time_id", "crimes"],
        }
    }

    fn values(&self) -> Vec<SqlValue> {
        match self {
            Self::Category { name } | Self::District { name } => vec![name.as_str().into()],
            Self::TimePeriod(period) => vec![
                period.year.into(),
                period.month.into(),
                period.week.into(),
                period.day.into(),
            ],
            Self::Fact {
                district_id,
                category_id,
                time_id,
                crimes,
            } => vec![
                (*district_id).into(),
                (*category_id).into(),
                (*time_id).into(),
                (*crimes).into(),
            ],
        }
    }
}

fn table_ddl(table: StarTable) -> &'static str {
    match table {
        StarTable::Category => {
            "CREATE TABLE IF NOT EXISTS category (
                id BIGINT PRIMARY KEY,
                name TEXT NOT NULL
            )"
        }
        StarTable::District => {
            "CREATE TABLE IF NOT EXISTS district (
                id BIGINT PRIMARY KEY,
                name TEXT NOT NULL
            )"
        }
        StarTable::TimePeriod => {
            "CREATE TABLE IF NOT EXISTS timeperiod (
                id BIGINT PRIMARY KEY,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                week INTEGER NOT NULL,
                day INTEGER NOT NULL
            )"
        }
        StarTable::Fact => {
            "CREATE TABLE IF NOT EXISTS fact (
                id BIGINT PRIMARY KEY,
                district_id BIGINT NOT NULL,
                category_id BIGINT NOT NULL,
                time_id BIGINT NOT NULL,
                crimes INTEGER NOT NULL
            )"
        }
    }
}

/// Creates the four tables if they do not exist.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn create_schema(store: &mut impl StarStore) -> Result<(), DbError> {
    for table in [
        StarTable::Category,
        StarTable::District,
        StarTable::TimePeriod,
        StarTable::Fact,
    ] {
        store.execute(table_ddl(table), &[])?;
    }
    Ok(())
}

/// Empties every table, fact first.
///
/// # Errors
///
/// Returns [`DbError`] on the first table that cannot be emptied.
pub fn truncate_all(store: &mut impl StarStore) -> Result<(), DbError> {
    for table in StarTable::TRUNCATE_ORDER {
        let removed = store.execute(&format!("DELETE FROM {table}"), &[])?;
        log::debug!("Truncated {table} ({removed} rows)");
    }
    Ok(())
}

/// `INSERT` statement for `row`, surrogate key first.
#[must_use]
pub fn insert_sql(row: &StarRow) -> String {
    let columns = row.columns();
    let placeholders = vec!["?"; columns.len() + 1].join(", ");
    format!(
        "INSERT INTO {} (id, {}) VALUES ({placeholders})",
        row.table(),
        columns.join(", ")
    )
}

/// Inserts `row` under surrogate key `id`.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn insert(store: &mut impl StarStore, id: i64, row: &StarRow) -> Result<(), DbError> {
    let mut params = Vec::with_capacity(5);
    params.push(SqlValue::Integer(id));
    params.extend(row.values());
    store.execute(&insert_sql(row), &params)?;
    Ok(())
}

/// Number of rows in `table`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn row_count(store: &mut impl StarStore, table: StarTable) -> Result<u64, DbError> {
    store.count(&format!("SELECT COUNT(*) FROM {table}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duck::DuckDbStore;

    fn fresh() -> DuckDbStore {
        let mut store = DuckDbStore::open_in_memory().unwrap();
        create_schema(&mut store).unwrap();
        store
    }

    fn counts(store: &mut DuckDbStore) -> Vec<u64> {
        StarTable::TRUNCATE_ORDER
            .iter()
            .map(|t| row_count(store, *t).unwrap())
            .collect()
    }

    #[test]
    fn builds_insert_statements() {
        assert_eq!(
            insert_sql(&StarRow::Category {
                name: "ASSAULT".to_string()
            }),
            "INSERT INTO category (id, name) VALUES (?, ?)"
        );
        assert_eq!(
            insert_sql(&StarRow::Fact {
                district_id: 1,
                category_id: 1,
                time_id: 1,
                crimes: 2
            }),
            "INSERT INTO fact (id, district_id, category_id, time_id, crimes) VALUES (?, ?, ?, ?, ?)"
        );
    }

    #[test]
    fn inserts_every_row_kind() {
        let mut store = fresh();
        insert(&mut store, 1, &StarRow::Category { name: "ASSAULT".to_string() }).unwrap();
        insert(&mut store, 1, &StarRow::District { name: "NORTHERN".to_string() }).unwrap();
        insert(
            &mut store,
            1,
            &StarRow::TimePeriod(TimePeriod {
                year: 2013,
                month: 0,
                week: 1,
                day: 5,
            }),
        )
        .unwrap();
        insert(
            &mut store,
            1,
            &StarRow::Fact {
                district_id: 1,
                category_id: 1,
                time_id: 1,
                crimes: 2,
            },
        )
        .unwrap();
        assert_eq!(counts(&mut store), vec![1, 1, 1, 1]);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut store = fresh();
        let row = StarRow::District {
            name: "BAYVIEW".to_string(),
        };
        insert(&mut store, 1, &row).unwrap();
        assert!(insert(&mut store, 1, &row).is_err());
    }

    #[test]
    fn truncate_twice_leaves_empty_tables() {
        let mut store = fresh();
        insert(&mut store, 1, &StarRow::Category { name: "A".to_string() }).unwrap();

        truncate_all(&mut store).unwrap();
        assert_eq!(counts(&mut store), vec![0, 0, 0, 0]);

        create_schema(&mut store).unwrap();
        truncate_all(&mut store).unwrap();
        assert_eq!(counts(&mut store), vec![0, 0, 0, 0]);
    }
}
