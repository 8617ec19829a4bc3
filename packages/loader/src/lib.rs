#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Loads the heat-map report into the OLAP star schema.
//!
//! A [`StarLoader`] owns the destination store for one full-refresh run:
//! it empties the tables, inserts the category and district dimensions in
//! index order (so surrogate key = index + 1), then reads heat-map lines,
//! creating one `timeperiod` row per distinct date and one `fact` row per
//! cell.

mod keys;
mod loader;

use crime_olap_aggregate::JobError;
use crime_olap_database::DbError;
use crime_olap_incident_models::StarTable;
use strum_macros::{AsRefStr, Display};

pub use keys::KeySequence;
pub use loader::StarLoader;

/// Where a [`StarLoader`] is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum LoadState {
    /// Nothing inserted yet.
    Uninitialized,
    /// Category and district rows are in place.
    DimensionsLoaded,
    /// Between heat-map inputs; more may follow.
    Ready,
    /// Reading a heat-map input.
    Loading,
    /// All input consumed.
    Complete,
    /// Aborted on a store or I/O failure.
    Failed,
}

/// Errors that abort a load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The operation is not valid in the loader's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// State at the time.
        state: LoadState,
    },

    /// A dimension row could not be inserted, which would shift every
    /// later surrogate key.
    #[error("failed to insert {table} row {name:?}: {source}")]
    Dimension {
        /// Dimension table being filled.
        table: StarTable,
        /// Name of the row that failed.
        name: String,
        /// Store error from the insert.
        source: DbError,
    },

    /// Schema setup or truncation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A heat-map input could not be read.
    #[error("{path}: {source}")]
    Io {
        /// File (or source label) being read.
        path: String,
        /// Underlying read error.
        source: std::io::Error,
    },

    /// A heat-map input path could not be listed.
    #[error(transparent)]
    Input(#[from] JobError),
}

/// Row counts from a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// `category` rows inserted.
    pub categories: u64,
    /// `district` rows inserted.
    pub districts: u64,
    /// Distinct dates inserted into `timeperiod`.
    pub time_periods: u64,
    /// `fact` rows inserted.
    pub facts: u64,
    /// Heat-map lines dropped as malformed or out of range.
    pub skipped_lines: u64,
    /// Time-period or fact inserts that failed and were skipped.
    pub failed_inserts: u64,
}
