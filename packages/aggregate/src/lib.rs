#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Aggregation jobs over a raw incident log.
//!
//! Lines are projected into key/value pairs, grouped by key in process, and
//! reduced into tab-separated report directories:
//!
//! - weekly counts per category and per district ([`jobs::run_weekly`])
//! - day-of-week counts per category and per district ([`jobs::run_weekday`])
//! - the per-date category x district heat map consumed by the star
//!   loader ([`jobs::run_prep`])

pub mod bucketer;
pub mod config;
pub mod dates;
pub mod dimensions;
pub mod fields;
pub mod heatmap;
pub mod jobs;
pub mod progress;
pub mod projector;
pub mod report;
pub mod shuffle;
pub mod weekday;

use std::path::Path;

/// Errors that abort a job.
///
/// Row-level problems never surface here; they are logged and the row is
/// dropped.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// An input, report, or output path could not be read or written.
    #[error("{path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A map or reduce task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The pipeline configuration is unusable.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl JobError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
