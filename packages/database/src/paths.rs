#![allow(clippy::module_name_repetitions)]
//! Default locations of the star database.
//!
//! All paths are relative to the project root's `data/` directory unless
//! overridden.

use std::path::{Path, PathBuf};

/// Environment variable overriding the default star database path.
pub const DATABASE_ENV_VAR: &str = "CRIME_OLAP_DATABASE";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`; falls back to the
/// manifest directory itself if it has no grandparent.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .unwrap_or(manifest)
        .to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns `data/star.duckdb`.
#[must_use]
pub fn default_star_db_path() -> PathBuf {
    data_dir().join("star.duckdb")
}

/// Picks the star database path: `explicit` if given, else
/// `$CRIME_OLAP_DATABASE`, else [`default_star_db_path`].
#[must_use]
pub fn resolve_star_db_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(DATABASE_ENV_VAR) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => default_star_db_path(),
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
