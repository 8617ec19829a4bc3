//! Builds the category and district dimension lists from the weekly
//! reports.
//!
//! Each weekly report has one line per category (or district), so its key
//! column is the distinct set of names. Duplicate keys are not removed.

use std::path::Path;

use crime_olap_incident_models::{DimensionIndex, DimensionList};

use crate::JobError;
use crate::report::read_report;

/// Key column of a report file or job output directory, in file order.
///
/// # Errors
///
/// Returns [`JobError::Io`] if the report cannot be read.
pub fn extract_keys(report: &Path) -> Result<Vec<String>, JobError> {
    Ok(read_report(report)?
        .into_iter()
        .map(|line| line.key)
        .collect())
}

/// Sorted dimension list from a report's key column.
///
/// # Errors
///
/// Returns [`JobError::Io`] if the report cannot be read.
pub fn load_dimension(report: &Path) -> Result<DimensionList, JobError> {
    Ok(DimensionList::from_keys(extract_keys(report)?))
}

/// Category and district lists for a run.
///
/// # Errors
///
/// Returns [`JobError::Io`] if either report cannot be read.
pub fn load_index(category_report: &Path, district_report: &Path) -> Result<DimensionIndex, JobError> {
    let categories = load_dimension(category_report)?;
    let districts = load_dimension(district_report)?;
    log::info!(
        "Loaded {} categories from {} and {} districts from {}",
        categories.len(),
        category_report.display(),
        districts.len(),
        district_report.display()
    );
    Ok(DimensionIndex::new(categories, districts))
}
