//! Incident date parsing and the canonical `YYYY/MM/DD` key form.

use chrono::NaiveDate;

/// `chrono` format of date keys written to the heat-map report.
pub const CANONICAL_DATE_FORMAT: &str = "%Y/%m/%d";

/// Default `chrono` format of the incident log's date column.
pub const DEFAULT_INPUT_FORMAT: &str = "%m/%d/%Y";

/// A date column value that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date {value:?} (expected {format})")]
pub struct DateError {
    /// The raw text.
    pub value: String,
    /// The format it was read with.
    pub format: String,
}

/// Reads incident dates in the source format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateParser {
    input_format: String,
}

impl DateParser {
    #[must_use]
    pub fn new(input_format: impl Into<String>) -> Self {
        Self {
            input_format: input_format.into(),
        }
    }

    /// Parses the date part of a raw column value. Anything after the first
    /// whitespace (a time of day, usually) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DateError`] if the leading token does not match the input
    /// format.
    pub fn parse_incident_date(&self, raw: &str) -> Result<NaiveDate, DateError> {
        let token = raw.split_whitespace().next().unwrap_or("");
        NaiveDate::parse_from_str(token, &self.input_format).map_err(|_| DateError {
            value: raw.to_string(),
            format: self.input_format.clone(),
        })
    }

    /// Rewrites a raw column value as a canonical date key.
    ///
    /// # Errors
    ///
    /// Returns [`DateError`] if the value is not a date.
    pub fn canonical_key(&self, raw: &str) -> Result<String, DateError> {
        self.parse_incident_date(raw).map(canonical)
    }
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_FORMAT)
    }
}

/// Renders a date as `YYYY/MM/DD`.
#[must_use]
pub fn canonical(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

/// Reads a `YYYY/MM/DD` key.
///
/// # Errors
///
/// Returns [`DateError`] if `text` is not a canonical date.
pub fn parse_canonical(text: &str) -> Result<NaiveDate, DateError> {
    NaiveDate::parse_from_str(text.trim(), CANONICAL_DATE_FORMAT).map_err(|_| DateError {
        value: text.to_string(),
        format: CANONICAL_DATE_FORMAT.to_string(),
    })
}
