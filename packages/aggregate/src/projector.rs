//! Turns raw incident lines into key/value pairs for grouping.

use crime_olap_incident_models::{ColumnLayout, HEADER_DATE_TOKEN, KeyFormat, Projection};

use crate::dates::{DateError, DateParser};
use crate::fields::{FieldError, extract_fields, join_fields};

/// Why a line produced no pair.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// The line could not be split into fields.
    #[error("cannot split into columns: {0}")]
    Fields(#[from] FieldError),

    /// The line is missing configured columns.
    #[error("{found} columns, at least {required} required")]
    TooFewFields {
        /// Columns present.
        found: usize,
        /// Columns the layout needs.
        required: usize,
    },

    /// The line is the column header.
    #[error("header row")]
    Header,

    /// The key needed date formatting but the column is not a date.
    #[error(transparent)]
    Date(#[from] DateError),
}

impl ProjectError {
    /// Whether this is the benign header row rather than bad input.
    #[must_use]
    pub const fn is_header(&self) -> bool {
        matches!(self, Self::Header)
    }
}

/// A projected key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projected {
    pub key: String,
    pub value: String,
}

/// Projects lines with one fixed [`Projection`].
#[derive(Debug, Clone)]
pub struct Projector {
    layout: ColumnLayout,
    projection: Projection,
    dates: DateParser,
}

impl Projector {
    #[must_use]
    pub const fn new(layout: ColumnLayout, projection: Projection, dates: DateParser) -> Self {
        Self {
            layout,
            projection,
            dates,
        }
    }

    /// Projects one line.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError`] if the line is the header, malformed, or
    /// short of columns, or if a date key cannot be parsed.
    pub fn project(&self, line: &str) -> Result<Projected, ProjectError> {
        let fields = extract_fields(line)?;

        let required = self
            .layout
            .min_fields()
            .max(self.projection.key + 1)
            .max(self.projection.value + 1)
            .max(self.projection.value2.map_or(0, |c| c + 1));
        if fields.len() < required {
            return Err(ProjectError::TooFewFields {
                found: fields.len(),
                required,
            });
        }

        if fields[self.layout.date]
            .trim()
            .eq_ignore_ascii_case(HEADER_DATE_TOKEN)
        {
            return Err(ProjectError::Header);
        }

        let raw_key = &fields[self.projection.key];
        let key = match self.projection.key_format {
            KeyFormat::Raw => raw_key.clone(),
            KeyFormat::CanonicalDate => self.dates.canonical_key(raw_key)?,
        };

        let value = match self.projection.value2 {
            None => fields[self.projection.value].clone(),
            Some(second) => join_fields(&[&fields[self.projection.value], &fields[second]]),
        };

        Ok(Projected { key, value })
    }
}
