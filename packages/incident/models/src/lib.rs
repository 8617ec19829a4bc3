#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Data types shared by the incident aggregation jobs and the star loader.
//!
//! Covers the shape of the raw incident log (which column holds what), the
//! key/value projections fed to the grouping stage, the aggregate report
//! records written between jobs, and the rows of the OLAP star schema.

pub mod buckets;
pub mod calendar;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use buckets::{VectorParseError, WeekBuckets, WeekdayCounts};
pub use calendar::TimePeriod;

/// Literal header label of the date column. A row whose date column holds
/// this value (any case) is the file header, not an incident.
pub const HEADER_DATE_TOKEN: &str = "date";

/// Zero-based positions of the columns the pipeline reads from each
/// incident row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    /// Incident category (e.g. `LARCENY/THEFT`).
    pub category: usize,
    /// Day of the week name (e.g. `Monday`).
    pub day_of_week: usize,
    /// Incident date, `MM/DD/YYYY` with an optional time suffix.
    pub date: usize,
    /// Police district name.
    pub district: usize,
}

impl ColumnLayout {
    /// Column positions of the San Francisco incident export.
    pub const SAN_FRANCISCO: Self = Self {
        category: 1,
        day_of_week: 3,
        date: 4,
        district: 6,
    };

    /// Smallest number of fields a row must have for every configured
    /// column to be present.
    #[must_use]
    pub fn min_fields(&self) -> usize {
        [self.category, self.day_of_week, self.date, self.district]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Category keyed, incident date valued.
    #[must_use]
    pub const fn category_by_date(&self) -> Projection {
        Projection::pair(self.category, self.date)
    }

    /// District keyed, incident date valued.
    #[must_use]
    pub const fn district_by_date(&self) -> Projection {
        Projection::pair(self.district, self.date)
    }

    /// Category keyed, day-of-week valued.
    #[must_use]
    pub const fn category_by_day_of_week(&self) -> Projection {
        Projection::pair(self.category, self.day_of_week)
    }

    /// District keyed, day-of-week valued.
    #[must_use]
    pub const fn district_by_day_of_week(&self) -> Projection {
        Projection::pair(self.district, self.day_of_week)
    }

    /// Canonical date keyed, `district,category` valued. Feeds the heat map.
    #[must_use]
    pub const fn date_by_district_and_category(&self) -> Projection {
        Projection {
            key: self.date,
            value: self.district,
            value2: Some(self.category),
            key_format: KeyFormat::CanonicalDate,
        }
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::SAN_FRANCISCO
    }
}

/// How a projected key is rewritten before grouping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KeyFormat {
    /// Key column is used verbatim.
    Raw,
    /// Key column is an incident date, rewritten as `YYYY/MM/DD` so keys
    /// sort chronologically.
    CanonicalDate,
}

/// Which columns of an incident row become the key and value(s) handed to
/// the grouping stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    /// Column used as the grouping key.
    pub key: usize,
    /// Column used as the value.
    pub value: usize,
    /// Optional second value column, packed as `value,value2`.
    pub value2: Option<usize>,
    /// Key rewrite applied before grouping.
    pub key_format: KeyFormat,
}

impl Projection {
    /// A raw-keyed single-value projection.
    #[must_use]
    pub const fn pair(key: usize, value: usize) -> Self {
        Self {
            key,
            value,
            value2: None,
            key_format: KeyFormat::Raw,
        }
    }
}

/// One `KEY<TAB>VALUE` record of an aggregate report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReportLine {
    /// Everything before the first tab.
    pub key: String,
    /// Everything after the first tab (empty when the line has no tab).
    pub value: String,
}

impl ReportLine {
    /// Creates a report line.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Splits a report line on its first tab. Returns `None` for a blank
    /// line.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        Some(match line.split_once('\t') {
            Some((key, value)) => Self::new(key, value),
            None => Self::new(line, ""),
        })
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.value)
    }
}

/// Sorted list of dimension names whose positions are zero-based surrogate
/// offsets for the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionList {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl DimensionList {
    /// Sorts the names and indexes them. Duplicates are kept; a duplicated
    /// name resolves to its last position.
    #[must_use]
    pub fn from_keys(mut names: Vec<String>) -> Self {
        names.sort();
        let lookup = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, lookup }
    }

    /// Zero-based offset of `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Name at `index`.
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// The category and district lists for one run.
///
/// Built once and shared read-only with everything that needs to translate
/// names to offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionIndex {
    /// Incident categories.
    pub categories: DimensionList,
    /// Police districts.
    pub districts: DimensionList,
}

impl DimensionIndex {
    #[must_use]
    pub const fn new(categories: DimensionList, districts: DimensionList) -> Self {
        Self {
            categories,
            districts,
        }
    }
}

/// A non-zero cell of a daily category x district heat map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeatMapCell {
    /// Zero-based category offset.
    pub category: usize,
    /// Zero-based district offset.
    pub district: usize,
    /// Incidents on the day.
    pub count: u32,
}

/// Error reading a `category_index,district_index,count` triple.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CellParseError {
    /// Wrong number of comma-separated fields.
    #[error("expected 3 fields, found {found}")]
    FieldCount {
        /// Fields present.
        found: usize,
    },
    /// A field is not a non-negative integer.
    #[error("field {field:?} is not a number")]
    NotANumber {
        /// The offending text.
        field: String,
    },
}

impl HeatMapCell {
    /// Reads a cell from its three already-split fields.
    ///
    /// # Errors
    ///
    /// Returns [`CellParseError`] if there are not exactly three fields or
    /// any of them is not a non-negative integer.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Result<Self, CellParseError> {
        let [category, district, count] = fields else {
            return Err(CellParseError::FieldCount {
                found: fields.len(),
            });
        };
        Ok(Self {
            category: parse_number(category.as_ref())?,
            district: parse_number(district.as_ref())?,
            count: parse_number(count.as_ref())?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &str) -> Result<T, CellParseError> {
    field
        .trim()
        .parse()
        .map_err(|_| CellParseError::NotANumber {
            field: field.to_string(),
        })
}

impl fmt::Display for HeatMapCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.category, self.district, self.count)
    }
}

/// Tables of the OLAP star schema.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StarTable {
    /// `category(id, name)`
    Category,
    /// `district(id, name)`
    District,
    /// `timeperiod(id, year, month, week, day)`
    TimePeriod,
    /// `fact(id, district_id, category_id, time_id, crimes)`
    Fact,
}

impl StarTable {
    /// Order in which tables are emptied before a full reload. The fact
    /// table references the others so it goes first.
    pub const TRUNCATE_ORDER: [Self; 4] =
        [Self::Fact, Self::Category, Self::District, Self::TimePeriod];
}
