//! Calendar arithmetic shared by the weekly report and the time-period
//! dimension.
//!
//! Weeks start on Sunday. Week 1 of a month is the (possibly partial) week
//! containing the 1st, so a month spans weeks 1 through 4, 5 or 6.
//! Months are zero-based (January is 0).

use chrono::{Datelike as _, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::buckets::bucket_index;

/// Sunday-start week of the month, 1..=6.
#[must_use]
pub fn week_of_month(date: NaiveDate) -> u32 {
    let offset = date
        .with_day(1)
        .map_or(0, |first| first.weekday().num_days_from_sunday());
    (date.day() - 1 + offset) / 7 + 1
}

/// Zero-based month, 0..=11.
#[must_use]
pub fn zero_based_month(date: NaiveDate) -> u32 {
    date.month0()
}

/// Weekly report bucket of `date`.
#[must_use]
pub fn week_bucket(date: NaiveDate) -> usize {
    bucket_index(zero_based_month(date), week_of_month(date))
}

/// A row of the `timeperiod` dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePeriod {
    pub year: i32,
    /// Zero-based month.
    pub month: u32,
    /// Sunday-start week of the month, 1..=6.
    pub week: u32,
    /// Day of the month, 1..=31.
    pub day: u32,
}

impl TimePeriod {
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: zero_based_month(date),
            week: week_of_month(date),
            day: date.day(),
        }
    }
}
