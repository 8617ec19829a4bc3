//! Count vectors written to the weekly and weekday reports.

use std::fmt;

use chrono::Weekday;

/// Number of slots every weekly vector starts with, and the width of a
/// report line when no incident falls past mid-March.
pub const MIN_WEEK_SLOTS: usize = 16;

/// Weeks per month used by the bucket arithmetic. A sixth partial week is
/// folded into the fifth.
pub const WEEKS_PER_MONTH: u32 = 5;

/// Bucket of a zero-based `month` and one-based `week_of_month`:
/// `month * 5 + week`, with `week` capped at 5.
#[must_use]
pub fn bucket_index(month: u32, week_of_month: u32) -> usize {
    (month * WEEKS_PER_MONTH + week_of_month.min(WEEKS_PER_MONTH)) as usize
}

/// Error re-reading a rendered count vector.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VectorParseError {
    /// A slot is not a non-negative integer.
    #[error("slot {index} ({text:?}) is not a count")]
    NotACount {
        /// Zero-based slot position.
        index: usize,
        /// The offending text.
        text: String,
    },
    /// The vector has the wrong number of slots.
    #[error("expected {expected} slots, found {found}")]
    Width {
        /// Slots required.
        expected: usize,
        /// Slots present.
        found: usize,
    },
}

fn parse_counts(text: &str) -> Result<Vec<u64>, VectorParseError> {
    text.split(',')
        .enumerate()
        .map(|(index, slot)| {
            slot.trim()
                .parse()
                .map_err(|_| VectorParseError::NotACount {
                    index,
                    text: slot.to_string(),
                })
        })
        .collect()
}

fn write_counts(f: &mut fmt::Formatter<'_>, counts: &[u64]) -> fmt::Result {
    for (i, count) in counts.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{count}")?;
    }
    Ok(())
}

/// Incident counts per month/week bucket for one key.
///
/// Starts with [`MIN_WEEK_SLOTS`] zeroed slots and grows when a later
/// bucket is recorded, so every slot is always rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekBuckets {
    counts: Vec<u64>,
}

impl WeekBuckets {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: vec![0; MIN_WEEK_SLOTS],
        }
    }

    /// Adds one incident to `bucket`, extending the vector if needed.
    pub fn record(&mut self, bucket: usize) {
        if bucket >= self.counts.len() {
            self.counts.resize(bucket + 1, 0);
        }
        self.counts[bucket] += 1;
    }

    /// Count in `bucket` (zero past the end).
    #[must_use]
    pub fn get(&self, bucket: usize) -> u64 {
        self.counts.get(bucket).copied().unwrap_or(0)
    }

    /// Number of slots rendered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Slots in ascending bucket order.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.counts
    }

    /// Total incidents across all buckets.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Re-reads a comma-joined vector.
    ///
    /// # Errors
    ///
    /// Returns [`VectorParseError`] if a slot is not a count or fewer than
    /// [`MIN_WEEK_SLOTS`] slots are present.
    pub fn parse(text: &str) -> Result<Self, VectorParseError> {
        let counts = parse_counts(text)?;
        if counts.len() < MIN_WEEK_SLOTS {
            return Err(VectorParseError::Width {
                expected: MIN_WEEK_SLOTS,
                found: counts.len(),
            });
        }
        Ok(Self { counts })
    }
}

impl Default for WeekBuckets {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WeekBuckets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_counts(f, &self.counts)
    }
}

/// Incident counts per day of the week, Sunday first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekdayCounts {
    counts: [u64; 7],
}

impl WeekdayCounts {
    #[must_use]
    pub const fn new() -> Self {
        Self { counts: [0; 7] }
    }

    pub fn record(&mut self, day: Weekday) {
        self.counts[day.num_days_from_sunday() as usize] += 1;
    }

    #[must_use]
    pub fn get(&self, day: Weekday) -> u64 {
        self.counts[day.num_days_from_sunday() as usize]
    }

    #[must_use]
    pub const fn as_slice(&self) -> &[u64] {
        &self.counts
    }

    /// Re-reads a comma-joined 7-slot vector.
    ///
    /// # Errors
    ///
    /// Returns [`VectorParseError`] if a slot is not a count or the vector
    /// does not have exactly seven slots.
    pub fn parse(text: &str) -> Result<Self, VectorParseError> {
        let parsed = parse_counts(text)?;
        let counts: [u64; 7] =
            parsed
                .try_into()
                .map_err(|v: Vec<u64>| VectorParseError::Width {
                    expected: 7,
                    found: v.len(),
                })?;
        Ok(Self { counts })
    }
}

impl fmt::Display for WeekdayCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_counts(f, &self.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_is_month_times_five_plus_week() {
        assert_eq!(bucket_index(0, 1), 1);
        assert_eq!(bucket_index(0, 3), 3);
        assert_eq!(bucket_index(2, 5), 15);
        assert_eq!(bucket_index(11, 1), 56);
        assert_eq!(bucket_index(11, 5), 60);
    }

    #[test]
    fn sixth_week_folds_into_fifth() {
        assert_eq!(bucket_index(3, 6), bucket_index(3, 5));
        assert!(bucket_index(3, 6) < bucket_index(4, 1));
    }

    #[test]
    fn new_vector_renders_sixteen_zeros() {
        let buckets = WeekBuckets::new();
        assert_eq!(buckets.to_string(), "0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0");
    }

    #[test]
    fn late_bucket_extends_the_vector() {
        let mut buckets = WeekBuckets::new();
        buckets.record(2);
        buckets.record(56);
        assert_eq!(buckets.len(), 57);
        assert_eq!(buckets.get(56), 1);
        assert_eq!(buckets.get(2), 1);
        assert_eq!(buckets.total(), 2);
        assert_eq!(buckets.to_string().split(',').count(), 57);
    }

    #[test]
    fn week_vector_round_trips() {
        let text = "0,1,0,0,3,0,0,0,0,0,0,0,0,2,0,9";
        let buckets = WeekBuckets::parse(text).unwrap();
        assert_eq!(buckets.as_slice(), &[0, 1, 0, 0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 2, 0, 9]);
        assert_eq!(buckets.to_string(), text);
    }

    #[test]
    fn short_or_garbled_week_vector_is_rejected() {
        assert_eq!(
            WeekBuckets::parse("1,2,3"),
            Err(VectorParseError::Width {
                expected: 16,
                found: 3
            })
        );
        assert!(matches!(
            WeekBuckets::parse("0,0,0,0,0,0,0,x,0,0,0,0,0,0,0,0"),
            Err(VectorParseError::NotACount { index: 7, .. })
        ));
    }

    #[test]
    fn weekday_counts_are_sunday_first() {
        let mut counts = WeekdayCounts::new();
        counts.record(Weekday::Sun);
        counts.record(Weekday::Sat);
        counts.record(Weekday::Sat);
        assert_eq!(counts.get(Weekday::Sat), 2);
        assert_eq!(counts.to_string(), "1,0,0,0,0,0,2");
        assert_eq!(WeekdayCounts::parse("1,0,0,0,0,0,2").unwrap(), counts);
        assert!(WeekdayCounts::parse("1,0").is_err());
    }
}
