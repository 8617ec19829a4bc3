//! Weekly report: incident dates of one key counted into month/week
//! buckets.

use chrono::NaiveDate;
use crime_olap_incident_models::WeekBuckets;
use crime_olap_incident_models::calendar::week_bucket;

use crate::dates::DateParser;
use crate::shuffle::Reducer;

/// Counts a key's incident dates into a [`WeekBuckets`] vector.
#[derive(Debug, Clone, Default)]
pub struct WeeklyBucketer {
    dates: DateParser,
}

impl WeeklyBucketer {
    #[must_use]
    pub const fn new(dates: DateParser) -> Self {
        Self { dates }
    }

    /// Buckets every parsable date in `values`. Unparsable values are
    /// logged and left out.
    #[must_use]
    pub fn bucket(&self, key: &str, values: &[String]) -> WeekBuckets {
        let mut incidents: Vec<(NaiveDate, &str)> = values
            .iter()
            .filter_map(|raw| match self.dates.parse_incident_date(raw) {
                Ok(date) => Some((date, raw.as_str())),
                Err(e) => {
                    log::warn!("{key}: {e}");
                    None
                }
            })
            .collect();
        incidents.sort_unstable();

        let mut buckets = WeekBuckets::new();
        for (date, _) in incidents {
            buckets.record(week_bucket(date));
        }
        buckets
    }
}

impl Reducer for WeeklyBucketer {
    fn reduce(&self, key: &str, values: Vec<String>) -> Vec<String> {
        vec![self.bucket(key, &values).to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: &[&str]) -> Vec<String> {
        v.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn two_incidents_in_two_weeks() {
        let buckets = WeeklyBucketer::default().bucket("CAT1", &values(&["01/12/2013", "01/05/2013"]));
        let nonzero: Vec<(usize, u64)> = buckets
            .as_slice()
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, c)| *c > 0)
            .collect();
        assert_eq!(nonzero, vec![(1, 1), (2, 1)]);
        assert_eq!(buckets.len(), 16);
    }

    #[test]
    fn same_week_accumulates() {
        let buckets = WeeklyBucketer::default().bucket(
            "THEFT",
            &values(&["03/18/2013", "03/19/2013 08:00", "03/23/2013"]),
        );
        assert_eq!(buckets.get(14), 3);
        assert_eq!(buckets.total(), 3);
    }

    #[test]
    fn unparsable_dates_are_skipped() {
        let buckets =
            WeeklyBucketer::default().bucket("THEFT", &values(&["garbage", "01/05/2013", ""]));
        assert_eq!(buckets.total(), 1);
    }

    #[test]
    fn december_incident_is_kept_past_slot_sixteen() {
        let buckets = WeeklyBucketer::default().bucket("ARSON", &values(&["12/01/2013"]));
        assert_eq!(buckets.len(), 57);
        assert_eq!(buckets.get(56), 1);
    }

    #[test]
    fn reduce_renders_vector() {
        let out = WeeklyBucketer::default().reduce("CAT1", values(&["01/05/2013"]));
        assert_eq!(out, vec!["0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0"]);
    }
}
