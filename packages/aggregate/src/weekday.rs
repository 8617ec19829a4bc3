//! Weekday report: a key's incidents counted per day of the week.

use chrono::Weekday;
use crime_olap_incident_models::WeekdayCounts;

use crate::shuffle::Reducer;

/// Counts day-of-week names (`Monday`, `mon`, any case) into a
/// Sunday-first vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekdayCounter;

impl WeekdayCounter {
    /// Counts `values`, logging and skipping names that are not weekdays.
    #[must_use]
    pub fn count(key: &str, values: &[String]) -> WeekdayCounts {
        let mut counts = WeekdayCounts::new();
        for value in values {
            match value.trim().parse::<Weekday>() {
                Ok(day) => counts.record(day),
                Err(_) => log::warn!("{key}: {value:?} is not a day of the week"),
            }
        }
        counts
    }
}

impl Reducer for WeekdayCounter {
    fn reduce(&self, key: &str, values: Vec<String>) -> Vec<String> {
        vec![Self::count(key, &values).to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sunday_first() {
        let values: Vec<String> = ["Monday", "Sunday", "monday", "Saturday", "Funday"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let counts = WeekdayCounter::count("NORTHERN", &values);
        assert_eq!(counts.get(Weekday::Mon), 2);
        assert_eq!(counts.get(Weekday::Sun), 1);
        assert_eq!(counts.to_string(), "1,2,0,0,0,0,1");
    }
}
