//! Daily category x district heat map.
//!
//! For one date key, every `district,category` value is counted into a
//! dense matrix sized by the run's dimension lists, and each non-zero cell
//! becomes a `category_index,district_index,count` record.

use std::sync::Arc;

use crime_olap_incident_models::{DimensionIndex, HeatMapCell};

use crate::fields::extract_fields;
use crate::shuffle::Reducer;

/// Builds the heat map of one date key against a shared [`DimensionIndex`].
#[derive(Debug, Clone)]
pub struct HeatMapBuilder {
    index: Arc<DimensionIndex>,
}

impl HeatMapBuilder {
    #[must_use]
    pub const fn new(index: Arc<DimensionIndex>) -> Self {
        Self { index }
    }

    /// Counts every pair of `values` and returns the non-zero cells,
    /// category-major then district ascending.
    ///
    /// A value that is not a `district,category` pair, or names a district
    /// or category missing from the index, is logged and skipped.
    #[must_use]
    pub fn cells(&self, key: &str, values: &[String]) -> Vec<HeatMapCell> {
        let districts = self.index.districts.len();
        let mut matrix = vec![0_u32; self.index.categories.len() * districts];

        for value in values {
            let fields = match extract_fields(value) {
                Ok(fields) => fields,
                Err(e) => {
                    log::warn!("{key}: cannot split {value:?}: {e}");
                    continue;
                }
            };
            let [district, category] = fields.as_slice() else {
                log::warn!("{key}: expected district,category but got {value:?}");
                continue;
            };

            let Some(d) = self.index.districts.index_of(district) else {
                log::warn!("{key}: unknown district {district:?}");
                continue;
            };
            let Some(c) = self.index.categories.index_of(category) else {
                log::warn!("{key}: unknown category {category:?}");
                continue;
            };

            matrix[c * districts + d] += 1;
        }

        matrix
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(i, &count)| HeatMapCell {
                category: i / districts,
                district: i % districts,
                count,
            })
            .collect()
    }
}

impl Reducer for HeatMapBuilder {
    fn reduce(&self, key: &str, values: Vec<String>) -> Vec<String> {
        self.cells(key, &values)
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}
