//! Outer join of named series on a date bucket.
//!
//! Every bucket seen in any input produces a row; a row is only kept when all
//! required keys have a value, which trims ragged leading and trailing rows
//! without turning the join into an inner join over every series.

use macrofeed_core::{Granularity, JoinedRow, NamedSeriesTable};
use std::collections::BTreeMap;
use tracing::debug;

/// Joins a [`NamedSeriesTable`] into date-keyed rows.
#[derive(Debug, Clone)]
pub struct SeriesJoiner {
    granularity: Granularity,
    required: Vec<String>,
}

impl SeriesJoiner {
    /// Create a joiner. An empty `required` list keeps every row.
    pub fn new(granularity: Granularity, required: &[String]) -> Self {
        Self {
            granularity,
            required: required.to_vec(),
        }
    }

    /// Join, sorted ascending by bucket.
    ///
    /// Within one series, a later observation in the same bucket replaces an earlier one.
    pub fn join(&self, table: &NamedSeriesTable) -> Vec<JoinedRow> {
        let mut buckets: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for (key, observations) in table {
            for obs in observations {
                let bucket = self.granularity.bucket(&obs.date).to_string();
                buckets.entry(bucket).or_default().insert(key.clone(), obs.value);
            }
        }

        let total = buckets.len();
        let rows: Vec<JoinedRow> = buckets
            .into_iter()
            .filter(|(_, values)| self.required.iter().all(|k| values.contains_key(k)))
            .map(|(date, values)| JoinedRow { date, values })
            .collect();

        debug!(buckets = total, kept = rows.len(), "series joined");
        rows
    }
}
