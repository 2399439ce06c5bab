//! Core data types for the macrofeed pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single dated value of a numeric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// `YYYY-MM` or `YYYY-MM-DD`.
    pub date: String,
    pub value: f64,
}

impl Observation {
    pub fn new(date: impl Into<String>, value: f64) -> Self {
        Self {
            date: date.into(),
            value,
        }
    }
}

/// Series key to ordered observations.
pub type NamedSeriesTable = BTreeMap<String, Vec<Observation>>;

/// Date bucket used to align series of different native frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    #[default]
    Month,
}

impl Granularity {
    /// Truncate a date string to this bucket.
    #[inline]
    pub fn bucket<'a>(self, date: &'a str) -> &'a str {
        let len = match self {
            Granularity::Day => 10,
            Granularity::Month => 7,
        };
        date.get(..len).unwrap_or(date)
    }
}

/// One row of a joined table: a date bucket plus whichever series have a value there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRow {
    pub date: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl JoinedRow {
    /// Value of a series in this row, if present.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

/// One month of receipts, outlays and deficit, tagged with its fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyFiscalRecord {
    /// `YYYY-MM` in calendar terms.
    pub date: String,
    pub fiscal_year: i32,
    /// 1-12.
    pub calendar_month: u32,
    pub revenue_b: f64,
    pub spending_b: f64,
    /// Negative = deficit, positive = surplus.
    pub deficit_b: f64,
    /// Publication date of the report this record was taken from.
    pub report_date: String,
}

/// Cumulative deficit at one fiscal month, per fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalYearCumulativeRow {
    /// Fiscal month label ("Oct" .. "Sep").
    pub month: String,
    /// Fiscal-year key ("FY2024") to cumulative deficit; `None` until that year reaches this month.
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

/// Parser output for the fiscal statement source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiscalStatement {
    pub monthly: Vec<MonthlyFiscalRecord>,
    pub fiscal_year_cumulative: Vec<FiscalYearCumulativeRow>,
    pub fiscal_year_keys: Vec<String>,
}

/// Entity name to date to holding value (billions).
pub type CountryHoldingTable = BTreeMap<String, BTreeMap<String, f64>>;

/// Holdings parsed from one source: per-entity values plus the report's own totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialHoldings {
    pub entities: CountryHoldingTable,
    /// Date to aggregate total, taken from the report's total row.
    pub totals: BTreeMap<String, f64>,
}

impl PartialHoldings {
    /// Record a value, ignoring anything that is not a finite positive number.
    ///
    /// Returns whether the value was written.
    pub fn record(&mut self, entity: &str, date: &str, value: f64) -> bool {
        if !is_valid_holding(value) {
            return false;
        }
        self.entities
            .entry(entity.to_string())
            .or_default()
            .insert(date.to_string(), value);
        true
    }

    /// Record a total, under the same validity rule as [`PartialHoldings::record`].
    pub fn record_total(&mut self, date: &str, value: f64) -> bool {
        if !is_valid_holding(value) {
            return false;
        }
        self.totals.insert(date.to_string(), value);
        true
    }

    /// Number of (entity, date) cells.
    pub fn cell_count(&self) -> usize {
        self.entities.values().map(BTreeMap::len).sum()
    }
}

/// Holdings are only ever written when strictly positive.
#[inline]
pub fn is_valid_holding(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// An entity selected for display, in rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntity {
    pub name: String,
    /// Value at the most recent display date.
    pub latest_value: f64,
    /// CSS color string.
    pub color: String,
}

/// Merged holdings with the derived display axis and ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsView {
    pub table: CountryHoldingTable,
    /// Aggregate total per display date.
    pub totals: Vec<Observation>,
    pub display_dates: Vec<String>,
    pub ranked: Vec<RankedEntity>,
}

/// One maturity's resolved value within a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub maturity: String,
    pub value: Option<f64>,
}

/// A curve resolved at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSnapshot {
    pub name: String,
    /// Resolved target date; `None` for the "current" snapshot.
    pub target_date: Option<String>,
    pub points: Vec<CurvePoint>,
}

impl CurveSnapshot {
    /// Value for a maturity label.
    pub fn value(&self, maturity: &str) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.maturity == maturity)
            .and_then(|p| p.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_bucket() {
        assert_eq!(Granularity::Month.bucket("2024-03-15"), "2024-03");
        assert_eq!(Granularity::Month.bucket("2024-03"), "2024-03");
        assert_eq!(Granularity::Day.bucket("2024-03-15"), "2024-03-15");
        // A month-only date cannot be widened to a day.
        assert_eq!(Granularity::Day.bucket("2024-03"), "2024-03");
    }

    #[test]
    fn test_partial_holdings_rejects_non_positive() {
        let mut h = PartialHoldings::default();
        assert!(h.record("Japan", "2024-01", 1100.5));
        assert!(!h.record("Japan", "2024-02", 0.0));
        assert!(!h.record("Japan", "2024-03", -4.0));
        assert!(!h.record("Japan", "2024-04", f64::NAN));
        assert!(!h.record_total("2024-01", 0.0));
        assert_eq!(h.cell_count(), 1);
        assert!(h.totals.is_empty());
    }

    #[test]
    fn test_joined_row_serializes_flat() {
        let mut values = BTreeMap::new();
        values.insert("cpi".to_string(), 3.1);
        let row = JoinedRow {
            date: "2024-01".to_string(),
            values,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["date"], "2024-01");
        assert_eq!(json["cpi"], 3.1);
    }

    #[test]
    fn test_snapshot_value_lookup() {
        let snap = CurveSnapshot {
            name: "current".to_string(),
            target_date: None,
            points: vec![
                CurvePoint {
                    maturity: "2Y".to_string(),
                    value: Some(4.2),
                },
                CurvePoint {
                    maturity: "10Y".to_string(),
                    value: None,
                },
            ],
        };
        assert_eq!(snap.value("2Y"), Some(4.2));
        assert_eq!(snap.value("10Y"), None);
        assert_eq!(snap.value("30Y"), None);
    }
}
