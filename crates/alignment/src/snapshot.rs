//! Point-in-time yield curve snapshots.

use chrono::{Months, NaiveDate};
use macrofeed_core::config::{CurveConfig, SnapshotTarget};
use macrofeed_core::{CurvePoint, CurveSnapshot, Observation, Result};
use tracing::{debug, warn};

/// Name of the snapshot built from each maturity's latest observation.
pub const CURRENT: &str = "current";

/// One maturity of the curve with its observations, ascending by date.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSeries {
    pub maturity: String,
    pub observations: Vec<Observation>,
}

impl CurveSeries {
    pub fn new(maturity: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            maturity: maturity.into(),
            observations,
        }
    }
}

/// Value of the latest observation dated on or before `target`.
///
/// Dates compare lexically, which matches chronological order for ISO dates.
pub fn nearest_prior(observations: &[Observation], target: &str) -> Option<f64> {
    observations
        .iter()
        .rev()
        .find(|obs| obs.date.as_str() <= target)
        .map(|obs| obs.value)
}

fn parse_day(date: &str) -> Option<NaiveDate> {
    match date.len() {
        7 => NaiveDate::parse_from_str(&format!("{date}-01"), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok(),
    }
}

/// `months` calendar months before `anchor`, clamped to the end of a shorter month.
pub fn months_before(anchor: &str, months: u32) -> Option<String> {
    let day = parse_day(anchor)?.checked_sub_months(Months::new(months))?;
    Some(day.format("%Y-%m-%d").to_string())
}

/// Resolves the `current` snapshot plus a list of named targets.
#[derive(Debug, Clone, Default)]
pub struct CurveSnapshotResolver {
    targets: Vec<(String, SnapshotTarget)>,
}

impl CurveSnapshotResolver {
    pub fn new(targets: Vec<(String, SnapshotTarget)>) -> Self {
        Self { targets }
    }

    pub fn from_config(config: &CurveConfig) -> Result<Self> {
        let targets = config
            .targets
            .iter()
            .map(|t| Ok((t.name.clone(), t.target()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(targets))
    }

    /// Build snapshots, `current` first, then targets in configured order.
    ///
    /// Points follow the maturity order of `curve`. A maturity with no
    /// qualifying observation gets a null value.
    pub fn resolve(&self, curve: &[CurveSeries]) -> Vec<CurveSnapshot> {
        let mut snapshots = Vec::with_capacity(self.targets.len() + 1);

        snapshots.push(CurveSnapshot {
            name: CURRENT.to_string(),
            target_date: None,
            points: curve
                .iter()
                .map(|s| CurvePoint {
                    maturity: s.maturity.clone(),
                    value: s.observations.last().map(|obs| obs.value),
                })
                .collect(),
        });

        let latest = curve
            .iter()
            .filter_map(|s| s.observations.last())
            .map(|obs| obs.date.as_str())
            .max();

        for (name, target) in &self.targets {
            let target_date = match target {
                SnapshotTarget::Date(date) => Some(date.clone()),
                SnapshotTarget::MonthsBefore(n) => latest.and_then(|d| months_before(d, *n)),
            };
            if target_date.is_none() {
                warn!(snapshot = %name, "no anchor date for relative snapshot");
            }

            let points = curve
                .iter()
                .map(|s| CurvePoint {
                    maturity: s.maturity.clone(),
                    value: target_date
                        .as_deref()
                        .and_then(|date| nearest_prior(&s.observations, date)),
                })
                .collect();

            debug!(snapshot = %name, target = ?target_date, "curve snapshot resolved");
            snapshots.push(CurveSnapshot {
                name: name.clone(),
                target_date,
                points,
            });
        }

        snapshots
    }
}
