//! Configuration structures for the macrofeed pipeline.

use crate::calendar::is_month_label;
use crate::error::{Error, Result};
use crate::types::Granularity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration for one refresh cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Retrieval endpoints and credentials.
    pub fetch: FetchConfig,
    /// Numeric series panels.
    pub series: SeriesConfig,
    /// Yield curve snapshot configuration.
    pub curve: CurveConfig,
    /// Fiscal statement configuration.
    pub fiscal: FiscalConfig,
    /// Foreign holdings configuration.
    pub holdings: HoldingsConfig,
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.fiscal.amount_divisor <= 0.0 {
            return Err(Error::config("fiscal.amount_divisor must be positive"));
        }
        if self.holdings.top_n == 0 {
            return Err(Error::config("holdings.top_n must be at least 1"));
        }
        if !is_month_label(&self.holdings.min_date) {
            return Err(Error::config(format!(
                "holdings.min_date must look like YYYY-MM, got `{}`",
                self.holdings.min_date
            )));
        }
        for panel in &self.series.panels {
            if let Some(spec) = panel.series.iter().find(|s| s.key == "date") {
                return Err(Error::config(format!(
                    "panel `{}` series `{}` uses the reserved key `date`",
                    panel.name, spec.id
                )));
            }
            for key in &panel.required {
                if !panel.series.iter().any(|s| &s.key == key) {
                    return Err(Error::config(format!(
                        "panel `{}` requires `{key}`, which is not one of its series",
                        panel.name
                    )));
                }
            }
        }
        for target in &self.curve.targets {
            target.target()?;
        }
        Ok(())
    }
}

/// Retrieval endpoints, passed explicitly into every fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Observation endpoint for numeric series.
    pub series_base_url: String,
    /// Fiscal statement endpoint.
    pub fiscal_url: String,
    /// Archival holdings text report.
    pub archive_url: String,
    /// Current holdings HTML table.
    pub current_url: String,
    /// Shared key threaded into series requests.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            series_base_url: "https://api.stlouisfed.org/fred/series/observations".to_string(),
            fiscal_url: "https://api.fiscaldata.treasury.gov/services/api/fiscal_service/v1/accounting/mts/mts_table_1?page%5Bsize%5D=10000&filter=record_date:gte:2015-01-01".to_string(),
            archive_url: "https://ticdata.treasury.gov/resource-center/data-chart-center/tic/Documents/mfhhis01.txt".to_string(),
            current_url: "https://ticdata.treasury.gov/resource-center/data-chart-center/tic/Documents/slt_table5.html".to_string(),
            api_key: None,
            timeout_secs: 20,
            user_agent: "macrofeed/0.1".to_string(),
        }
    }
}

/// Numeric series retrieval and panel layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Placeholder values meaning "no data".
    pub sentinels: Vec<String>,
    /// Joined tables to build.
    pub panels: Vec<PanelConfig>,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            sentinels: vec![".".to_string()],
            panels: vec![
                PanelConfig {
                    name: "rates".to_string(),
                    granularity: Granularity::Month,
                    start: "2000-01-01".to_string(),
                    required: vec![
                        "fed_funds".to_string(),
                        "two_year".to_string(),
                        "ten_year".to_string(),
                    ],
                    series: vec![
                        SeriesSpec::new("fed_funds", "FEDFUNDS", None),
                        SeriesSpec::new("two_year", "DGS2", Some("m")),
                        SeriesSpec::new("ten_year", "DGS10", Some("m")),
                        SeriesSpec::new("mortgage_30y", "MORTGAGE30US", Some("m")),
                    ],
                },
                PanelConfig {
                    name: "labor_inflation".to_string(),
                    granularity: Granularity::Month,
                    start: "2000-01-01".to_string(),
                    required: vec!["cpi".to_string(), "unemployment".to_string()],
                    series: vec![
                        SeriesSpec::new("cpi", "CPIAUCSL", None),
                        SeriesSpec::new("core_pce", "PCEPILFE", None),
                        SeriesSpec::new("unemployment", "UNRATE", None),
                    ],
                },
            ],
        }
    }
}

/// One joined table of several series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub name: String,
    #[serde(default)]
    pub granularity: Granularity,
    /// Observation start floor, `YYYY-MM-DD`.
    pub start: String,
    /// Keys that must all be present for a row to be kept.
    #[serde(default)]
    pub required: Vec<String>,
    pub series: Vec<SeriesSpec>,
}

/// A series key and its source identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesSpec {
    /// Column name in the joined table.
    pub key: String,
    /// Source identifier.
    pub id: String,
    /// Optional sampling frequency passed to the source ("d", "w", "m").
    #[serde(default)]
    pub frequency: Option<String>,
}

impl SeriesSpec {
    pub fn new(key: &str, id: &str, frequency: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            id: id.to_string(),
            frequency: frequency.map(str::to_string),
        }
    }
}

/// Yield curve snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Observation start floor for the daily maturity series.
    pub start: String,
    /// Maturities in display order.
    pub maturities: Vec<MaturitySpec>,
    /// Historical snapshots in addition to "current".
    pub targets: Vec<TargetSpec>,
}

impl Default for CurveConfig {
    fn default() -> Self {
        let maturities = [
            ("1M", "DGS1MO"),
            ("3M", "DGS3MO"),
            ("6M", "DGS6MO"),
            ("1Y", "DGS1"),
            ("2Y", "DGS2"),
            ("5Y", "DGS5"),
            ("10Y", "DGS10"),
            ("30Y", "DGS30"),
        ]
        .into_iter()
        .map(|(label, id)| MaturitySpec {
            label: label.to_string(),
            id: id.to_string(),
        })
        .collect();

        Self {
            start: "2020-01-01".to_string(),
            maturities,
            targets: vec![
                TargetSpec::months_before("1 month ago", 1),
                TargetSpec::months_before("1 year ago", 12),
            ],
        }
    }
}

/// A curve maturity and its daily series identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaturitySpec {
    pub label: String,
    pub id: String,
}

/// Named snapshot target, either a fixed date or relative to the latest observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub months_before: Option<u32>,
}

impl TargetSpec {
    pub fn on_date(name: &str, date: &str) -> Self {
        Self {
            name: name.to_string(),
            date: Some(date.to_string()),
            months_before: None,
        }
    }

    pub fn months_before(name: &str, months: u32) -> Self {
        Self {
            name: name.to_string(),
            date: None,
            months_before: Some(months),
        }
    }

    /// Resolve to exactly one target kind.
    pub fn target(&self) -> Result<SnapshotTarget> {
        match (&self.date, self.months_before) {
            (Some(date), None) => Ok(SnapshotTarget::Date(date.clone())),
            (None, Some(months)) => Ok(SnapshotTarget::MonthsBefore(months)),
            _ => Err(Error::config(format!(
                "curve target `{}` needs exactly one of `date` or `months_before`",
                self.name
            ))),
        }
    }
}

/// Point in time a curve snapshot is resolved at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotTarget {
    /// Latest observation at or before this ISO date.
    Date(String),
    /// Latest observation at or before the newest observed date minus N months.
    MonthsBefore(u32),
}

/// Fiscal statement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FiscalConfig {
    /// Raw amounts are divided by this to get billions.
    pub amount_divisor: f64,
    /// Keep only this many of the most recent fiscal years in the cumulative rollup.
    pub max_fiscal_years: Option<usize>,
}

impl Default for FiscalConfig {
    fn default() -> Self {
        Self {
            amount_divisor: 1e9,
            max_fiscal_years: None,
        }
    }
}

/// Foreign holdings configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldingsConfig {
    /// Earliest date on the display axis, `YYYY-MM`.
    pub min_date: String,
    /// Trailing window kept at monthly resolution.
    pub full_resolution_months: u32,
    /// Maximum number of ranked entities.
    pub top_n: usize,
    /// Display colors assigned by rank.
    pub palette: Vec<String>,
    /// Source spelling to canonical entity name.
    pub aliases: BTreeMap<String, String>,
    /// Row labels that carry the report's own total.
    pub total_labels: Vec<String>,
}

impl Default for HoldingsConfig {
    fn default() -> Self {
        let aliases = [
            ("China, Mainland", "China"),
            ("Mainland China", "China"),
            ("Korea, South", "South Korea"),
            ("Korea", "South Korea"),
            ("Taiwan, Province of China", "Taiwan"),
            ("All other", "All Other"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            min_date: "2012-01".to_string(),
            full_resolution_months: 18,
            top_n: 10,
            palette: [
                "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2",
                "#7f7f7f", "#bcbd22", "#17becf",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            aliases,
            total_labels: vec!["Grand Total".to_string(), "Total".to_string()],
        }
    }
}
