//! Pure assembly of one refresh output from raw payloads.
//!
//! Nothing here performs I/O or reads the clock; `now` is passed in, so the
//! same payloads and `now` always give the same output.

use crate::refresh::{RawPayloads, FISCAL, HOLDINGS_ARCHIVE, HOLDINGS_CURRENT};
use chrono::NaiveDate;
use macrofeed_alignment::{CurveSeries, CurveSnapshotResolver, SeriesJoiner};
use macrofeed_core::{
    Config, CurveSnapshot, Error, FiscalStatement, Granularity, HoldingsView, JoinedRow,
    NamedSeriesTable, Observation, Result,
};
use macrofeed_ingestion::{
    FiscalStatementParser, HoldingsReportMerger, SeriesFetcher, SeriesRequest,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One joined panel of series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelOutput {
    pub name: String,
    pub granularity: Granularity,
    pub rows: Vec<JoinedRow>,
}

/// A source whose payload could not be retrieved or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    /// Error kind, e.g. `source` or `structural`.
    pub kind: String,
    pub message: String,
}

/// Everything one refresh cycle produces.
///
/// Sections whose source failed are `None` (or empty) and the failure is listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshOutput {
    /// The injected `now`, `YYYY-MM-DD`.
    pub as_of: String,
    pub panels: Vec<PanelOutput>,
    pub curve: Vec<CurveSnapshot>,
    pub fiscal: Option<FiscalStatement>,
    pub holdings: Option<HoldingsView>,
    pub failures: Vec<SourceFailure>,
}

impl RefreshOutput {
    pub fn failure(&self, source: &str) -> Option<&SourceFailure> {
        self.failures.iter().find(|f| f.source == source)
    }
}

/// Failures keyed by source, so a slot read twice is reported once.
#[derive(Default)]
struct FailureLog {
    failures: BTreeMap<String, SourceFailure>,
}

impl FailureLog {
    fn record(&mut self, source: &str, error: &Error) {
        warn!(source, kind = error.kind(), error = %error, "source dropped from output");
        self.failures.entry(source.to_string()).or_insert_with(|| SourceFailure {
            source: source.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    /// Payload text for `name`, or `None` after recording why it is missing.
    fn payload<'a>(&mut self, payloads: &'a RawPayloads, name: &str) -> Option<&'a str> {
        match payloads.get(name) {
            Some(Ok(text)) => Some(text.as_str()),
            Some(Err(e)) => {
                self.record(name, e);
                None
            }
            None => {
                self.record(name, &Error::source("payload was not retrieved"));
                None
            }
        }
    }

    /// Unwrap a parse result for `name`, recording the error.
    fn keep<T>(&mut self, name: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.record(name, &e);
                None
            }
        }
    }

    fn into_vec(self) -> Vec<SourceFailure> {
        self.failures.into_values().collect()
    }
}

/// Turns the raw payloads of one cycle into a [`RefreshOutput`].
#[derive(Debug, Clone)]
pub struct Assembler {
    config: Config,
    series: SeriesFetcher,
    fiscal: FiscalStatementParser,
    holdings: HoldingsReportMerger,
    curve: CurveSnapshotResolver,
}

impl Assembler {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            series: SeriesFetcher::new(&config.series.sentinels),
            fiscal: FiscalStatementParser::new(&config.fiscal),
            holdings: HoldingsReportMerger::new(&config.holdings),
            curve: CurveSnapshotResolver::from_config(&config.curve)?,
        })
    }

    pub fn assemble(&self, payloads: &RawPayloads, now: NaiveDate) -> RefreshOutput {
        let mut failures = FailureLog::default();

        let panels = self
            .config
            .series
            .panels
            .iter()
            .map(|panel| {
                let mut table = NamedSeriesTable::new();
                for spec in &panel.series {
                    let request =
                        SeriesRequest::new(&spec.id, &panel.start, spec.frequency.as_deref());
                    if let Some(obs) = self.observations(payloads, &request, &mut failures) {
                        table.insert(spec.key.clone(), obs);
                    }
                }
                let joiner = SeriesJoiner::new(panel.granularity, &panel.required);
                let rows = joiner.join(&table);
                info!(panel = %panel.name, rows = rows.len(), "panel joined");
                PanelOutput {
                    name: panel.name.clone(),
                    granularity: panel.granularity,
                    rows,
                }
            })
            .collect();

        let curve_series: Vec<CurveSeries> = self
            .config
            .curve
            .maturities
            .iter()
            .map(|maturity| {
                let request = SeriesRequest::new(&maturity.id, &self.config.curve.start, None);
                let observations = self
                    .observations(payloads, &request, &mut failures)
                    .unwrap_or_default();
                CurveSeries::new(maturity.label.clone(), observations)
            })
            .collect();
        let curve = self.curve.resolve(&curve_series);

        let fiscal = failures
            .payload(payloads, FISCAL)
            .map(|text| self.fiscal.parse_payload(text))
            .and_then(|result| failures.keep(FISCAL, result));

        let archive = failures.payload(payloads, HOLDINGS_ARCHIVE);
        let holdings = failures
            .payload(payloads, HOLDINGS_CURRENT)
            .map(|html| self.holdings.build(archive, html, now))
            .and_then(|result| failures.keep(HOLDINGS_CURRENT, result));

        let failures = failures.into_vec();
        info!(
            panels = self.config.series.panels.len(),
            fiscal = fiscal.is_some(),
            holdings = holdings.is_some(),
            failures = failures.len(),
            "refresh assembled"
        );

        RefreshOutput {
            as_of: now.format("%Y-%m-%d").to_string(),
            panels,
            curve,
            fiscal,
            holdings,
            failures,
        }
    }

    fn observations(
        &self,
        payloads: &RawPayloads,
        request: &SeriesRequest,
        failures: &mut FailureLog,
    ) -> Option<Vec<Observation>> {
        let slot = request.slot();
        let text = failures.payload(payloads, &slot)?;
        failures.keep(&slot, self.series.parse(text, &request.start))
    }
}
