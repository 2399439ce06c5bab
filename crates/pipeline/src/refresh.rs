//! One refresh cycle: plan requests, fetch them concurrently, assemble.

use crate::assemble::{Assembler, RefreshOutput};
use crate::cycle::LatestOutput;
use chrono::NaiveDate;
use futures::future::join_all;
use macrofeed_core::{Config, Result};
use macrofeed_ingestion::{PayloadSource, SeriesRequest, SourceRequest};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub const FISCAL: &str = "fiscal";
pub const HOLDINGS_ARCHIVE: &str = "holdings_archive";
pub const HOLDINGS_CURRENT: &str = "holdings_current";

/// Raw payload text (or the retrieval error) per request name.
pub type RawPayloads = BTreeMap<String, Result<String>>;

/// Every series request the config needs, one per slot.
///
/// A slot shared by several panels is fetched once, from the earliest start date.
pub fn series_requests(config: &Config) -> Vec<SeriesRequest> {
    let mut by_slot: BTreeMap<String, SeriesRequest> = BTreeMap::new();
    let panel_series = config.series.panels.iter().flat_map(|panel| {
        panel
            .series
            .iter()
            .map(|spec| SeriesRequest::new(&spec.id, &panel.start, spec.frequency.as_deref()))
    });
    let curve_series = config
        .curve
        .maturities
        .iter()
        .map(|m| SeriesRequest::new(&m.id, &config.curve.start, None));

    for request in panel_series.chain(curve_series) {
        by_slot
            .entry(request.slot())
            .and_modify(|existing| {
                if request.start < existing.start {
                    existing.start = request.start.clone();
                }
            })
            .or_insert(request);
    }
    by_slot.into_values().collect()
}

/// All requests for one cycle: every series slot plus the fiscal and holdings reports.
pub fn plan_requests(config: &Config) -> Vec<SourceRequest> {
    let fetch = &config.fetch;
    let mut requests: Vec<SourceRequest> = series_requests(config)
        .iter()
        .map(|r| r.to_source_request(fetch))
        .collect();
    requests.push(SourceRequest::new(FISCAL, fetch.fiscal_url.clone()));
    requests.push(SourceRequest::new(HOLDINGS_ARCHIVE, fetch.archive_url.clone()));
    requests.push(SourceRequest::new(HOLDINGS_CURRENT, fetch.current_url.clone()));
    requests
}

/// Issue every request at once. A failed request only affects its own slot.
pub async fn retrieve_all(source: &dyn PayloadSource, requests: &[SourceRequest]) -> RawPayloads {
    let fetches = requests.iter().map(|request| async move {
        let result = source.fetch_text(request).await;
        if let Err(e) = &result {
            warn!(source = %request.name, error = %e, "retrieval failed");
        }
        (request.name.clone(), result)
    });
    join_all(fetches).await.into_iter().collect()
}

/// Runs refresh cycles against one payload source and keeps the newest output.
pub struct Refresher {
    config: Config,
    source: Box<dyn PayloadSource>,
    assembler: Assembler,
    latest: LatestOutput<RefreshOutput>,
}

impl Refresher {
    /// Validates the config before anything is fetched.
    pub fn new(config: Config, source: Box<dyn PayloadSource>) -> Result<Self> {
        config.validate()?;
        let assembler = Assembler::new(&config)?;
        Ok(Self {
            config,
            source,
            assembler,
            latest: LatestOutput::new(),
        })
    }

    /// Run one cycle and return its output.
    ///
    /// The output is also stored as the latest unless a newer cycle started meanwhile.
    pub async fn refresh(&self, now: NaiveDate) -> RefreshOutput {
        let token = self.latest.begin();
        let requests = plan_requests(&self.config);
        info!(cycle = token.id(), requests = requests.len(), "refresh started");

        let payloads = retrieve_all(self.source.as_ref(), &requests).await;
        let output = self.assembler.assemble(&payloads, now);

        if self.latest.publish(token, output.clone()) {
            info!(cycle = token.id(), failures = output.failures.len(), "refresh published");
        } else {
            info!(cycle = token.id(), "refresh superseded, output discarded");
        }
        output
    }

    /// Output of the newest published cycle.
    pub fn latest(&self) -> Option<RefreshOutput> {
        self.latest.get()
    }
}
