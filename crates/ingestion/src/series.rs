//! Numeric series retrieval and sentinel filtering.
//!
//! Payloads look like `{"observations": [{"date": "2024-01-01", "value": "3.1"}, ...]}`
//! where a value may be a placeholder such as `"."` instead of a number.

use crate::source::{PayloadSource, SourceRequest};
use macrofeed_core::config::FetchConfig;
use macrofeed_core::{Error, Observation, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

/// What to fetch for one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub id: String,
    /// Observations before this date are dropped, `YYYY-MM-DD`.
    pub start: String,
    pub frequency: Option<String>,
}

impl SeriesRequest {
    pub fn new(id: &str, start: &str, frequency: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            start: start.to_string(),
            frequency: frequency.map(str::to_string),
        }
    }

    /// Payload slot name: the series id, suffixed with `@<frequency>` when resampled.
    pub fn slot(&self) -> String {
        match &self.frequency {
            Some(frequency) => format!("{}@{frequency}", self.id),
            None => self.id.clone(),
        }
    }

    /// Build the GET request; the API key comes from the explicit fetch config.
    pub fn to_source_request(&self, fetch: &FetchConfig) -> SourceRequest {
        let mut request = SourceRequest::new(self.slot(), fetch.series_base_url.clone())
            .param("series_id", self.id.clone())
            .param("observation_start", self.start.clone())
            .param("file_type", "json");
        if let Some(frequency) = &self.frequency {
            request = request.param("frequency", frequency.clone());
        }
        if let Some(key) = &fetch.api_key {
            request = request.param("api_key", key.clone());
        }
        request
    }
}

#[derive(Debug, Deserialize)]
struct RawObservations {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    #[serde(default)]
    value: Value,
}

/// Whether `date` is not before `floor`, compared at the coarser of the two.
///
/// A `YYYY-MM` observation passes a `YYYY-MM-DD` floor in the same month.
fn on_or_after(date: &str, floor: &str) -> bool {
    let len = date.len().min(floor.len());
    date.get(..len).unwrap_or(date) >= floor.get(..len).unwrap_or(floor)
}

/// Retrieves one named series and filters "no data" placeholders.
#[derive(Debug, Clone)]
pub struct SeriesFetcher {
    sentinels: Vec<String>,
}

impl SeriesFetcher {
    /// Create a fetcher treating any of `sentinels` as a missing value.
    pub fn new(sentinels: &[String]) -> Self {
        Self {
            sentinels: sentinels.to_vec(),
        }
    }

    /// Fetch and parse a series.
    pub async fn fetch(
        &self,
        source: &dyn PayloadSource,
        fetch: &FetchConfig,
        request: &SeriesRequest,
    ) -> Result<Vec<Observation>> {
        let payload = source.fetch_text(&request.to_source_request(fetch)).await?;
        let observations = self.parse(&payload, &request.start)?;
        info!(series = %request.id, count = observations.len(), "series parsed");
        Ok(observations)
    }

    /// Parse a raw payload, keeping source order.
    pub fn parse(&self, payload: &str, start: &str) -> Result<Vec<Observation>> {
        let raw: RawObservations = serde_json::from_str(payload).map_err(|e| {
            Error::structural(format!("series payload has no observations list: {e}"))
        })?;

        let observations = raw
            .observations
            .into_iter()
            .filter(|obs| on_or_after(&obs.date, start))
            .filter_map(|obs| {
                let value = self.numeric_value(&obs.value);
                if value.is_none() {
                    debug!(date = %obs.date, raw = %obs.value, "skipping non-numeric observation");
                }
                value.map(|v| Observation::new(obs.date, v))
            })
            .collect();

        Ok(observations)
    }

    fn numeric_value(&self, value: &Value) -> Option<f64> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let s = s.trim();
                if self.sentinels.iter().any(|sentinel| sentinel == s) {
                    return None;
                }
                s.parse::<f64>().ok()
            }
            _ => None,
        };
        parsed.filter(|v| v.is_finite())
    }
}

impl Default for SeriesFetcher {
    fn default() -> Self {
        Self::new(&[".".to_string()])
    }
}
