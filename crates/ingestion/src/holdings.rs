//! Foreign holdings: merge of the archival and current reports.
//!
//! Both parsers emit a [`PartialHoldings`] of the same shape. The only
//! business rule applied when combining them is that a current value replaces
//! an archival one for the same (entity, date); values that are zero or
//! unparsable never reach either table, so they can never overwrite anything.

use crate::holdings_archive::parse_archive;
use crate::holdings_current::parse_current;
use chrono::{Datelike, NaiveDate};
use macrofeed_core::calendar::{is_quarter_end, month_ordinal, parse_month_key};
use macrofeed_core::config::HoldingsConfig;
use macrofeed_core::types::is_valid_holding;
use macrofeed_core::{
    CountryHoldingTable, HoldingsView, Observation, PartialHoldings, RankedEntity, Result,
};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Entity name normalization shared by both holdings parsers.
#[derive(Debug, Clone)]
pub struct EntityNames {
    aliases: BTreeMap<String, String>,
    total_labels: Vec<String>,
}

impl EntityNames {
    pub fn new(config: &HoldingsConfig) -> Self {
        Self {
            aliases: config.aliases.clone(),
            total_labels: config.total_labels.clone(),
        }
    }

    /// Canonical entity name, or `None` if nothing is left after cleaning.
    ///
    /// Trims, strips quotes, collapses whitespace, drops trailing footnote
    /// markers (`1/`, `*`) and applies the alias table.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let unquoted = raw.trim().trim_matches(|c| c == '"' || c == '\'');
        let mut words: Vec<&str> = unquoted.split_whitespace().collect();

        while let Some(&last) = words.last() {
            let stripped = last.trim_end_matches('*');
            if stripped.is_empty() || is_footnote_marker(stripped) {
                words.pop();
            } else {
                if stripped.len() != last.len() {
                    let n = words.len();
                    words[n - 1] = stripped;
                }
                break;
            }
        }

        let name = words.join(" ");
        if name.is_empty() {
            return None;
        }
        let canonical = self
            .aliases
            .iter()
            .find(|(from, _)| from.eq_ignore_ascii_case(&name))
            .map(|(_, to)| to.clone());
        Some(canonical.unwrap_or(name))
    }

    /// Whether a normalized name is the report's own total row.
    pub fn is_total(&self, name: &str) -> bool {
        self.total_labels
            .iter()
            .any(|label| label.eq_ignore_ascii_case(name))
    }
}

fn is_footnote_marker(token: &str) -> bool {
    token
        .strip_suffix('/')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Parse a holdings cell: thousands separators allowed, anything non-numeric is `None`.
pub fn parse_holding_value(cell: &str) -> Option<f64> {
    let cleaned = cell.trim().replace(',', "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Combine the two sources; current values win for the same key.
pub fn merge_holdings(historical: PartialHoldings, current: &PartialHoldings) -> PartialHoldings {
    let mut merged = historical;
    for (entity, dates) in &current.entities {
        for (date, value) in dates {
            if is_valid_holding(*value) {
                merged
                    .entities
                    .entry(entity.clone())
                    .or_default()
                    .insert(date.clone(), *value);
            }
        }
    }
    for (date, value) in &current.totals {
        if is_valid_holding(*value) {
            merged.totals.insert(date.clone(), *value);
        }
    }
    merged
}

/// Whether a month stays on the display axis.
///
/// Months strictly inside the trailing window keep monthly resolution;
/// older months survive only at quarter ends.
pub fn keep_at_density(date: &str, now: NaiveDate, full_resolution_months: u32) -> bool {
    let Some((year, month)) = parse_month_key(date) else {
        return false;
    };
    let months_back = month_ordinal(now.year(), now.month()) - month_ordinal(year, month);
    months_back < full_resolution_months as i32 || is_quarter_end(month)
}

/// Sorted union of table dates, floored at `min_date` and thinned by the density rule.
pub fn display_dates(
    table: &CountryHoldingTable,
    min_date: &str,
    full_resolution_months: u32,
    now: NaiveDate,
) -> Vec<String> {
    let all: BTreeSet<&String> = table.values().flat_map(BTreeMap::keys).collect();
    all.into_iter()
        .filter(|date| date.as_str() >= min_date)
        .filter(|date| keep_at_density(date, now, full_resolution_months))
        .cloned()
        .collect()
}

/// Color for a rank: the palette first, then golden-angle hues.
pub fn display_color(rank: usize, palette: &[String]) -> String {
    match palette.get(rank) {
        Some(color) => color.clone(),
        None => {
            let hue = (rank as f64 * 137.508) % 360.0;
            format!("hsl({hue:.0}, 65%, 50%)")
        }
    }
}

/// Entities ranked by their value at `date`, largest first, capped at `top_n`.
///
/// Entities with no value at `date` are not ranked. Ties break on name.
pub fn rank_entities(
    table: &CountryHoldingTable,
    date: &str,
    top_n: usize,
    palette: &[String],
) -> Vec<RankedEntity> {
    let mut candidates: Vec<(&String, f64)> = table
        .iter()
        .filter_map(|(name, dates)| dates.get(date).map(|v| (name, *v)))
        .collect();
    candidates.sort_by_key(|(name, value)| (Reverse(OrderedFloat(*value)), *name));

    candidates
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(rank, (name, value))| RankedEntity {
            name: name.clone(),
            latest_value: value,
            color: display_color(rank, palette),
        })
        .collect()
}

/// Aggregate total per display date: the report's own total, else the sum of entities.
pub fn aggregate_totals(merged: &PartialHoldings, dates: &[String]) -> Vec<Observation> {
    dates
        .iter()
        .filter_map(|date| {
            let value = merged.totals.get(date).copied().or_else(|| {
                let values: Vec<f64> = merged
                    .entities
                    .values()
                    .filter_map(|d| d.get(date).copied())
                    .collect();
                (!values.is_empty()).then(|| values.iter().sum())
            })?;
            Some(Observation::new(date.clone(), value))
        })
        .collect()
}

/// Builds the holdings view from the two raw reports.
#[derive(Debug, Clone)]
pub struct HoldingsReportMerger {
    config: HoldingsConfig,
    names: EntityNames,
}

impl HoldingsReportMerger {
    pub fn new(config: &HoldingsConfig) -> Self {
        Self {
            config: config.clone(),
            names: EntityNames::new(config),
        }
    }

    /// Parse, merge and derive the display view.
    ///
    /// The archive is optional: without it the view is built from current figures alone.
    pub fn build(
        &self,
        archive_text: Option<&str>,
        current_html: &str,
        now: NaiveDate,
    ) -> Result<HoldingsView> {
        let current = parse_current(current_html, &self.names)?;
        let historical = archive_text
            .map(|text| parse_archive(text, &self.names))
            .unwrap_or_default();

        info!(
            archive_cells = historical.cell_count(),
            current_cells = current.cell_count(),
            "holdings parsed"
        );

        Ok(self.view(merge_holdings(historical, &current), now))
    }

    /// Derive display dates, totals and ranking from a merged table.
    pub fn view(&self, merged: PartialHoldings, now: NaiveDate) -> HoldingsView {
        let dates = display_dates(
            &merged.entities,
            &self.config.min_date,
            self.config.full_resolution_months,
            now,
        );
        let ranked = dates
            .last()
            .map(|latest| {
                rank_entities(
                    &merged.entities,
                    latest,
                    self.config.top_n,
                    &self.config.palette,
                )
            })
            .unwrap_or_default();
        let totals = aggregate_totals(&merged, &dates);

        HoldingsView {
            table: merged.entities,
            totals,
            display_dates: dates,
            ranked,
        }
    }
}
