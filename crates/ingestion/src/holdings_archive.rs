//! Archival holdings report (tab-delimited text).
//!
//! The report is a sequence of blocks:
//!
//! ```text
//! Country\tDec\tNov\tOct
//! \t2023\t2023\t2023
//! -------\t-----\t-----\t-----
//! Japan\t1,138.2\t1,126.3\t1,095.0
//! Grand Total\t7,939.3\t7,698.6\t7,605.5
//! <blank line, breakdown marker or next header>
//! ```
//!
//! Columns are matched by tab position, so a year row must line up with the
//! month row above it.

use crate::holdings::{parse_holding_value, EntityNames};
use macrofeed_core::calendar::{month_from_name, month_key};
use macrofeed_core::PartialHoldings;
use tracing::debug;

/// Where the block scanner is.
#[derive(Debug)]
enum BlockState {
    /// Between blocks.
    Seeking,
    /// Saw a month header; waiting for the year row.
    AwaitYears { months: Vec<(usize, u32)> },
    /// Reading entity rows for these (column, date) pairs.
    Rows { columns: Vec<(usize, String)> },
}

/// Month columns of a header row, or `None` if the line is not a header.
///
/// A header has at least one three-letter month cell and nothing but month
/// cells from the first one onwards.
fn header_months(cells: &[&str]) -> Option<Vec<(usize, u32)>> {
    let first = cells.iter().position(|c| month_abbrev(c).is_some())?;
    let mut months = Vec::new();
    for (i, cell) in cells.iter().enumerate().skip(first) {
        if cell.trim().is_empty() {
            continue;
        }
        months.push((i, month_abbrev(cell)?));
    }
    Some(months)
}

fn month_abbrev(cell: &str) -> Option<u32> {
    let cell = cell.trim();
    if cell.len() != 3 {
        return None;
    }
    month_from_name(cell)
}

fn parse_year(cell: &str) -> Option<i32> {
    let cell = cell.trim();
    if cell.len() != 4 || !cell.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    cell.parse().ok()
}

fn is_separator(cells: &[&str]) -> bool {
    let mut non_empty = cells.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).peekable();
    non_empty.peek().is_some() && non_empty.all(|c| c.chars().all(|ch| ch == '-' || ch == '='))
}

fn is_block_end(line: &str) -> bool {
    let lower = line.trim().to_ascii_lowercase();
    lower.is_empty() || lower.contains("breakdown") || lower.starts_with("of which")
}

/// Parse the archival report. Malformed rows and cells are skipped.
pub fn parse_archive(text: &str, names: &EntityNames) -> PartialHoldings {
    let mut holdings = PartialHoldings::default();
    let mut state = BlockState::Seeking;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        let cells: Vec<&str> = line.split('\t').collect();

        if let Some(months) = header_months(&cells) {
            state = BlockState::AwaitYears { months };
            continue;
        }

        state = match state {
            BlockState::Seeking => BlockState::Seeking,
            BlockState::AwaitYears { months } => {
                if line.trim().is_empty() {
                    BlockState::AwaitYears { months }
                } else {
                    let columns: Vec<(usize, String)> = months
                        .iter()
                        .filter_map(|&(i, month)| {
                            let year = parse_year(cells.get(i)?)?;
                            Some((i, month_key(year, month)))
                        })
                        .collect();
                    if columns.is_empty() {
                        debug!(line, "month header not followed by a year row");
                        BlockState::Seeking
                    } else {
                        BlockState::Rows { columns }
                    }
                }
            }
            BlockState::Rows { columns } => {
                if is_block_end(line) {
                    BlockState::Seeking
                } else {
                    if !is_separator(&cells) {
                        read_entity_row(&cells, &columns, names, &mut holdings);
                    }
                    BlockState::Rows { columns }
                }
            }
        };
    }

    holdings
}

fn read_entity_row(
    cells: &[&str],
    columns: &[(usize, String)],
    names: &EntityNames,
    holdings: &mut PartialHoldings,
) {
    let first_data = columns.first().map_or(0, |(i, _)| *i);
    let Some(name) = cells[..first_data.min(cells.len())]
        .iter()
        .find(|c| !c.trim().is_empty())
        .and_then(|c| names.normalize(c))
    else {
        return;
    };
    let is_total = names.is_total(&name);

    for (i, date) in columns {
        let Some(value) = cells.get(*i).and_then(|c| parse_holding_value(c)) else {
            continue;
        };
        if is_total {
            holdings.record_total(date, value);
        } else {
            holdings.record(&name, date, value);
        }
    }
}
