//! Current holdings report (single HTML table).
//!
//! The date header is the first row whose second cell looks like `YYYY-MM`;
//! its date cells fix the column order for every row below it.

use crate::holdings::{parse_holding_value, EntityNames};
use macrofeed_core::calendar::{month_key, parse_month_key};
use macrofeed_core::{Error, PartialHoldings, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| Error::Other(format!("invalid selector `{css}`")))
}

/// Visible text of a cell with whitespace (including `&nbsp;`) collapsed.
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rows that sit inside the table but carry no entity values.
fn is_non_data_row(label: &str) -> bool {
    let lower = label.trim().to_ascii_lowercase();
    let footnote = lower.starts_with(|c: char| c.is_ascii_digit()) && lower.contains('/');
    lower.is_empty()
        || lower == "country"
        || lower.starts_with("of which")
        || lower.contains("breakdown")
        || lower.starts_with("note")
        || lower.starts_with("source")
        || footnote
}

/// Parse the current table. Fails if there is no table or no date header row.
pub fn parse_current(html: &str, names: &EntityNames) -> Result<PartialHoldings> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| Error::structural("current holdings page has no table"))?;

    let rows: Vec<Vec<String>> = table
        .select(&row_sel)
        .map(|row| row.select(&cell_sel).map(cell_text).collect())
        .collect();

    let header_at = rows
        .iter()
        .position(|cells| cells.get(1).is_some_and(|c| parse_month_key(c).is_some()))
        .ok_or_else(|| Error::structural("current holdings table has no YYYY-MM header row"))?;

    let columns: Vec<(usize, String)> = rows[header_at]
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, cell)| parse_month_key(cell).map(|(y, m)| (i, month_key(y, m))))
        .collect();

    let mut holdings = PartialHoldings::default();
    for cells in &rows[header_at + 1..] {
        let Some(label) = cells.first() else {
            continue;
        };
        if is_non_data_row(label) {
            continue;
        }
        let Some(name) = names.normalize(label) else {
            continue;
        };
        let is_total = names.is_total(&name);

        for (i, date) in &columns {
            let Some(value) = cells.get(*i).and_then(|c| parse_holding_value(c)) else {
                debug!(entity = %name, date = %date, "unparsable current cell");
                continue;
            };
            if is_total {
                holdings.record_total(date, value);
            } else {
                holdings.record(&name, date, value);
            }
        }
    }

    Ok(holdings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use macrofeed_core::config::HoldingsConfig;

    fn names() -> EntityNames {
        EntityNames::new(&HoldingsConfig::default())
    }

    const PAGE: &str = r#"<html><body>
<h1>Major Foreign Holders of Treasury Securities</h1>
<table>
  <tr><th colspan="4">(in billions of dollars)</th></tr>
  <tr><th>Country</th><th>Holdings</th><th></th><th></th></tr>
  <tr><td>Country</td><td>2025-03</td><td>2025-02</td><td>2025-01</td></tr>
  <tr><td>Japan</td><td>1,130.8</td><td>1,125.9</td><td>1,079.3</td></tr>
  <tr><td>China, Mainland</td><td>765.4</td><td>784.3</td><td>760.8</td></tr>
  <tr><td>United&nbsp;Kingdom</td><td>779.3</td><td>750.3</td><td>n.a.</td></tr>
  <tr><td>Country</td><td></td><td></td><td></td></tr>
  <tr><td>Grand Total</td><td>9,049.3</td><td>8,816.9</td><td>8,531.8</td></tr>
  <tr><td>Of Which: Foreign Official</td><td>3,926.8</td><td>3,876.3</td><td>3,832.3</td></tr>
  <tr><td>1/ Estimated</td><td>1</td><td>1</td><td>1</td></tr>
  <tr><td>Belgium</td><td>0</td><td>410.0</td><td>401.2</td></tr>
</table>
</body></html>"#;

    #[test]
    fn test_parses_entities_by_header_columns() {
        let h = parse_current(PAGE, &names()).unwrap();
        assert_relative_eq!(h.entities["Japan"]["2025-03"], 1130.8);
        assert_relative_eq!(h.entities["Japan"]["2025-01"], 1079.3);
        assert_relative_eq!(h.entities["China"]["2025-02"], 784.3);
        assert_relative_eq!(h.entities["United Kingdom"]["2025-02"], 750.3);
    }

    #[test]
    fn test_invalid_cells_not_recorded() {
        let h = parse_current(PAGE, &names()).unwrap();
        assert!(!h.entities["United Kingdom"].contains_key("2025-01"));
        assert!(!h.entities["Belgium"].contains_key("2025-03"));
        assert_eq!(h.entities["Belgium"].len(), 2);
    }

    #[test]
    fn test_non_data_rows_skipped() {
        let h = parse_current(PAGE, &names()).unwrap();
        assert_eq!(h.entities.len(), 4);
        assert!(!h.entities.contains_key("Country"));
        assert_relative_eq!(h.totals["2025-03"], 9049.3);
    }

    #[test]
    fn test_missing_header_is_structural() {
        let page = "<table><tr><td>Country</td><td>March</td></tr><tr><td>Japan</td><td>1</td></tr></table>";
        let err = parse_current(page, &names()).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_missing_table_is_structural() {
        let err = parse_current("<p>maintenance</p>", &names()).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }
}
