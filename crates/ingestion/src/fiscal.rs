//! Monthly fiscal statement reconstruction.
//!
//! Each publication of the statement repeats the whole history of the current
//! and prior fiscal years, so the same month shows up once per report. Rows
//! inside a report are ordered by line number: a `FY <year>` section label
//! comes first, followed by one detail row per month of that fiscal year.

use macrofeed_core::calendar::{
    calendar_year_for, fiscal_month_index, month_from_name, month_key, FISCAL_MONTH_LABELS,
};
use macrofeed_core::config::FiscalConfig;
use macrofeed_core::{Error, FiscalStatement, FiscalYearCumulativeRow, MonthlyFiscalRecord, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Kind of a statement row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Title row: a fiscal-year header or a summary label.
    SectionLabel,
    /// One month of receipts and outlays.
    MonthlyDetail,
}

impl RowKind {
    /// Map a row-type tag. Unknown tags yield `None` and the row is skipped.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "t" | "section-label" | "section_label" | "label" => Some(RowKind::SectionLabel),
            "d" | "monthly-detail" | "monthly_detail" | "detail" => Some(RowKind::MonthlyDetail),
            _ => None,
        }
    }
}

/// One statement row with amounts already read as numbers (missing = 0).
#[derive(Debug, Clone, PartialEq)]
pub struct FiscalRow {
    /// Publication date of the report, `YYYY-MM-DD`.
    pub report_date: String,
    pub line_index: i64,
    pub kind: RowKind,
    pub classification: String,
    pub receipts: f64,
    pub outlays: f64,
    /// Deficit (negative) or surplus (positive) as reported.
    pub deficit: f64,
}

/// Fiscal year in effect while walking a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiscalYearState {
    NoYearSet,
    YearSet(i32),
}

impl FiscalYearState {
    /// Transition on a section label: `FY <year>` sets the year, anything else is ignored.
    pub fn on_section_label(self, label: &str) -> Self {
        match parse_fiscal_year_label(label) {
            Some(year) => FiscalYearState::YearSet(year),
            None => self,
        }
    }

    /// The year detail rows are attributed to, if any.
    pub fn fiscal_year(self) -> Option<i32> {
        match self {
            FiscalYearState::NoYearSet => None,
            FiscalYearState::YearSet(year) => Some(year),
        }
    }
}

/// Parse `FY 2024` / `FY2024` into 2024.
pub fn parse_fiscal_year_label(label: &str) -> Option<i32> {
    let label = label.trim();
    let prefix = label.get(..2)?;
    if !prefix.eq_ignore_ascii_case("fy") {
        return None;
    }
    let year = label[2..].trim();
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    year.parse().ok()
}

/// Key used for a fiscal year in the cumulative rollup.
pub fn fiscal_year_key(fiscal_year: i32) -> String {
    format!("FY{fiscal_year}")
}

/// Surplus months published with a negative sign are stored as positive.
///
/// Deficit months keep the reported value untouched.
fn apply_surplus_sign(revenue: f64, spending: f64, deficit: f64) -> f64 {
    if revenue > spending && deficit < 0.0 {
        deficit.abs()
    } else {
        deficit
    }
}

#[derive(Debug, Deserialize)]
struct RawFiscalRow {
    record_date: String,
    #[serde(default)]
    src_line_nbr: Value,
    #[serde(default)]
    data_type_cd: Option<String>,
    #[serde(default)]
    classification_desc: Option<String>,
    #[serde(default)]
    current_month_gross_rcpt_amt: Value,
    #[serde(default)]
    current_month_gross_outly_amt: Value,
    #[serde(default)]
    current_month_dfct_sur_amt: Value,
}

impl RawFiscalRow {
    fn into_row(self) -> Option<FiscalRow> {
        let kind = RowKind::from_tag(self.data_type_cd.as_deref()?)?;
        let line_index = match &self.src_line_nbr {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        Some(FiscalRow {
            report_date: self.record_date.trim().to_string(),
            line_index,
            kind,
            classification: self.classification_desc.unwrap_or_default(),
            receipts: amount(&self.current_month_gross_rcpt_amt),
            outlays: amount(&self.current_month_gross_outly_amt),
            deficit: amount(&self.current_month_dfct_sur_amt),
        })
    }
}

/// Numeric text, a number, or anything else as zero.
fn amount(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Rebuilds monthly records and fiscal-year rollups from a statement.
#[derive(Debug, Clone)]
pub struct FiscalStatementParser {
    amount_divisor: f64,
    max_fiscal_years: Option<usize>,
}

impl FiscalStatementParser {
    pub fn new(config: &FiscalConfig) -> Self {
        Self {
            amount_divisor: config.amount_divisor,
            max_fiscal_years: config.max_fiscal_years,
        }
    }

    /// Parse a `{"data": [...]}` payload. Rows that fail to decode are skipped.
    pub fn parse_payload(&self, payload: &str) -> Result<FiscalStatement> {
        let root: Value = serde_json::from_str(payload)
            .map_err(|e| Error::structural(format!("fiscal payload is not JSON: {e}")))?;
        let data = root
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::structural("fiscal payload has no `data` array"))?;

        let rows: Vec<FiscalRow> = data
            .iter()
            .filter_map(|raw| {
                let row = serde_json::from_value::<RawFiscalRow>(raw.clone())
                    .ok()
                    .and_then(RawFiscalRow::into_row);
                if row.is_none() {
                    debug!("skipping undecodable fiscal row");
                }
                row
            })
            .collect();

        self.parse_rows(&rows)
    }

    /// Build the statement from decoded rows.
    pub fn parse_rows(&self, rows: &[FiscalRow]) -> Result<FiscalStatement> {
        let mut reports: BTreeMap<&str, Vec<&FiscalRow>> = BTreeMap::new();
        for row in rows {
            reports.entry(row.report_date.as_str()).or_default().push(row);
        }

        let mut by_date: BTreeMap<String, MonthlyFiscalRecord> = BTreeMap::new();
        for (report_date, mut report) in reports {
            report.sort_by_key(|row| row.line_index);

            let mut state = FiscalYearState::NoYearSet;
            for row in report {
                match row.kind {
                    RowKind::SectionLabel => state = state.on_section_label(&row.classification),
                    RowKind::MonthlyDetail => {
                        let Some(fiscal_year) = state.fiscal_year() else {
                            debug!(
                                report_date,
                                label = %row.classification,
                                "detail row before any fiscal year"
                            );
                            continue;
                        };
                        let Some(record) = self.build_record(fiscal_year, row) else {
                            continue;
                        };
                        let newer = by_date
                            .get(&record.date)
                            .map_or(true, |existing| record.report_date > existing.report_date);
                        if newer {
                            by_date.insert(record.date.clone(), record);
                        }
                    }
                }
            }
        }

        let monthly: Vec<MonthlyFiscalRecord> = by_date
            .into_values()
            .filter(|r| r.revenue_b != 0.0 && r.spending_b != 0.0)
            .collect();

        if monthly.is_empty() {
            return Err(Error::empty_result("fiscal statement produced no monthly records"));
        }

        let (fiscal_year_cumulative, fiscal_year_keys) =
            cumulative_rollup(&monthly, self.max_fiscal_years);

        info!(
            months = monthly.len(),
            fiscal_years = fiscal_year_keys.len(),
            "fiscal statement parsed"
        );

        Ok(FiscalStatement {
            monthly,
            fiscal_year_cumulative,
            fiscal_year_keys,
        })
    }

    fn build_record(&self, fiscal_year: i32, row: &FiscalRow) -> Option<MonthlyFiscalRecord> {
        let calendar_month = month_from_name(&row.classification)?;

        // Months the report has not reached yet carry zero receipts and outlays.
        if row.receipts == 0.0 && row.outlays == 0.0 {
            return None;
        }

        let revenue_b = row.receipts / self.amount_divisor;
        let spending_b = row.outlays / self.amount_divisor;
        let reported_b = row.deficit / self.amount_divisor;
        let deficit_b = apply_surplus_sign(revenue_b, spending_b, reported_b);
        let calendar_year = calendar_year_for(fiscal_year, calendar_month);

        Some(MonthlyFiscalRecord {
            date: month_key(calendar_year, calendar_month),
            fiscal_year,
            calendar_month,
            revenue_b,
            spending_b,
            deficit_b,
            report_date: row.report_date.clone(),
        })
    }
}

impl Default for FiscalStatementParser {
    fn default() -> Self {
        Self::new(&FiscalConfig::default())
    }
}

/// Cumulative deficit per fiscal month label, one curve per fiscal year.
///
/// A curve is populated through the last month its year has data for; a gap
/// before that month contributes zero.
pub fn cumulative_rollup(
    records: &[MonthlyFiscalRecord],
    max_fiscal_years: Option<usize>,
) -> (Vec<FiscalYearCumulativeRow>, Vec<String>) {
    let mut by_year: BTreeMap<i32, [Option<f64>; 12]> = BTreeMap::new();
    for record in records {
        by_year.entry(record.fiscal_year).or_insert([None; 12])
            [fiscal_month_index(record.calendar_month)] = Some(record.deficit_b);
    }

    if let Some(max) = max_fiscal_years {
        while by_year.len() > max {
            by_year.pop_first();
        }
    }

    let curves: Vec<(String, Vec<Option<f64>>)> = by_year
        .iter()
        .map(|(fiscal_year, months)| {
            let reached = months.iter().rposition(Option::is_some);
            let mut running = 0.0;
            let curve = months
                .iter()
                .enumerate()
                .map(|(i, month)| {
                    running += month.unwrap_or(0.0);
                    let total = running;
                    reached.filter(|&last| i <= last).map(|_| total)
                })
                .collect();
            (fiscal_year_key(*fiscal_year), curve)
        })
        .collect();

    let rows = FISCAL_MONTH_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| FiscalYearCumulativeRow {
            month: label.to_string(),
            values: curves
                .iter()
                .map(|(key, curve)| (key.clone(), curve[i]))
                .collect(),
        })
        .collect();

    let keys = curves.into_iter().map(|(key, _)| key).collect();
    (rows, keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const B: f64 = 1e9;

    fn label(report: &str, line: i64, text: &str) -> FiscalRow {
        FiscalRow {
            report_date: report.to_string(),
            line_index: line,
            kind: RowKind::SectionLabel,
            classification: text.to_string(),
            receipts: 0.0,
            outlays: 0.0,
            deficit: 0.0,
        }
    }

    fn detail(report: &str, line: i64, month: &str, rcpt: f64, outly: f64, dfct: f64) -> FiscalRow {
        FiscalRow {
            report_date: report.to_string(),
            line_index: line,
            kind: RowKind::MonthlyDetail,
            classification: month.to_string(),
            receipts: rcpt * B,
            outlays: outly * B,
            deficit: dfct * B,
        }
    }

    fn record<'a>(stmt: &'a FiscalStatement, date: &str) -> &'a MonthlyFiscalRecord {
        stmt.monthly.iter().find(|r| r.date == date).unwrap()
    }

    #[test]
    fn test_parse_fiscal_year_label() {
        assert_eq!(parse_fiscal_year_label("FY 2024"), Some(2024));
        assert_eq!(parse_fiscal_year_label("fy2023"), Some(2023));
        assert_eq!(parse_fiscal_year_label("Year-to-Date"), None);
        assert_eq!(parse_fiscal_year_label("FY 24"), None);
        assert_eq!(parse_fiscal_year_label("F"), None);
    }

    #[test]
    fn test_state_machine_transitions() {
        let state = FiscalYearState::NoYearSet;
        assert_eq!(state.fiscal_year(), None);

        let state = state.on_section_label("Year-to-Date");
        assert_eq!(state, FiscalYearState::NoYearSet);

        let state = state.on_section_label("FY 2024");
        assert_eq!(state, FiscalYearState::YearSet(2024));

        // Summary labels leave the year in place.
        let state = state.on_section_label("Year-to-Date");
        assert_eq!(state.fiscal_year(), Some(2024));
    }

    #[test]
    fn test_fiscal_to_calendar_dates() {
        let rows = vec![
            label("2024-02-12", 1, "FY 2024"),
            detail("2024-02-12", 2, "October", 403.0, 470.0, -67.0),
            detail("2024-02-12", 3, "December", 467.0, 596.0, -129.0),
            detail("2024-02-12", 4, "January", 477.0, 455.0, 22.0),
        ];
        let stmt = FiscalStatementParser::default().parse_rows(&rows).unwrap();

        let dates: Vec<&str> = stmt.monthly.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2023-10", "2023-12", "2024-01"]);
        let oct = record(&stmt, "2023-10");
        assert_eq!(oct.fiscal_year, 2024);
        assert_eq!(oct.calendar_month, 10);
        assert_relative_eq!(oct.revenue_b, 403.0);
        assert_relative_eq!(oct.spending_b, 470.0);
        assert_relative_eq!(oct.deficit_b, -67.0);
    }

    #[test]
    fn test_detail_before_year_header_ignored() {
        let rows = vec![
            detail("2024-02-12", 1, "September", 500.0, 400.0, 100.0),
            label("2024-02-12", 2, "FY 2024"),
            detail("2024-02-12", 3, "October", 403.0, 470.0, -67.0),
        ];
        let stmt = FiscalStatementParser::default().parse_rows(&rows).unwrap();
        assert_eq!(stmt.monthly.len(), 1);
        assert_eq!(stmt.monthly[0].date, "2023-10");
    }

    #[test]
    fn test_rows_sorted_by_line_index() {
        // Listed out of order; line numbers put the header first.
        let rows = vec![
            detail("2024-02-12", 5, "November", 275.0, 589.0, -314.0),
            label("2024-02-12", 1, "FY 2024"),
            label("2024-02-12", 9, "FY 2025"),
            detail("2024-02-12", 10, "October", 300.0, 400.0, -100.0),
        ];
        let stmt = FiscalStatementParser::default().parse_rows(&rows).unwrap();
        assert_eq!(record(&stmt, "2023-11").fiscal_year, 2024);
        assert_eq!(record(&stmt, "2024-10").fiscal_year, 2025);
    }

    #[test]
    fn test_latest_report_wins() {
        // The newer report is listed first to make sure order of arrival does not matter.
        let rows = vec![
            label("2024-03-12", 1, "FY 2024"),
            detail("2024-03-12", 2, "October", 403.0, 470.0, -67.5),
            label("2024-02-12", 1, "FY 2024"),
            detail("2024-02-12", 2, "October", 400.0, 466.0, -66.0),
            detail("2024-02-12", 3, "November", 275.0, 589.0, -314.0),
        ];
        let stmt = FiscalStatementParser::default().parse_rows(&rows).unwrap();

        let oct = record(&stmt, "2023-10");
        assert_eq!(oct.report_date, "2024-03-12");
        assert_relative_eq!(oct.deficit_b, -67.5);
        assert_relative_eq!(oct.revenue_b, 403.0);
        // Months only present in the older report survive.
        assert_eq!(record(&stmt, "2023-11").report_date, "2024-02-12");
    }

    #[test]
    fn test_unreported_months_skipped() {
        let rows = vec![
            label("2024-02-12", 1, "FY 2024"),
            detail("2024-02-12", 2, "October", 403.0, 470.0, -67.0),
            detail("2024-02-12", 3, "February", 0.0, 0.0, 0.0),
            detail("2024-02-12", 4, "March", 0.0, 120.0, -120.0),
        ];
        let stmt = FiscalStatementParser::default().parse_rows(&rows).unwrap();
        // Future month dropped at parse time; one-sided zero dropped by the final filter.
        assert_eq!(stmt.monthly.len(), 1);
    }

    #[test]
    fn test_surplus_sign_carve_out() {
        let rows = vec![
            label("2024-05-10", 1, "FY 2024"),
            detail("2024-05-10", 2, "April", 776.0, 566.0, -210.0),
            detail("2024-05-10", 3, "March", 330.0, 566.0, -236.0),
            detail("2024-05-10", 4, "January", 477.0, 455.0, 22.0),
        ];
        let stmt = FiscalStatementParser::default().parse_rows(&rows).unwrap();
        assert_relative_eq!(record(&stmt, "2024-04").deficit_b, 210.0);
        assert_relative_eq!(record(&stmt, "2024-03").deficit_b, -236.0);
        assert_relative_eq!(record(&stmt, "2024-01").deficit_b, 22.0);
    }

    #[test]
    fn test_empty_result() {
        let rows = vec![
            label("2024-02-12", 1, "FY 2024"),
            detail("2024-02-12", 2, "October", 0.0, 0.0, 0.0),
        ];
        let err = FiscalStatementParser::default().parse_rows(&rows).unwrap_err();
        assert!(matches!(err, Error::EmptyResult(_)));
    }

    #[test]
    fn test_cumulative_rollup() {
        let rows = vec![
            label("2024-09-10", 1, "FY 2023"),
            detail("2024-09-10", 2, "October", 318.0, 406.0, -88.0),
            detail("2024-09-10", 3, "November", 252.0, 501.0, -249.0),
            detail("2024-09-10", 4, "December", 455.0, 540.0, -85.0),
            label("2024-09-10", 5, "FY 2024"),
            detail("2024-09-10", 6, "October", 403.0, 470.0, -67.0),
            // November missing; December present.
            detail("2024-09-10", 7, "December", 467.0, 596.0, -129.0),
        ];
        let stmt = FiscalStatementParser::default().parse_rows(&rows).unwrap();

        assert_eq!(stmt.fiscal_year_keys, vec!["FY2023", "FY2024"]);
        assert_eq!(stmt.fiscal_year_cumulative.len(), 12);
        assert_eq!(stmt.fiscal_year_cumulative[0].month, "Oct");
        assert_eq!(stmt.fiscal_year_cumulative[11].month, "Sep");

        let cum = |i: usize, key: &str| stmt.fiscal_year_cumulative[i].values[key];
        assert_relative_eq!(cum(0, "FY2023").unwrap(), -88.0);
        assert_relative_eq!(cum(2, "FY2023").unwrap(), -422.0);
        assert_relative_eq!(cum(1, "FY2024").unwrap(), -67.0);
        assert_relative_eq!(cum(2, "FY2024").unwrap(), -196.0);
        assert_eq!(cum(3, "FY2023"), None);
        assert_eq!(cum(3, "FY2024"), None);

        // Each step adds that month's deficit.
        for key in ["FY2023", "FY2024"] {
            for k in 1..12 {
                let (Some(prev), Some(cur)) = (cum(k - 1, key), cum(k, key)) else {
                    continue;
                };
                let fiscal_year: i32 = key[2..].parse().unwrap();
                let month = stmt
                    .monthly
                    .iter()
                    .find(|r| {
                        r.fiscal_year == fiscal_year && fiscal_month_index(r.calendar_month) == k
                    })
                    .map_or(0.0, |r| r.deficit_b);
                assert_relative_eq!(cur, prev + month);
            }
        }
    }

    #[test]
    fn test_rollup_keeps_recent_years() {
        let records = vec![
            MonthlyFiscalRecord {
                date: "2022-10".to_string(),
                fiscal_year: 2023,
                calendar_month: 10,
                revenue_b: 1.0,
                spending_b: 2.0,
                deficit_b: -1.0,
                report_date: "2024-01-01".to_string(),
            },
            MonthlyFiscalRecord {
                date: "2023-10".to_string(),
                fiscal_year: 2024,
                calendar_month: 10,
                revenue_b: 1.0,
                spending_b: 3.0,
                deficit_b: -2.0,
                report_date: "2024-01-01".to_string(),
            },
        ];
        let (rows, keys) = cumulative_rollup(&records, Some(1));
        assert_eq!(keys, vec!["FY2024"]);
        assert!(!rows[0].values.contains_key("FY2023"));
    }

    #[test]
    fn test_parse_payload() {
        let payload = r#"{"data": [
            {"record_date": "2024-02-12", "src_line_nbr": "1", "data_type_cd": "T",
             "classification_desc": "FY 2024", "current_month_gross_rcpt_amt": "null",
             "current_month_gross_outly_amt": "null", "current_month_dfct_sur_amt": "null"},
            {"record_date": "2024-02-12", "src_line_nbr": "2", "data_type_cd": "D",
             "classification_desc": "October", "current_month_gross_rcpt_amt": "403000000000.00",
             "current_month_gross_outly_amt": "470000000000.00", "current_month_dfct_sur_amt": "-67000000000.00"},
            {"record_date": "2024-02-12", "src_line_nbr": "3", "data_type_cd": "D",
             "classification_desc": "Smarch", "current_month_gross_rcpt_amt": "1",
             "current_month_gross_outly_amt": "1", "current_month_dfct_sur_amt": "0"},
            {"record_date": "2024-02-12", "src_line_nbr": "4", "data_type_cd": "X",
             "classification_desc": "November", "current_month_gross_rcpt_amt": "1",
             "current_month_gross_outly_amt": "1", "current_month_dfct_sur_amt": "0"},
            {"record_date": "2024-02-12", "src_line_nbr": "5", "data_type_cd": "D",
             "classification_desc": "December", "current_month_gross_rcpt_amt": null,
             "current_month_gross_outly_amt": "", "current_month_dfct_sur_amt": null},
            {"src_line_nbr": "6"}
        ]}"#;
        let stmt = FiscalStatementParser::default().parse_payload(payload).unwrap();
        assert_eq!(stmt.monthly.len(), 1);
        assert_relative_eq!(stmt.monthly[0].revenue_b, 403.0);
        assert_relative_eq!(stmt.monthly[0].deficit_b, -67.0);
    }

    #[test]
    fn test_payload_without_data_is_structural() {
        let err = FiscalStatementParser::default()
            .parse_payload(r#"{"meta": {}}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let rows = vec![
            label("2024-03-12", 1, "FY 2024"),
            detail("2024-03-12", 2, "October", 403.0, 470.0, -67.0),
            label("2024-02-12", 1, "FY 2024"),
            detail("2024-02-12", 2, "October", 400.0, 466.0, -66.0),
        ];
        let parser = FiscalStatementParser::default();
        assert_eq!(
            parser.parse_rows(&rows).unwrap(),
            parser.parse_rows(&rows).unwrap()
        );
    }
}
