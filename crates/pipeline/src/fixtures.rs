//! Small payload set shared by the pipeline tests.

use crate::refresh::{RawPayloads, FISCAL, HOLDINGS_ARCHIVE, HOLDINGS_CURRENT};
use chrono::NaiveDate;
use macrofeed_core::config::{CurveConfig, MaturitySpec, PanelConfig, SeriesSpec, TargetSpec};
use macrofeed_core::{Config, Granularity};
use macrofeed_ingestion::MemorySource;

pub fn now() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.series.panels = vec![PanelConfig {
        name: "rates".to_string(),
        granularity: Granularity::Month,
        start: "2024-01-01".to_string(),
        required: vec!["fed_funds".to_string(), "ten_year".to_string()],
        series: vec![
            SeriesSpec::new("fed_funds", "FEDFUNDS", None),
            SeriesSpec::new("ten_year", "DGS10", Some("m")),
        ],
    }];
    config.curve = CurveConfig {
        start: "2024-01-01".to_string(),
        maturities: vec![
            MaturitySpec {
                label: "2Y".to_string(),
                id: "DGS2".to_string(),
            },
            MaturitySpec {
                label: "10Y".to_string(),
                id: "DGS10".to_string(),
            },
        ],
        targets: vec![TargetSpec::months_before("1 month ago", 1)],
    };
    config.holdings.min_date = "2023-01".to_string();
    config
}

pub const FEDFUNDS: &str = r#"{"observations": [
    {"date": "2024-01-01", "value": "5.33"},
    {"date": "2024-02-01", "value": "5.33"},
    {"date": "2024-03-01", "value": "."}
]}"#;

pub const DGS10_MONTHLY: &str = r#"{"observations": [
    {"date": "2024-01-01", "value": "4.06"},
    {"date": "2024-02-01", "value": "4.21"},
    {"date": "2024-03-01", "value": "4.21"}
]}"#;

pub const DGS2: &str = r#"{"observations": [
    {"date": "2024-02-28", "value": "4.64"},
    {"date": "2024-03-28", "value": "4.59"}
]}"#;

pub const DGS10: &str = r#"{"observations": [
    {"date": "2024-02-28", "value": "4.27"},
    {"date": "2024-03-28", "value": "4.20"}
]}"#;

pub const FISCAL_STATEMENT: &str = r#"{"data": [
    {"record_date": "2024-02-12", "src_line_nbr": "1", "data_type_cd": "T",
     "classification_desc": "FY 2024", "current_month_gross_rcpt_amt": null,
     "current_month_gross_outly_amt": null, "current_month_dfct_sur_amt": null},
    {"record_date": "2024-02-12", "src_line_nbr": "2", "data_type_cd": "D",
     "classification_desc": "October", "current_month_gross_rcpt_amt": "403000000000",
     "current_month_gross_outly_amt": "470000000000", "current_month_dfct_sur_amt": "-67000000000"},
    {"record_date": "2024-02-12", "src_line_nbr": "3", "data_type_cd": "D",
     "classification_desc": "November", "current_month_gross_rcpt_amt": "275000000000",
     "current_month_gross_outly_amt": "589000000000", "current_month_dfct_sur_amt": "-314000000000"}
]}"#;

pub const ARCHIVE: &str = "Country\tDec\tNov\n\
\t2023\t2023\n\
-------\t----\t----\n\
Japan\t1,138.2\t1,126.3\n\
China, Mainland\t816.3\t782.0\n\
Grand Total\t7,939.3\t7,698.6\n";

pub const CURRENT: &str = "<table>\
<tr><td>Country</td><td>2024-02</td><td>2024-01</td></tr>\
<tr><td>Japan</td><td>1,167.9</td><td>1,151.9</td></tr>\
<tr><td>China, Mainland</td><td>775.0</td><td>797.7</td></tr>\
<tr><td>Grand Total</td><td>7,963.6</td><td>7,946.4</td></tr>\
</table>";

fn all() -> [(&'static str, &'static str); 7] {
    [
        ("FEDFUNDS", FEDFUNDS),
        ("DGS10@m", DGS10_MONTHLY),
        ("DGS2", DGS2),
        ("DGS10", DGS10),
        (FISCAL, FISCAL_STATEMENT),
        (HOLDINGS_ARCHIVE, ARCHIVE),
        (HOLDINGS_CURRENT, CURRENT),
    ]
}

pub fn payloads() -> RawPayloads {
    all()
        .into_iter()
        .map(|(name, text)| (name.to_string(), Ok(text.to_string())))
        .collect()
}

pub fn memory_source() -> MemorySource {
    all()
        .into_iter()
        .fold(MemorySource::new(), |source, (name, text)| source.with_payload(name, text))
}
