//! Calendar helpers shared by the parsers.
//!
//! Dates travel through the pipeline as zero-padded ISO text (`YYYY-MM` or
//! `YYYY-MM-DD`), so ordering by string comparison is ordering by time.

/// Calendar months in fiscal-year order (October through September).
pub const FISCAL_MONTHS: [u32; 12] = [10, 11, 12, 1, 2, 3, 4, 5, 6, 7, 8, 9];

/// Display labels for [`FISCAL_MONTHS`], same order.
pub const FISCAL_MONTH_LABELS: [&str; 12] = [
    "Oct", "Nov", "Dec", "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep",
];

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Map a month name to its number (1-12).
///
/// Accepts full names and three-letter abbreviations, case-insensitive, with
/// surrounding whitespace and a trailing period ignored ("Sept." is accepted).
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().trim_end_matches('.').to_ascii_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTH_NAMES
        .iter()
        .position(|full| *full == lower || (full.starts_with(&lower) && lower.len() <= 4))
        .map(|i| i as u32 + 1)
}

/// Position of a calendar month within the fiscal year (October = 0).
#[inline]
pub fn fiscal_month_index(calendar_month: u32) -> usize {
    ((calendar_month + 2) % 12) as usize
}

/// Calendar year a fiscal-year month falls in: Oct-Dec belong to `fiscal_year - 1`.
#[inline]
pub fn calendar_year_for(fiscal_year: i32, calendar_month: u32) -> i32 {
    if calendar_month >= 10 {
        fiscal_year - 1
    } else {
        fiscal_year
    }
}

/// Compose a `YYYY-MM` key.
pub fn month_key(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

/// Parse the leading `YYYY-MM` of a date string.
///
/// Works for both month keys and full ISO dates. Returns `None` unless the
/// first seven characters are four digits, a dash, and a valid two-digit month.
pub fn parse_month_key(text: &str) -> Option<(i32, u32)> {
    let bytes = text.trim().as_bytes();
    if bytes.len() < 7 || bytes[4] != b'-' {
        return None;
    }
    if !bytes[..4].iter().all(u8::is_ascii_digit) || !bytes[5..7].iter().all(u8::is_ascii_digit) {
        return None;
    }
    // The eighth character, if any, must not extend the month into three digits.
    if bytes.len() > 7 && bytes[7].is_ascii_digit() {
        return None;
    }
    let trimmed = text.trim();
    let year: i32 = trimmed[..4].parse().ok()?;
    let month: u32 = trimmed[5..7].parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

/// Whether a cell looks like a `YYYY-MM` date label.
#[inline]
pub fn is_month_label(text: &str) -> bool {
    parse_month_key(text).is_some()
}

/// Months since year zero; differences give whole-month distances.
#[inline]
pub fn month_ordinal(year: i32, month: u32) -> i32 {
    year * 12 + month as i32 - 1
}

/// Whether a month closes a calendar quarter.
#[inline]
pub fn is_quarter_end(month: u32) -> bool {
    month % 3 == 0
}
