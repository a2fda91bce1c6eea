// Period label and value formatting helpers shared by readers and writers.
use chrono::{NaiveDate, NaiveDateTime};

/// Label format used for periods in every output artifact, e.g. "Jan-25".
pub const PERIOD_LABEL_FORMAT: &str = "%b-%y";

/// Normalizes a header cell that holds a date into a `Mon-YY` label.
///
/// Spreadsheet exports render month columns as `2025-01-01 00:00:00`, `2025-01-01`,
/// `1/1/2025` or `1/1/25`. Anything else (already `Jan-25`, `January`, free text) is
/// returned trimmed but otherwise unchanged.
pub fn normalize_period_label(label: &str) -> String {
    let trimmed = label.trim();
    match parse_period_date(trimmed) {
        Some(date) => date.format(PERIOD_LABEL_FORMAT).to_string(),
        None => trimmed.to_string(),
    }
}

fn parse_period_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }

    // %Y happily accepts "25" as year 25, so pick the format by the year's width.
    let year_part = s.rsplit('/').next()?;
    if s.matches('/').count() != 2 {
        return None;
    }
    let format = match year_part.len() {
        2 => "%m/%d/%y",
        4 => "%m/%d/%Y",
        _ => return None,
    };
    NaiveDate::parse_from_str(s, format).ok()
}

/// Plain decimal rendering for machine-readable CSV output. Missing values are empty.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => String::new(),
    }
}
