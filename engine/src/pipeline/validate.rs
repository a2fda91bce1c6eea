// Data-quality checks over the long table. Findings become issues in the run report;
// none of them stop a run.
use crate::pipeline::reshape::LongTable;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use shared::report::{DataIssue, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRules {
    /// Metrics whose values can never be negative.
    #[serde(default = "default_positive_only")]
    pub positive_only: Vec<String>,
    /// Plausible exchange-rate band; rates outside it are flagged, not dropped.
    #[serde(default = "default_rate_min")]
    pub rate_min: f64,
    #[serde(default = "default_rate_max")]
    pub rate_max: f64,
}

fn default_positive_only() -> Vec<String> {
    ["GMV", "Funded Amount", "# Invoices", "# Boxes"].iter().map(|s| s.to_string()).collect()
}

fn default_rate_min() -> f64 {
    0.7
}

fn default_rate_max() -> f64 {
    1.3
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            positive_only: default_positive_only(),
            rate_min: default_rate_min(),
            rate_max: default_rate_max(),
        }
    }
}

/// Runs every check and appends the findings to `issues`.
pub fn check_quality(long: &LongTable, rate_metric: &str, rules: &QualityRules, issues: &mut Vec<DataIssue>) {
    let start = issues.len();
    check_positive_only(long, rate_metric, rules, issues);
    check_period_continuity(&long.periods, issues);
    check_rate_plausibility(long, rate_metric, rules, issues);

    for issue in &issues[start..] {
        match issue.severity() {
            Severity::Info => tracing::info!(%issue, "Data quality note"),
            _ => tracing::warn!(%issue, "Data quality issue"),
        }
    }
}

/// The rate row is skipped here: non-positive rates are already reported as invalid.
fn check_positive_only(long: &LongTable, rate_metric: &str, rules: &QualityRules, issues: &mut Vec<DataIssue>) {
    for metric in rules.positive_only.iter().filter(|m| m.as_str() != rate_metric) {
        for row in long.rows_for(metric) {
            if let Some(value) = row.value.filter(|v| *v < 0.0) {
                issues.push(DataIssue::NegativeValue {
                    metric: row.metric.clone(),
                    period: row.period.clone(),
                    value,
                });
            }
        }
    }
}

fn parse_period(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("01-{}", label), "%d-%b-%y").ok()
}

fn check_period_continuity(periods: &[String], issues: &mut Vec<DataIssue>) {
    if periods.len() < 2 {
        issues.push(DataIssue::TooFewPeriods { count: periods.len() });
        return;
    }

    let mut parsed: Vec<(&String, NaiveDate)> = Vec::with_capacity(periods.len());
    for period in periods {
        match parse_period(period) {
            Some(date) => parsed.push((period, date)),
            None => issues.push(DataIssue::UnrecognizedPeriod { period: period.clone() }),
        }
    }

    for pair in parsed.windows(2) {
        let (from, a) = pair[0];
        let (to, b) = pair[1];
        let months_apart = (b.year() - a.year()) * 12 + b.month() as i32 - a.month() as i32;
        if months_apart != 1 {
            issues.push(DataIssue::NonConsecutivePeriods { from: from.clone(), to: to.clone() });
        }
    }
}

fn check_rate_plausibility(long: &LongTable, rate_metric: &str, rules: &QualityRules, issues: &mut Vec<DataIssue>) {
    for row in long.rows_for(rate_metric) {
        let Some(rate) = row.value.filter(|r| r.is_finite() && *r > 0.0) else {
            continue;
        };
        if rate < rules.rate_min || rate > rules.rate_max {
            issues.push(DataIssue::RateOutOfRange {
                period: row.period.clone(),
                rate,
                min: rules.rate_min,
                max: rules.rate_max,
            });
        }
        if rate == 1.0 {
            issues.push(DataIssue::RateAtParity { period: row.period.clone() });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::table::{Cell, WideTable};
    use crate::pipeline::reshape::melt;

    const RATE: &str = "USD to EUR rate";

    fn long(rows: &[&[&str]]) -> LongTable {
        let grid = rows.iter().map(|r| r.iter().map(|c| Cell::from_text(c)).collect()).collect();
        melt(&WideTable::from_grid(grid).unwrap(), true, &mut Vec::new()).unwrap()
    }

    fn run(table: &LongTable) -> Vec<DataIssue> {
        let mut issues = Vec::new();
        check_quality(table, RATE, &QualityRules::default(), &mut issues);
        issues
    }

    #[test]
    fn test_clean_table_has_no_findings() {
        let table = long(&[
            &["month", "Nov-24", "Dec-24", "Jan-25"],
            &[RATE, "0.90", "0.91", "0.92"],
            &["GMV", "$1,000", "$2,000", ""],
            &["Cash Drag", "-0.1", "0.2", "0.3"],
        ]);
        assert!(run(&table).is_empty());
    }

    #[test]
    fn test_negative_value_in_positive_only_metric() {
        let table = long(&[
            &["month", "Jan-25", "Feb-25"],
            &[RATE, "0.9", "0.9"],
            &["GMV", "($500)", "$100"],
            &["Logistic Costs", "-20", "-30"],
        ]);
        assert_eq!(
            run(&table),
            vec![DataIssue::NegativeValue { metric: "GMV".to_string(), period: "Jan-25".to_string(), value: -500.0 }]
        );
    }

    #[test]
    fn test_period_gaps_and_unrecognized_labels() {
        let table = long(&[&["month", "Jan-25", "Mar-25", "Q2 2025", "Apr-25"], &[RATE, "0.9", "0.9", "0.9", "0.9"]]);
        assert_eq!(
            run(&table),
            vec![
                DataIssue::UnrecognizedPeriod { period: "Q2 2025".to_string() },
                DataIssue::NonConsecutivePeriods { from: "Jan-25".to_string(), to: "Mar-25".to_string() },
            ]
        );
    }

    #[test]
    fn test_single_period_cannot_be_checked() {
        let table = long(&[&["month", "Jan-25"], &[RATE, "0.9"]]);
        let issues = run(&table);
        assert_eq!(issues, vec![DataIssue::TooFewPeriods { count: 1 }]);
        assert_eq!(issues[0].severity(), Severity::Info);
    }

    #[test]
    fn test_rate_plausibility() {
        let table = long(&[&["month", "Jan-25", "Feb-25", "Mar-25", "Apr-25"], &[RATE, "1.0", "1.5", "0", ""]]);
        let issues = run(&table);
        assert_eq!(
            issues,
            vec![
                DataIssue::RateAtParity { period: "Jan-25".to_string() },
                DataIssue::RateOutOfRange { period: "Feb-25".to_string(), rate: 1.5, min: 0.7, max: 1.3 },
            ]
        );
        assert_eq!(issues[1].severity(), Severity::Warning);
    }
}
