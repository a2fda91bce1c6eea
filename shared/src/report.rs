// Run report: recoverable data issues plus per-metric summary statistics.
use crate::models::{ConversionClass, ConvertedRow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A hole or oddity in the source data that did not stop the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIssue {
    UnparsableCell { metric: String, period: String, raw: String },
    MissingRate { period: String },
    InvalidRate { period: String, raw: String },
    UnknownMetric { metric: String },
    /// A metric that can only be positive has a negative value.
    NegativeValue { metric: String, period: String, value: f64 },
    /// Fewer than two periods; continuity cannot be checked.
    TooFewPeriods { count: usize },
    UnrecognizedPeriod { period: String },
    NonConsecutivePeriods { from: String, to: String },
    RateOutOfRange { period: String, rate: f64, min: f64, max: f64 },
    /// A rate of exactly 1.0 is usually a placeholder.
    RateAtParity { period: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl DataIssue {
    pub fn severity(&self) -> Severity {
        match self {
            DataIssue::MissingRate { .. } | DataIssue::InvalidRate { .. } => Severity::Critical,
            DataIssue::UnparsableCell { .. }
            | DataIssue::UnknownMetric { .. }
            | DataIssue::NegativeValue { .. }
            | DataIssue::UnrecognizedPeriod { .. }
            | DataIssue::RateOutOfRange { .. } => Severity::Warning,
            DataIssue::TooFewPeriods { .. }
            | DataIssue::NonConsecutivePeriods { .. }
            | DataIssue::RateAtParity { .. } => Severity::Info,
        }
    }
}

/// Overall verdict of a run: the worst severity among its issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Pass,
    Warning,
    Critical,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityStatus::Pass => "pass",
            QualityStatus::Warning => "warning",
            QualityStatus::Critical => "critical",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn from_issues(issues: &[DataIssue]) -> Self {
        let mut counts = SeverityCounts::default();
        for issue in issues {
            match issue.severity() {
                Severity::Critical => counts.critical += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn status(&self) -> QualityStatus {
        if self.critical > 0 {
            QualityStatus::Critical
        } else if self.warning > 0 {
            QualityStatus::Warning
        } else {
            QualityStatus::Pass
        }
    }
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataIssue::UnparsableCell { metric, period, raw } => {
                write!(f, "Unparsable value '{}' for '{}' in {}; treated as missing", raw, metric, period)
            }
            DataIssue::MissingRate { period } => {
                write!(f, "No exchange rate for {}; EUR values left empty", period)
            }
            DataIssue::InvalidRate { period, raw } => {
                write!(f, "Unusable exchange rate '{}' for {}; EUR values left empty", raw, period)
            }
            DataIssue::UnknownMetric { metric } => {
                write!(f, "Metric '{}' is not in the catalog; passed through unconverted", metric)
            }
            DataIssue::NegativeValue { metric, period, value } => {
                write!(f, "Negative value {} for '{}' in {}", value, metric, period)
            }
            DataIssue::TooFewPeriods { count } => {
                write!(f, "Only {} period(s) found; continuity not checked", count)
            }
            DataIssue::UnrecognizedPeriod { period } => {
                write!(f, "Period '{}' does not match the Mon-YY format", period)
            }
            DataIssue::NonConsecutivePeriods { from, to } => {
                write!(f, "Non-consecutive periods: {} -> {}", from, to)
            }
            DataIssue::RateOutOfRange { period, rate, min, max } => {
                write!(f, "Exchange rate {} for {} outside expected range {}-{}", rate, period, min, max)
            }
            DataIssue::RateAtParity { period } => {
                write!(f, "Exchange rate for {} is exactly 1.0; verify it", period)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: String,
    pub class: ConversionClass,
    /// Number of periods with a USD value.
    pub points: usize,
    pub total_usd: Option<f64>,
    pub total_eur: Option<f64>,
    pub mean_usd: Option<f64>,
}

impl MetricSummary {
    /// Summarizes the rows of one metric. Missing values are skipped, not counted as zero.
    pub fn from_rows<'a, I>(metric: &str, class: ConversionClass, rows: I) -> Self
    where
        I: IntoIterator<Item = &'a ConvertedRow>,
    {
        let mut points = 0usize;
        let mut total_usd = None;
        let mut total_eur = None;
        for row in rows {
            if let Some(v) = row.usd {
                points += 1;
                total_usd = Some(total_usd.unwrap_or(0.0) + v);
            }
            if let Some(v) = row.eur {
                total_eur = Some(total_eur.unwrap_or(0.0) + v);
            }
        }
        MetricSummary {
            metric: metric.to_string(),
            class,
            points,
            total_usd,
            total_eur,
            mean_usd: total_usd.map(|t| t / points as f64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub metrics_count: usize,
    pub periods_count: usize,
    pub conversion_applied: bool,
    pub status: QualityStatus,
    pub severity_counts: SeverityCounts,
    pub issues: Vec<DataIssue>,
    pub summaries: Vec<MetricSummary>,
}

impl PipelineReport {
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn summary(&self, metric: &str) -> Option<&MetricSummary> {
        self.summaries.iter().find(|s| s.metric == metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(usd: Option<f64>, eur: Option<f64>) -> ConvertedRow {
        ConvertedRow {
            metric: "GMV".to_string(),
            period: "Jan-25".to_string(),
            class: ConversionClass::Monetary,
            usd,
            eur,
        }
    }

    #[test]
    fn test_summary_skips_missing_points() {
        let rows = vec![row(Some(1000.0), Some(900.0)), row(None, None), row(Some(2000.0), None)];
        let summary = MetricSummary::from_rows("GMV", ConversionClass::Monetary, &rows);
        assert_eq!(summary.points, 2);
        assert_eq!(summary.total_usd, Some(3000.0));
        assert_eq!(summary.total_eur, Some(900.0));
        assert_eq!(summary.mean_usd, Some(1500.0));
    }

    #[test]
    fn test_summary_of_empty_series_is_null_not_zero() {
        let rows = vec![row(None, None)];
        let summary = MetricSummary::from_rows("GMV", ConversionClass::Monetary, &rows);
        assert_eq!(summary.points, 0);
        assert_eq!(summary.total_usd, None);
        assert_eq!(summary.mean_usd, None);
    }

    #[test]
    fn test_issue_serializes_with_kind_tag() {
        let issue = DataIssue::MissingRate { period: "Feb-25".to_string() };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["kind"], "missing_rate");
        assert_eq!(json["period"], "Feb-25");
        assert!(issue.to_string().contains("Feb-25"));
    }

    #[test]
    fn test_status_is_worst_severity() {
        let info = DataIssue::RateAtParity { period: "Jan-25".to_string() };
        let warning = DataIssue::NegativeValue { metric: "GMV".to_string(), period: "Jan-25".to_string(), value: -5.0 };
        let critical = DataIssue::MissingRate { period: "Feb-25".to_string() };

        assert_eq!(SeverityCounts::from_issues(&[]).status(), QualityStatus::Pass);
        assert_eq!(SeverityCounts::from_issues(&[info.clone()]).status(), QualityStatus::Pass);
        let counts = SeverityCounts::from_issues(&[info, warning.clone()]);
        assert_eq!(counts, SeverityCounts { critical: 0, warning: 1, info: 1 });
        assert_eq!(counts.status(), QualityStatus::Warning);
        assert_eq!(SeverityCounts::from_issues(&[warning, critical]).status(), QualityStatus::Critical);
        assert_eq!(QualityStatus::Critical.to_string(), "critical");
    }
}
