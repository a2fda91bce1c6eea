// Exchange-rate extraction and USD → EUR conversion.
use crate::error::PipelineError;
use crate::pipeline::reshape::LongTable;
use shared::catalog::MetricCatalog;
use shared::models::{ConversionClass, ConvertedRow, ExchangeRateSeries};
use shared::report::DataIssue;
use std::collections::HashSet;

/// Builds the rate series from the row named `rate_metric`.
///
/// Blank or unparsable rate cells leave the period without a rate. Parsed but unusable
/// rates (zero, negative) are reported as `InvalidRate` and also left out.
pub fn extract_rates(
    long: &LongTable,
    rate_metric: &str,
    issues: &mut Vec<DataIssue>,
) -> Result<ExchangeRateSeries, PipelineError> {
    if !long.metrics.iter().any(|m| m == rate_metric) {
        return Err(PipelineError::MissingRateRow(rate_metric.to_string()));
    }

    let mut series = ExchangeRateSeries::new();
    for row in long.rows_for(rate_metric) {
        if let Some(rate) = row.value {
            if !series.insert(&row.period, rate) {
                tracing::warn!(period = %row.period, raw = %row.raw, "Unusable exchange rate ignored");
                issues.push(DataIssue::InvalidRate { period: row.period.clone(), raw: row.raw.clone() });
            }
        }
    }

    tracing::info!(rate_metric = %rate_metric, periods_with_rate = series.len(), periods = long.periods.len(), "Extracted exchange-rate series");
    Ok(series)
}

/// Converts every long row. With `rates == None` conversion is skipped and USD is passed
/// through to the EUR slot for every metric.
///
/// Each row depends only on its own metric's class and its period's rate, so the result
/// does not depend on source row order.
pub fn convert(
    long: &LongTable,
    catalog: &MetricCatalog,
    rates: Option<&ExchangeRateSeries>,
    issues: &mut Vec<DataIssue>,
) -> Vec<ConvertedRow> {
    for metric in &long.metrics {
        if catalog.classify(metric).is_none() {
            tracing::warn!(metric = %metric, "Metric not in catalog; treating as non-monetary");
            issues.push(DataIssue::UnknownMetric { metric: metric.clone() });
        }
    }

    let already_invalid: HashSet<String> = issues
        .iter()
        .filter_map(|i| match i {
            DataIssue::InvalidRate { period, .. } => Some(period.clone()),
            _ => None,
        })
        .collect();
    let mut missing_reported: HashSet<String> = HashSet::new();

    let converted: Vec<ConvertedRow> = long
        .rows
        .iter()
        .map(|row| {
            let class = catalog.class_or_default(&row.metric);
            let eur = match (class, rates) {
                (ConversionClass::Monetary, Some(rates)) => {
                    let eur = rates.convert(&row.period, row.value);
                    if row.value.is_some()
                        && eur.is_none()
                        && !already_invalid.contains(&row.period)
                        && missing_reported.insert(row.period.clone())
                    {
                        tracing::warn!(period = %row.period, "No exchange rate for period with monetary data");
                        issues.push(DataIssue::MissingRate { period: row.period.clone() });
                    }
                    eur
                }
                _ => row.value,
            };
            ConvertedRow {
                metric: row.metric.clone(),
                period: row.period.clone(),
                class,
                usd: row.value,
                eur,
            }
        })
        .collect();

    let monetary = long.metrics.iter().filter(|m| catalog.class_or_default(m) == ConversionClass::Monetary).count();
    tracing::info!(monetary_metrics = monetary, conversion_applied = rates.is_some(), "Converted long rows");
    converted
}
