// Folds converted long rows into the DashboardDataset artifact.
use crate::error::{PipelineError, Stage};
use shared::catalog::MetricCatalog;
use shared::models::{ConvertedRow, DashboardDataset};
use shared::report::MetricSummary;
use std::collections::{BTreeMap, HashMap};

/// Orders metrics by catalog declaration, then unknown metrics by name. The order is a
/// function of the metric set only, so it does not change when source rows are shuffled.
pub fn ordered_metrics(catalog: &MetricCatalog, metrics: &[String]) -> Vec<String> {
    let mut ordered = metrics.to_vec();
    ordered.sort_by(|a, b| match (catalog.position(a), catalog.position(b)) {
        (Some(pa), Some(pb)) => pa.cmp(&pb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    ordered
}

pub fn assemble(
    rows: &[ConvertedRow],
    periods: &[String],
    metrics: &[String],
) -> Result<DashboardDataset, PipelineError> {
    let period_index: HashMap<&str, usize> = periods.iter().enumerate().map(|(i, p)| (p.as_str(), i)).collect();

    let mut values_usd: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    let mut values_eur: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    let mut filled: HashMap<&str, Vec<bool>> = HashMap::new();
    for metric in metrics {
        values_usd.insert(metric.clone(), vec![None; periods.len()]);
        values_eur.insert(metric.clone(), vec![None; periods.len()]);
        filled.insert(metric.as_str(), vec![false; periods.len()]);
    }

    for row in rows {
        let idx = *period_index.get(row.period.as_str()).ok_or_else(|| {
            PipelineError::malformed(Stage::Assemble, format!("unknown period '{}' for metric '{}'", row.period, row.metric))
        })?;
        let seen = filled
            .get_mut(row.metric.as_str())
            .ok_or_else(|| PipelineError::malformed(Stage::Assemble, format!("unknown metric '{}'", row.metric)))?;
        if seen[idx] {
            return Err(PipelineError::malformed(
                Stage::Assemble,
                format!("more than one value for metric '{}' in period '{}'", row.metric, row.period),
            ));
        }
        seen[idx] = true;
        if let Some(series) = values_usd.get_mut(&row.metric) {
            series[idx] = row.usd;
        }
        if let Some(series) = values_eur.get_mut(&row.metric) {
            series[idx] = row.eur;
        }
    }

    let dataset = DashboardDataset {
        metrics: metrics.to_vec(),
        periods: periods.to_vec(),
        values_usd,
        values_eur,
    };
    if !dataset.is_aligned() {
        return Err(PipelineError::malformed(Stage::Assemble, "metric series are not aligned with periods"));
    }
    Ok(dataset)
}

/// Per-metric summary statistics, in dataset metric order.
pub fn summarize(rows: &[ConvertedRow], metrics: &[String], catalog: &MetricCatalog) -> Vec<MetricSummary> {
    metrics
        .iter()
        .map(|metric| {
            MetricSummary::from_rows(
                metric,
                catalog.class_or_default(metric),
                rows.iter().filter(|r| &r.metric == metric),
            )
        })
        .collect()
}
