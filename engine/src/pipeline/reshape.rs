// Wide → long melt: one MetricRow per (metric, period) cell.
use crate::data::csv_parser::currency_format;
use crate::data::table::WideTable;
use crate::error::{PipelineError, Stage};
use shared::models::MetricRow;
use shared::report::DataIssue;
use std::collections::HashSet;

/// Long-format view of a wide table.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    pub periods: Vec<String>,
    /// Metric names in source order.
    pub metrics: Vec<String>,
    /// Ordered by metric (source order), then period (column order).
    pub rows: Vec<MetricRow>,
}

impl LongTable {
    pub fn rows_for<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = &'a MetricRow> + 'a {
        self.rows.iter().filter(move |r| r.metric == metric)
    }
}

/// Melts `table` into long format. Empty or unparsable cells become `value: None`
/// rather than being dropped; unparsable ones are recorded in `issues`.
pub fn melt(
    table: &WideTable,
    accounting_negatives: bool,
    issues: &mut Vec<DataIssue>,
) -> Result<LongTable, PipelineError> {
    let mut metrics = Vec::with_capacity(table.rows.len());
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(table.rows.len() * table.periods.len());

    for source_row in &table.rows {
        if source_row.metric.is_empty() {
            return Err(PipelineError::malformed(
                Stage::Reshape,
                format!("row {} has values but no metric name", source_row.line),
            ));
        }
        if !seen.insert(source_row.metric.as_str()) {
            return Err(PipelineError::malformed(
                Stage::Reshape,
                format!("duplicate metric '{}' at row {}", source_row.metric, source_row.line),
            ));
        }
        metrics.push(source_row.metric.clone());

        for (period, cell) in table.periods.iter().zip(&source_row.cells) {
            let value = currency_format::parse_cell(cell, accounting_negatives);
            if currency_format::is_unparsable(cell, value) {
                tracing::warn!(metric = %source_row.metric, period = %period, raw = %cell.raw(), "Unparsable cell treated as missing");
                issues.push(DataIssue::UnparsableCell {
                    metric: source_row.metric.clone(),
                    period: period.clone(),
                    raw: cell.raw(),
                });
            }
            rows.push(MetricRow {
                metric: source_row.metric.clone(),
                period: period.clone(),
                raw: cell.raw(),
                value,
            });
        }
    }

    tracing::debug!(metrics = metrics.len(), periods = table.periods.len(), rows = rows.len(), "Melted wide table");
    Ok(LongTable { periods: table.periods.clone(), metrics, rows })
}
