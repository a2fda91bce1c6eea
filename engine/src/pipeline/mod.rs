// KPI reshape-and-convert pipeline.
//
//   raw table → reshape (melt) → rates + convert → pivot → assemble → DashboardDataset
//
// `process` is the pure transformation over an already-read table. `run_pipeline` adds
// the source read and the output writes around it and is what triggers (CLI, gRPC) call.
pub mod assemble;
pub mod convert;
pub mod pivot;
pub mod reshape;
pub mod validate;

use crate::config::settings::PipelineSettings;
use crate::data::table::WideTable;
use crate::data::writer::OutputBatch;
use crate::error::PipelineError;
use chrono::Utc;
use shared::catalog::MetricCatalog;
use shared::models::{ConvertedRow, Currency, DashboardDataset, PipelineTable};
use shared::report::{DataIssue, MetricSummary, PipelineReport, SeverityCounts};
use std::path::PathBuf;
use uuid::Uuid;
use validate::QualityRules;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// When false, USD values are passed through to both currency slots.
    pub convert_currency: bool,
    /// Read `(500)` as -500.
    pub accounting_negatives: bool,
    pub quality: QualityRules,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { convert_currency: true, accounting_negatives: true, quality: QualityRules::default() }
    }
}

/// Everything a single pass produces, before anything is written.
#[derive(Debug, Clone)]
pub struct Processed {
    pub rows: Vec<ConvertedRow>,
    pub dataset: DashboardDataset,
    pub pipeline_usd: PipelineTable,
    pub pipeline_eur: PipelineTable,
    pub issues: Vec<DataIssue>,
    pub summaries: Vec<MetricSummary>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub processed: Processed,
    pub report: PipelineReport,
    pub written: Vec<PathBuf>,
}

impl PipelineOutcome {
    pub fn dataset(&self) -> &DashboardDataset {
        &self.processed.dataset
    }
}

/// Pure single-pass transformation of a wide table. No I/O, no clock.
pub fn process(
    table: &WideTable,
    catalog: &MetricCatalog,
    options: PipelineOptions,
) -> Result<Processed, PipelineError> {
    let mut issues = Vec::new();

    let long = reshape::melt(table, options.accounting_negatives, &mut issues)?;

    let rates = if options.convert_currency {
        Some(convert::extract_rates(&long, catalog.rate_metric(), &mut issues)?)
    } else {
        tracing::info!("Currency conversion disabled; USD values passed through to EUR");
        None
    };
    let rows = convert::convert(&long, catalog, rates.as_ref(), &mut issues);
    validate::check_quality(&long, catalog.rate_metric(), &options.quality, &mut issues);

    let metrics = assemble::ordered_metrics(catalog, &long.metrics);
    let pipeline_usd = pivot::pivot(&rows, &long.periods, &metrics, Currency::Usd)?;
    let pipeline_eur = pivot::pivot(&rows, &long.periods, &metrics, Currency::Eur)?;

    let dataset = assemble::assemble(&rows, &long.periods, &metrics)?;
    let summaries = assemble::summarize(&rows, &metrics, catalog);

    Ok(Processed { rows, dataset, pipeline_usd, pipeline_eur, issues, summaries })
}

/// Runs one full pipeline pass as configured: read, transform, write.
///
/// Outputs are only replaced once every artifact has been produced; a failed run leaves
/// previous artifacts untouched.
pub fn run_pipeline(settings: &PipelineSettings) -> Result<PipelineOutcome, PipelineError> {
    let catalog = settings.build_catalog()?;
    let source = settings.table_source()?;
    let source_name = source.describe();
    tracing::info!(source = %source_name, convert = settings.conversion.enabled, "Starting KPI pipeline run");

    let result = source
        .read_table()
        .and_then(|table| process(&table, &catalog, settings.options()));
    let processed = match result {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(stage = %e.stage(), error = %e, "Pipeline run failed; previous outputs left untouched");
            return Err(e);
        }
    };

    let severity_counts = SeverityCounts::from_issues(&processed.issues);
    let report = PipelineReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        source: source_name,
        metrics_count: processed.dataset.metrics.len(),
        periods_count: processed.dataset.periods.len(),
        conversion_applied: settings.conversion.enabled,
        status: severity_counts.status(),
        severity_counts,
        issues: processed.issues.clone(),
        summaries: processed.summaries.clone(),
    };

    let output = &settings.output;
    let mut batch = OutputBatch::new();
    batch.stage_dataset(&output.dashboard_json, &processed.dataset)?;
    batch.stage_pipeline_csv(&output.pipeline_csv_usd, &processed.pipeline_usd)?;
    batch.stage_pipeline_csv(&output.pipeline_csv_eur, &processed.pipeline_eur)?;
    if let Some(path) = &output.long_csv {
        batch.stage_long_csv(path, &processed.rows)?;
    }
    if let Some(path) = &output.report_json {
        batch.stage_report(path, &report)?;
    }
    let written = batch.commit()?;

    tracing::info!(
        run_id = %report.run_id,
        metrics = report.metrics_count,
        periods = report.periods_count,
        issues = report.issue_count(),
        status = %report.status,
        "KPI pipeline run completed"
    );

    Ok(PipelineOutcome { processed, report, written })
}
