// Conversions between engine types and generated gRPC messages
use crate::data::run_store::SeriesSnapshot;
use crate::pipeline::PipelineOutcome;
use crate::services::{RunPipelineResponse, SeriesPoint, SeriesResponse};
use shared::models::Currency;
use std::path::{Component, Path, PathBuf};
use tonic::Status;

/// An empty currency selects USD.
pub fn parse_currency(raw: &str) -> Result<Currency, Status> {
    if raw.trim().is_empty() {
        return Ok(Currency::Usd);
    }
    raw.parse::<Currency>()
        .map_err(|_| Status::invalid_argument(format!("Unsupported currency '{}'. Use 'USD' or 'EUR'.", raw)))
}

/// Resolves a requested input path inside `source_dir`.
///
/// Only plain relative paths are accepted. Absolute paths, `..` and anything that resolves
/// outside the directory through a symlink are rejected.
pub fn resolve_input(source_dir: &Path, requested: &str) -> Result<PathBuf, Status> {
    let relative = Path::new(requested);
    let plain = relative.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if requested.is_empty() || !plain {
        return Err(Status::invalid_argument(format!(
            "Input path '{}' must be relative to the configured source directory",
            requested
        )));
    }

    let candidate = source_dir.join(relative);
    // A missing file is reported by the source read itself.
    if let (Ok(dir), Ok(resolved)) = (source_dir.canonicalize(), candidate.canonicalize()) {
        if !resolved.starts_with(&dir) {
            return Err(Status::permission_denied(format!(
                "Input path '{}' resolves outside the configured source directory",
                requested
            )));
        }
    }
    Ok(candidate)
}

pub fn to_series_response(snapshot: &SeriesSnapshot) -> SeriesResponse {
    let points = snapshot
        .periods
        .iter()
        .zip(&snapshot.values)
        .map(|(period, value)| SeriesPoint {
            period: period.clone(),
            present: value.is_some(),
            value: value.unwrap_or_default(),
        })
        .collect();
    SeriesResponse {
        metric: snapshot.metric.clone(),
        currency: snapshot.currency.to_string(),
        class: snapshot.class.map(|c| c.to_string()).unwrap_or_default(),
        points,
    }
}

pub fn to_run_response(outcome: &PipelineOutcome, dashboard_path: &str) -> RunPipelineResponse {
    let report = &outcome.report;
    RunPipelineResponse {
        success: true,
        message: format!(
            "Processed {} metrics over {} periods with {} data issue(s)",
            report.metrics_count,
            report.periods_count,
            report.issue_count()
        ),
        run_id: report.run_id.to_string(),
        metrics_count: report.metrics_count as i32,
        periods_count: report.periods_count as i32,
        warnings: report.issues.iter().map(ToString::to_string).collect(),
        dashboard_path: dashboard_path.to_string(),
        quality_status: report.status.to_string(),
    }
}
