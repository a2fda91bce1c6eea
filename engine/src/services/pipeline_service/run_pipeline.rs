// Handler for the RunPipeline RPC
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tonic::{Response, Status};

use super::helpers::{resolve_input, to_run_response};
use crate::config::settings::PipelineSettings;
use crate::data::run_store::RunStore;
use crate::pipeline;
use crate::services::{RunPipelineRequest, RunPipelineResponse};

pub async fn handle_run_pipeline(
    req_payload: RunPipelineRequest,
    settings: Arc<PipelineSettings>,
    run_store: Arc<RwLock<RunStore>>,
    run_lock: Arc<Mutex<()>>,
) -> Result<Response<RunPipelineResponse>, Status> {
    let mut run_settings = (*settings).clone();
    let requested = req_payload.input_path.trim();
    if !requested.is_empty() {
        let source_dir = settings.source.path.parent().unwrap_or_else(|| Path::new(""));
        let source_dir = if source_dir.as_os_str().is_empty() { Path::new(".") } else { source_dir };
        run_settings.source.path = resolve_input(source_dir, requested).map_err(|status| {
            tracing::warn!(input_path = %requested, error = %status.message(), "Rejected RunPipeline input path");
            status
        })?;
    }
    if req_payload.skip_conversion {
        run_settings.conversion.enabled = false;
    }

    // Overlapping triggers run one after another; both write the same output files.
    let _guard = run_lock.lock().await;
    tracing::debug!(source = %run_settings.source.path.display(), "Run lock acquired; starting pipeline on blocking thread");

    let dashboard_path = run_settings.output.dashboard_json.display().to_string();
    let outcome = tokio::task::spawn_blocking(move || pipeline::run_pipeline(&run_settings))
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "Pipeline task panicked or was cancelled");
            Status::internal(format!("Pipeline task failed: {}", e))
        })??;

    let response = to_run_response(&outcome, &dashboard_path);
    let mut store = run_store.write().await;
    store.record(outcome.processed.dataset, outcome.report);
    drop(store);

    Ok(Response::new(response))
}
