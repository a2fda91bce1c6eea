// DashboardPipeline gRPC service: triggers pipeline runs and serves the latest dataset.
use super::{
    DashboardPipeline, HealthRequest, HealthResponse, RunPipelineRequest, RunPipelineResponse, SeriesRequest,
    SeriesResponse,
};
use crate::config::settings::PipelineSettings;
use crate::data::run_store::RunStore;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

pub mod get_series;
pub mod helpers;
pub mod run_pipeline;

pub struct PipelineService {
    settings: Arc<PipelineSettings>,
    run_store: Arc<RwLock<RunStore>>,
    run_lock: Arc<Mutex<()>>,
}

impl PipelineService {
    pub fn new(settings: PipelineSettings, run_store: Arc<RwLock<RunStore>>) -> Self {
        PipelineService {
            settings: Arc::new(settings),
            run_store,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[tonic::async_trait]
impl DashboardPipeline for PipelineService {
    async fn run_pipeline(&self, request: Request<RunPipelineRequest>) -> Result<Response<RunPipelineResponse>, Status> {
        let req_payload = request.into_inner();
        tracing::info!(
            input_path = %req_payload.input_path,
            skip_conversion = req_payload.skip_conversion,
            "Received RunPipelineRequest"
        );
        run_pipeline::handle_run_pipeline(
            req_payload,
            self.settings.clone(),
            self.run_store.clone(),
            self.run_lock.clone(),
        )
        .await
    }

    type GetSeriesStream = ReceiverStream<Result<SeriesResponse, Status>>;
    async fn get_series(&self, request: Request<SeriesRequest>) -> Result<Response<Self::GetSeriesStream>, Status> {
        let req_payload = request.into_inner();
        tracing::info!(metric = %req_payload.metric, currency = %req_payload.currency, "Received SeriesRequest");
        get_series::handle_get_series(req_payload, self.run_store.clone()).await
    }

    async fn health(&self, _request: Request<HealthRequest>) -> Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse { status: "healthy".to_string() }))
    }
}
