// gRPC surface of the engine. Generated code comes from proto/dashboard.proto via build.rs.
pub mod pipeline_service;

pub mod generated {
    tonic::include_proto!("dashboard");
}

pub use generated::dashboard_pipeline_server::{DashboardPipeline, DashboardPipelineServer};
pub use generated::{
    HealthRequest, HealthResponse, RunPipelineRequest, RunPipelineResponse, SeriesPoint, SeriesRequest,
    SeriesResponse,
};
