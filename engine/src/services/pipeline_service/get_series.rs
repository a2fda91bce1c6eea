// Handler for the GetSeries RPC
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Response, Status};

use super::helpers::{parse_currency, to_series_response};
use crate::data::run_store::RunStore;
use crate::services::{SeriesRequest, SeriesResponse};

pub async fn handle_get_series(
    req_payload: SeriesRequest,
    run_store: Arc<RwLock<RunStore>>,
) -> Result<Response<ReceiverStream<Result<SeriesResponse, Status>>>, Status> {
    let currency = parse_currency(&req_payload.currency)?;

    let store = run_store.read().await;
    let snapshots = store.series(&req_payload.metric, currency);
    drop(store);

    let snapshots = match snapshots {
        Some(s) if s.is_empty() => {
            tracing::warn!(metric = %req_payload.metric, "Requested metric not present in the latest run");
            return Err(Status::not_found(format!("Metric '{}' not found in the latest run", req_payload.metric)));
        }
        Some(s) => s,
        None => {
            tracing::warn!("GetSeries requested before any successful pipeline run");
            return Err(Status::not_found("No pipeline run has completed yet"));
        }
    };

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        tracing::debug!(series = snapshots.len(), %currency, "Streaming series");
        for snapshot in &snapshots {
            if let Err(e) = tx.send(Ok(to_series_response(snapshot))).await {
                tracing::error!(error = ?e, metric = %snapshot.metric, "Failed to send series to stream; client went away");
                return;
            }
        }
    });

    Ok(Response::new(ReceiverStream::new(rx)))
}
