use statmon_common::proto::metrics_service_server::MetricsService;
use statmon_common::proto::{UpdateMetricsRequest, UpdateMetricsResponse};
use statmon_common::types::Metric;
use tonic::{Request, Response, Status};

use crate::application::AppError;
use crate::state::AppState;

pub use statmon_common::proto::metrics_service_server::MetricsServiceServer;

/// gRPC ingestion service backed by the same batch path as `POST /updates/`.
pub struct MetricsServiceImpl {
    state: AppState,
}

impl MetricsServiceImpl {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl MetricsService for MetricsServiceImpl {
    async fn update_metrics(
        &self,
        request: Request<UpdateMetricsRequest>,
    ) -> Result<Response<UpdateMetricsResponse>, Status> {
        let proto = request.into_inner();

        // Proto3 scalars are always present, so both fields carry values
        // regardless of kind; the application dispatches on the declared
        // type, never on field presence.
        let batch: Vec<Metric> = proto
            .metrics
            .into_iter()
            .map(|m| Metric {
                value: Some(m.value),
                delta: Some(m.delta),
                id: m.id,
                kind: m.r#type,
            })
            .collect();

        self.state
            .app
            .update_metrics(&batch)
            .await
            .map_err(|e| match e {
                AppError::BadRequest(reason) => Status::invalid_argument(reason),
                AppError::NotFound(reason) => Status::not_found(reason),
                AppError::Internal(err) => {
                    tracing::error!(error = %err, "can't apply grpc batch");
                    Status::internal("storage failure")
                }
            })?;

        tracing::debug!(count = batch.len(), "grpc batch ingested");

        Ok(Response::new(UpdateMetricsResponse {
            status: "success".to_string(),
        }))
    }
}
