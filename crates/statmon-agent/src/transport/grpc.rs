use statmon_common::proto::metrics_service_client::MetricsServiceClient;
use statmon_common::proto::{self, UpdateMetricsRequest};
use statmon_common::types::Metric;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;

use super::SendError;

/// gRPC delivery: one unary `UpdateMetrics` per batch over a plaintext
/// channel. The agent IP rides in `x-real-ip` metadata, mirroring the HTTP
/// header the server's ingress filter reads.
pub struct GrpcTransport {
    client: MetricsServiceClient<Channel>,
}

impl GrpcTransport {
    pub async fn connect(endpoint: &str) -> anyhow::Result<Self> {
        let endpoint = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{endpoint}")
        };
        let client = MetricsServiceClient::connect(endpoint).await?;
        tracing::info!("grpc transport connected");
        Ok(Self { client })
    }

    pub async fn send_metrics(&self, metrics: &[Metric], ip: &str) -> Result<(), SendError> {
        let batch: Vec<proto::Metric> = metrics
            .iter()
            .map(|m| proto::Metric {
                id: m.id.clone(),
                r#type: m.kind.clone(),
                value: m.value.unwrap_or_default(),
                delta: m.delta.unwrap_or_default(),
            })
            .collect();

        let mut request = tonic::Request::new(UpdateMetricsRequest { metrics: batch });
        request
            .metadata_mut()
            .insert("x-real-ip", MetadataValue::try_from(ip)?);

        // Channel clients are cheap clones over one shared connection.
        let mut client = self.client.clone();
        client.update_metrics(request).await?;
        Ok(())
    }
}
