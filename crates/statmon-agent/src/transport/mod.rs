//! Outbound delivery. One of two wire transports is selected at startup;
//! both carry the same batch contract and the agent's IP address.

pub mod grpc;
pub mod http;

use std::future::Future;

use statmon_common::types::Metric;

pub use grpc::GrpcTransport;
pub use http::HttpTransport;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("can't encode batch: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("can't compress batch: {0}")]
    Compress(#[from] std::io::Error),
    #[error("can't encrypt batch: {0}")]
    Encrypt(#[from] rsa::Error),
    #[error("payload of {len} bytes exceeds a single RSA block of {max}")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),
    #[error("grpc call failed: {0}")]
    Grpc(#[from] tonic::Status),
    #[error("bad metadata value: {0}")]
    Metadata(#[from] tonic::metadata::errors::InvalidMetadataValue),
}

/// Delivery seam the pipeline drives; tests substitute a counting fake.
pub trait Client: Send + Sync + 'static {
    fn send_metrics(
        &self,
        metrics: Vec<Metric>,
        ip: &str,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}

pub enum Transport {
    Http(HttpTransport),
    Grpc(GrpcTransport),
}

impl Client for Transport {
    async fn send_metrics(&self, metrics: Vec<Metric>, ip: &str) -> Result<(), SendError> {
        match self {
            Transport::Http(t) => t.send_metrics(&metrics, ip).await,
            Transport::Grpc(t) => t.send_metrics(&metrics, ip).await,
        }
    }
}
