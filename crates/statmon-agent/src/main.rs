mod config;
mod pipeline;
mod transport;

use std::net::UdpSocket;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use statmon_collector::{Collector, StandardCollector};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::pipeline::{Pipeline, PipelineConfig};
use crate::transport::{GrpcTransport, HttpTransport, Transport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statmon=info".parse()?))
        .init();

    let config = config::load()?;
    tracing::info!(
        address = %config.address,
        poll = ?config.poll_interval,
        report = ?config.report_interval,
        rate_limit = config.rate_limit,
        grpc = config.grpc_address.is_some(),
        "statmon-agent starting"
    );

    let transport = match &config.grpc_address {
        Some(endpoint) => Transport::Grpc(GrpcTransport::connect(endpoint).await?),
        None => Transport::Http(HttpTransport::new(
            &config.address,
            config.hash_key.clone(),
            config.crypto_key.as_deref().map(Path::new),
        )?),
    };

    let ip_address = local_ip().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "can't resolve outbound IP, using loopback");
        "127.0.0.1".to_string()
    });

    let collector: Arc<dyn Collector> = Arc::new(StandardCollector::new());
    let pipeline = Pipeline::new(Arc::new(transport), collector, ip_address);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    pipeline
        .run(
            PipelineConfig {
                poll_interval: config.poll_interval,
                report_interval: config.report_interval,
                rate_limit: config.rate_limit,
            },
            cancel,
        )
        .await;

    tracing::info!("agent stopped");
    Ok(())
}

/// The address the OS would route external traffic from; nothing is sent.
fn local_ip() -> std::io::Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip().to_string())
}
