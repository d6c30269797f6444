use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::RsaPrivateKey;
use statmon_server::application::Application;
use statmon_server::grpc::{MetricsServiceImpl, MetricsServiceServer};
use statmon_server::state::AppState;
use statmon_server::{app, config};
use statmon_storage::{Store, StoreConfig};
use tonic::transport::Server as TonicServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statmon=info".parse()?))
        .init();

    let config = config::load()?;
    run_server(config).await
}

async fn run_server(config: config::ServerConfig) -> Result<()> {
    tracing::info!(
        address = %config.address,
        grpc = config.grpc_address.as_deref().unwrap_or("disabled"),
        db = config.database_dsn.is_some(),
        file = config.file_store_path.as_deref().unwrap_or(""),
        "statmon-server starting"
    );

    let store = Store::open(&StoreConfig {
        database_dsn: config.database_dsn.clone(),
        file_path: config.file_store_path.clone(),
        store_interval: config.store_interval,
        restore: config.restore,
    })
    .await
    .context("can't open store")?;

    let private_key = match &config.crypto_key {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("can't read private key {path}"))?;
            Some(RsaPrivateKey::from_pkcs1_pem(&pem).context("can't parse private key")?)
        }
        None => None,
    };

    let application = Arc::new(Application::new(store));
    let state = AppState::new(application.clone())
        .with_hash_key(config.hash_key.clone())
        .with_private_key(private_key)
        .with_trusted_subnet(config.trusted_subnet.clone());

    let listener = tokio::net::TcpListener::bind(&config.address)
        .await
        .with_context(|| format!("can't bind {}", config.address))?;
    let router = app::build_router(state.clone());
    let http_server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());

    let grpc_server = match &config.grpc_address {
        Some(addr) => {
            let grpc_addr: SocketAddr = addr.parse().context("can't parse grpc address")?;
            let service = MetricsServiceServer::new(MetricsServiceImpl::new(state.clone()));
            Some(
                TonicServer::builder()
                    .add_service(service)
                    .serve_with_shutdown(grpc_addr, shutdown_signal()),
            )
        }
        None => None,
    };

    tracing::info!("server started");

    match grpc_server {
        Some(grpc_server) => {
            tokio::select! {
                result = http_server => result.context("http server failed")?,
                result = grpc_server => result.context("grpc server failed")?,
            }
        }
        None => http_server.await.context("http server failed")?,
    }

    // Final flush for the file backend, pool drain for db.
    if let Err(e) = application.close().await {
        tracing::error!(error = %e, "can't close store");
    }
    tracing::info!("server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
