use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use statmon_common::interval::parse_interval;

/// Command-line surface. Options stay unset here so the resolver can apply
/// the precedence chain: JSON config file < flag < environment variable.
#[derive(Debug, Default, Parser)]
#[command(name = "statmon-server", about = "Metrics ingestion server")]
pub struct Args {
    /// HTTP listen address (host:port)
    #[arg(short = 'a', long)]
    pub address: Option<String>,
    /// Restore state from the snapshot file on startup
    #[arg(short = 'r', long, num_args = 0..=1, default_missing_value = "true")]
    pub restore: Option<bool>,
    /// Snapshot interval (bare seconds or a duration literal like 300s)
    #[arg(short = 'i', long)]
    pub store_interval: Option<String>,
    /// Snapshot file path; selects the file backend when set
    #[arg(short = 'f', long)]
    pub file_store_path: Option<String>,
    /// Database DSN; selects the database backend when set
    #[arg(short = 'd', long)]
    pub database_dsn: Option<String>,
    /// HMAC key for the HashSHA256 integrity check
    #[arg(short = 'k', long)]
    pub hash_key: Option<String>,
    /// Path to the RSA private key (PEM) for envelope decryption
    #[arg(short = 's', long)]
    pub crypto_key: Option<String>,
    /// Trusted ingress subnet in CIDR form
    #[arg(short = 't', long)]
    pub trusted_subnet: Option<String>,
    /// gRPC listen address; the gRPC service starts only when set
    #[arg(short = 'g', long)]
    pub grpc_address: Option<String>,
    /// Path to a JSON configuration file
    #[arg(short = 'c', long)]
    pub config: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    address: Option<String>,
    restore: Option<bool>,
    store_interval: Option<String>,
    store_file: Option<String>,
    database_dsn: Option<String>,
    crypto_key: Option<String>,
    trusted_subnet: Option<String>,
    grpc_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub grpc_address: Option<String>,
    pub restore: bool,
    pub store_interval: Duration,
    pub file_store_path: Option<String>,
    pub database_dsn: Option<String>,
    pub hash_key: Option<String>,
    pub crypto_key: Option<String>,
    pub trusted_subnet: Option<String>,
}

pub fn load() -> anyhow::Result<ServerConfig> {
    resolve(Args::parse(), &|name| std::env::var(name).ok())
}

fn resolve(args: Args, env: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<ServerConfig> {
    let config_path = env("CONFIG").or(args.config);
    let file: FileConfig = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("can't read config file {path}"))?;
            serde_json::from_str(&content)
                .with_context(|| format!("can't parse config file {path}"))?
        }
        None => FileConfig::default(),
    };

    let pick = |env_name: &str, flag: Option<String>, file: Option<String>| {
        env(env_name).or(flag).or(file)
    };

    let address = pick("ADDRESS", args.address, file.address)
        .unwrap_or_else(|| "localhost:8080".to_string());
    let store_interval = pick("STORE_INTERVAL", args.store_interval, file.store_interval)
        .unwrap_or_else(|| "300s".to_string());
    let file_store_path = pick("FILE_STORE_PATH", args.file_store_path, file.store_file);
    let database_dsn = pick("DATABASE_DSN", args.database_dsn, file.database_dsn);
    let hash_key = pick("KEY", args.hash_key, None);
    let crypto_key = pick("CRYPTO_KEY", args.crypto_key, file.crypto_key);
    let trusted_subnet = pick("TRUSTED_SUBNET", args.trusted_subnet, file.trusted_subnet);
    let grpc_address = pick("GRPC_ADDRESS", args.grpc_address, file.grpc_address);

    let restore = match env("RESTORE") {
        Some(v) => v.parse::<bool>().context("can't parse RESTORE")?,
        None => args.restore.or(file.restore).unwrap_or(true),
    };

    Ok(ServerConfig {
        address,
        grpc_address,
        restore,
        store_interval: parse_interval(&store_interval).context("store interval")?,
        file_store_path,
        database_dsn,
        hash_key,
        crypto_key,
        trusted_subnet,
    })
}
