use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use statmon_common::interval::parse_interval;

/// Command-line surface. Every option is optional here so the resolver can
/// tell "explicitly set" apart from "defaulted"; precedence is
/// JSON config file < flag < environment variable.
#[derive(Debug, Default, Parser)]
#[command(name = "statmon-agent", about = "Metrics collection agent")]
pub struct Args {
    /// Server address (host:port)
    #[arg(short = 'a', long)]
    pub address: Option<String>,
    /// Report interval (bare seconds or a duration literal like 10s)
    #[arg(short = 'r', long)]
    pub report_interval: Option<String>,
    /// Poll interval (bare seconds or a duration literal like 2s)
    #[arg(short = 'p', long)]
    pub poll_interval: Option<String>,
    /// HMAC key for the HashSHA256 request header
    #[arg(short = 'k', long)]
    pub hash_key: Option<String>,
    /// Path to the server's RSA public key (PEM)
    #[arg(short = 's', long)]
    pub crypto_key: Option<String>,
    /// Number of concurrent outbound senders
    #[arg(short = 'l', long)]
    pub rate_limit: Option<usize>,
    /// gRPC endpoint; when set the agent reports over gRPC instead of HTTP
    #[arg(short = 'g', long)]
    pub grpc_address: Option<String>,
    /// Path to a JSON configuration file
    #[arg(short = 'c', long)]
    pub config: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    address: Option<String>,
    report_interval: Option<String>,
    poll_interval: Option<String>,
    crypto_key: Option<String>,
    rate_limit: Option<usize>,
    grpc_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub address: String,
    pub report_interval: Duration,
    pub poll_interval: Duration,
    pub hash_key: Option<String>,
    pub crypto_key: Option<String>,
    pub rate_limit: usize,
    pub grpc_address: Option<String>,
}

pub fn load() -> anyhow::Result<AgentConfig> {
    resolve(Args::parse(), &|name| std::env::var(name).ok())
}

fn resolve(args: Args, env: &dyn Fn(&str) -> Option<String>) -> anyhow::Result<AgentConfig> {
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
    let report_interval = pick("REPORT_INTERVAL", args.report_interval, file.report_interval)
        .unwrap_or_else(|| "10s".to_string());
    let poll_interval = pick("POLL_INTERVAL", args.poll_interval, file.poll_interval)
        .unwrap_or_else(|| "2s".to_string());
    let hash_key = pick("HASH_KEY", args.hash_key, None);
    let crypto_key = pick("CRYPTO_KEY", args.crypto_key, file.crypto_key);
    let grpc_address = pick("GRPC_ADDRESS", args.grpc_address, file.grpc_address);

    let rate_limit = match env("RATE_LIMIT") {
        Some(v) => v.parse::<usize>().context("can't parse RATE_LIMIT")?,
        None => args.rate_limit.or(file.rate_limit).unwrap_or(0),
    };

    Ok(AgentConfig {
        address,
        report_interval: parse_interval(&report_interval).context("report interval")?,
        poll_interval: parse_interval(&poll_interval).context("poll interval")?,
        hash_key,
        crypto_key,
        rate_limit: rate_limit.max(1),
        grpc_address,
    })
}
