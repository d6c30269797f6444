//! Metric persistence behind one capability set.
//!
//! Three backends share the contract: keyed gauge/counter upserts, point
//! reads, full-map reads, ping, close. [`Store`] is a tagged variant rather
//! than a trait object: the backend is selected once at startup and enum
//! dispatch keeps the async methods free of boxed futures.

pub mod db;
pub mod error;
pub mod file;
pub mod memory;


use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub use db::DbStore;
pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Backend selection, resolved from server configuration.
///
/// Priority: a database DSN wins over a snapshot path, which wins over plain
/// memory.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub database_dsn: Option<String>,
    pub file_path: Option<String>,
    pub store_interval: Duration,
    pub restore: bool,
}

pub enum Store {
    Memory(MemoryStore),
    File(FileStore),
    Db(DbStore),
}

impl Store {
    /// Opens the backend the configuration selects.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(dsn) = config.database_dsn.as_deref().filter(|s| !s.is_empty()) {
            let store = DbStore::connect(dsn).await?;
            tracing::info!("database store ready");
            return Ok(Store::Db(store));
        }
        if let Some(path) = config.file_path.as_deref().filter(|s| !s.is_empty()) {
            let store = FileStore::open(Path::new(path), config.store_interval, config.restore)?;
            tracing::info!(path, "file snapshot store ready");
            return Ok(Store::File(store));
        }
        tracing::info!("in-memory store ready");
        Ok(Store::Memory(MemoryStore::new()))
    }

    pub async fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        match self {
            Store::Memory(s) => s.update_gauge(name, value),
            Store::File(s) => s.update_gauge(name, value),
            Store::Db(s) => s.update_gauge(name, value).await,
        }
    }

    pub async fn update_gauges(&self, batch: &HashMap<String, f64>) -> Result<()> {
        match self {
            Store::Memory(s) => s.update_gauges(batch),
            Store::File(s) => s.update_gauges(batch),
            Store::Db(s) => s.update_gauges(batch).await,
        }
    }

    pub async fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        match self {
            Store::Memory(s) => s.update_counter(name, delta),
            Store::File(s) => s.update_counter(name, delta),
            Store::Db(s) => s.update_counter(name, delta).await,
        }
    }

    pub async fn update_counters(&self, batch: &HashMap<String, i64>) -> Result<()> {
        match self {
            Store::Memory(s) => s.update_counters(batch),
            Store::File(s) => s.update_counters(batch),
            Store::Db(s) => s.update_counters(batch).await,
        }
    }

    pub async fn get_gauge(&self, name: &str) -> Result<f64> {
        match self {
            Store::Memory(s) => s.get_gauge(name),
            Store::File(s) => s.get_gauge(name),
            Store::Db(s) => s.get_gauge(name).await,
        }
    }

    pub async fn get_counter(&self, name: &str) -> Result<i64> {
        match self {
            Store::Memory(s) => s.get_counter(name),
            Store::File(s) => s.get_counter(name),
            Store::Db(s) => s.get_counter(name).await,
        }
    }

    pub async fn get_gauge_list(&self) -> Result<HashMap<String, f64>> {
        match self {
            Store::Memory(s) => s.get_gauge_list(),
            Store::File(s) => s.get_gauge_list(),
            Store::Db(s) => s.get_gauge_list().await,
        }
    }

    pub async fn get_counter_list(&self) -> Result<HashMap<String, i64>> {
        match self {
            Store::Memory(s) => s.get_counter_list(),
            Store::File(s) => s.get_counter_list(),
            Store::Db(s) => s.get_counter_list().await,
        }
    }

    /// Liveness: a no-op for memory and file, a pool round trip for db.
    pub async fn ping(&self) -> Result<()> {
        match self {
            Store::Memory(_) | Store::File(_) => Ok(()),
            Store::Db(s) => s.ping().await,
        }
    }

    /// Releases backend resources. Memory: no-op. File: stops the snapshot
    /// task and writes the final image. Db: drains the pool.
    pub async fn close(&self) -> Result<()> {
        match self {
            Store::Memory(_) => Ok(()),
            Store::File(s) => s.close().await,
            Store::Db(s) => s.close().await,
        }
    }
}
