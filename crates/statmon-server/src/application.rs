use std::collections::HashMap;

use statmon_common::types::{Metric, MetricKind};
use statmon_storage::{Store, StoreError};

/// Domain error kinds the handlers map onto HTTP statuses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => AppError::NotFound(format!("metric {name:?}")),
            other => AppError::Internal(other.into()),
        }
    }
}

/// Validation and dispatch between the transports and the storage backend.
///
/// The application borrows nothing from storage state: it owns the store and
/// every mutation goes through the store's own operations.
pub struct Application {
    store: Store,
}

impl Application {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Applies one metric report. Empty names are a not-found condition on
    /// the update path; an unknown kind or a missing value field is a bad
    /// request.
    pub async fn update_metric(&self, metric: &Metric) -> Result<(), AppError> {
        if metric.id.trim().is_empty() {
            return Err(AppError::NotFound("empty metric name".to_string()));
        }

        match metric.kind.parse::<MetricKind>() {
            Ok(MetricKind::Gauge) => {
                let value = metric
                    .value
                    .ok_or_else(|| AppError::BadRequest("gauge without value".to_string()))?;
                self.store.update_gauge(&metric.id, value).await?;
            }
            Ok(MetricKind::Counter) => {
                let delta = metric
                    .delta
                    .ok_or_else(|| AppError::BadRequest("counter without delta".to_string()))?;
                self.store.update_counter(&metric.id, delta).await?;
            }
            Err(_) => {
                return Err(AppError::BadRequest(format!(
                    "unknown metric type: {}",
                    metric.kind
                )));
            }
        }
        Ok(())
    }

    /// Applies a batch, coalescing per name before dispatch: counter deltas
    /// sum, gauges keep the last value in batch order. Malformed items are
    /// logged and skipped; only storage failure of the aggregate fails the
    /// call. Metrics carrying both fields (one gRPC client does) dispatch on
    /// the declared kind.
    pub async fn update_metrics(&self, batch: &[Metric]) -> Result<(), AppError> {
        let mut gauges: HashMap<String, f64> = HashMap::new();
        let mut counters: HashMap<String, i64> = HashMap::new();

        for metric in batch {
            if metric.id.trim().is_empty() {
                tracing::warn!("skipping metric with empty name");
                continue;
            }
            match metric.kind.parse::<MetricKind>() {
                Ok(MetricKind::Gauge) => match metric.value {
                    Some(value) => {
                        gauges.insert(metric.id.clone(), value);
                    }
                    None => tracing::warn!(id = %metric.id, "skipping gauge without value"),
                },
                Ok(MetricKind::Counter) => match metric.delta {
                    Some(delta) => {
                        *counters.entry(metric.id.clone()).or_insert(0) += delta;
                    }
                    None => tracing::warn!(id = %metric.id, "skipping counter without delta"),
                },
                Err(_) => {
                    tracing::warn!(id = %metric.id, kind = %metric.kind, "skipping unknown metric type");
                }
            }
        }

        if !counters.is_empty() {
            self.store.update_counters(&counters).await?;
        }
        if !gauges.is_empty() {
            self.store.update_gauges(&gauges).await?;
        }
        Ok(())
    }

    /// Reads one metric as its text rendering: shortest round-trip decimal
    /// for gauges, plain integer for counters.
    pub async fn get_metric(&self, name: &str, kind: &str) -> Result<String, AppError> {
        match kind.parse::<MetricKind>() {
            Ok(MetricKind::Gauge) => Ok(self.store.get_gauge(name).await?.to_string()),
            Ok(MetricKind::Counter) => Ok(self.store.get_counter(name).await?.to_string()),
            Err(_) => Err(AppError::BadRequest(format!("unknown metric type: {kind}"))),
        }
    }

    /// Name/value rows for the dashboard: gauges only, sorted by name.
    pub async fn get_metrics(&self) -> Result<Vec<(String, String)>, AppError> {
        let gauges = self.store.get_gauge_list().await?;
        let mut rows: Vec<(String, String)> = gauges
            .into_iter()
            .map(|(name, value)| (name, value.to_string()))
            .collect();
        rows.sort();
        Ok(rows)
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        Ok(self.store.ping().await?)
    }

    pub async fn close(&self) -> Result<(), AppError> {
        Ok(self.store.close().await?)
    }
}
