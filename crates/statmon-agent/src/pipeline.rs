use std::sync::{Arc, Mutex};
use std::time::Duration;

use statmon_collector::Collector;
use statmon_common::types::Metric;
use tokio_util::sync::CancellationToken;

use crate::transport::Client;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub poll_interval: Duration,
    pub report_interval: Duration,
    /// Worker count and queue capacity. Zero behaves as one.
    pub rate_limit: usize,
}

/// The agent's sampling/reporting loop.
///
/// Two tickers drive it: every poll tick overwrites the current runtime
/// batch (a parallel loop refreshes the memory batch on the same cadence),
/// and every report tick enqueues the combined snapshot for the worker pool.
/// The queue is bounded by the rate limit, so at most `rate_limit` sends are
/// ever in flight and the producer stalls rather than buffering unboundedly.
pub struct Pipeline<C: Client> {
    client: Arc<C>,
    collector: Arc<dyn Collector>,
    ip_address: String,
    memory_batch: Arc<Mutex<Vec<Metric>>>,
}

impl<C: Client> Pipeline<C> {
    pub fn new(client: Arc<C>, collector: Arc<dyn Collector>, ip_address: impl Into<String>) -> Self {
        Self {
            client,
            collector,
            ip_address: ip_address.into(),
            memory_batch: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Runs until `cancel` fires, then flushes the current batch best-effort
    /// and joins every worker.
    pub async fn run(self, config: PipelineConfig, cancel: CancellationToken) {
        let rate_limit = config.rate_limit.max(1);
        let (batch_tx, batch_rx) = flume::bounded::<Vec<Metric>>(rate_limit);

        let mut workers = Vec::with_capacity(rate_limit);
        for id in 0..rate_limit {
            let rx = batch_rx.clone();
            let client = self.client.clone();
            let ip = self.ip_address.clone();
            let worker_cancel = cancel.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        // Queued batches drain before cancellation is observed.
                        biased;
                        batch = rx.recv_async() => {
                            let Ok(batch) = batch else { return };
                            if let Err(e) = client.send_metrics(batch, &ip).await {
                                tracing::error!(worker = id, error = %e, "can't send metrics");
                            }
                        }
                        _ = worker_cancel.cancelled() => return,
                    }
                }
            }));
        }
        drop(batch_rx);

        let sampler_collector = self.collector.clone();
        let sampler_batch = self.memory_batch.clone();
        let sampler_cancel = cancel.clone();
        let sampler_interval = config.poll_interval;
        let sampler = tokio::spawn(async move {
            let mut poll = tokio::time::interval(sampler_interval);
            poll.tick().await;
            loop {
                tokio::select! {
                    _ = poll.tick() => {
                        let metrics = sampler_collector.collect_memory_metrics();
                        *sampler_batch.lock().unwrap() = metrics;
                    }
                    _ = sampler_cancel.cancelled() => return,
                }
            }
        });

        let mut poll = tokio::time::interval(config.poll_interval);
        let mut report = tokio::time::interval(config.report_interval);
        poll.tick().await;
        report.tick().await;

        let mut current: Vec<Metric> = Vec::new();
        loop {
            tokio::select! {
                // When poll and report land on the same instant, poll wins:
                // the report reads this tick's snapshot.
                biased;
                _ = cancel.cancelled() => break,
                _ = poll.tick() => {
                    current = self.collector.collect_metrics();
                }
                _ = report.tick() => {
                    let batch = self.combined(&current);
                    if batch_tx.send_async(batch).await.is_err() {
                        break;
                    }
                    self.collector.reset_counters();
                }
            }
        }

        // Best-effort final flush; a full queue drops it rather than blocking
        // shutdown.
        let _ = batch_tx.try_send(self.combined(&current));
        drop(batch_tx);

        for worker in workers {
            let _ = worker.await;
        }
        let _ = sampler.await;
        tracing::info!("pipeline drained");
    }

    fn combined(&self, current: &[Metric]) -> Vec<Metric> {
        let mut batch = current.to_vec();
        let memory = self.memory_batch.lock().unwrap();
        if !memory.is_empty() {
            batch.extend(memory.iter().cloned());
        }
        batch
    }
}
