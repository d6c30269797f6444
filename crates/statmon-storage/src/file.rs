use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::memory::MemoryStore;

/// Persisted image of the memory state: one JSON object with both maps.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

#[derive(Debug)]
struct Inner {
    memory: MemoryStore,
    /// Guards the seek+write+truncate sequence; map locks are taken inside.
    file: Mutex<File>,
}

impl Inner {
    fn save(&self) -> Result<()> {
        let snapshot = Snapshot {
            gauges: self.memory.get_gauge_list()?,
            counters: self.memory.get_counter_list()?,
        };
        let buf = serde_json::to_vec(&snapshot)?;

        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&buf)?;
        // A snapshot smaller than the previous one must not leave a stale tail.
        file.set_len(buf.len() as u64)?;
        file.flush()?;
        Ok(())
    }
}

/// Snapshot-file backend: the memory store plus a periodic save task.
///
/// The task is owned by the store. It starts in [`FileStore::open`] and stops
/// when [`FileStore::close`] fires the cancellation token; `close` then
/// writes one final snapshot.
#[derive(Debug)]
pub struct FileStore {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl FileStore {
    /// Opens (creating if absent) the snapshot file, optionally restores the
    /// previous state, and starts the periodic snapshot task.
    ///
    /// A non-empty file that does not parse as a snapshot fails construction.
    pub fn open(path: &Path, store_interval: Duration, restore: bool) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let memory = MemoryStore::new();
        if restore {
            let mut buf = String::new();
            file.read_to_string(&mut buf)?;
            if !buf.is_empty() {
                let snapshot: Snapshot = serde_json::from_str(&buf)?;
                memory.restore_gauges(snapshot.gauges);
                memory.restore_counters(snapshot.counters);
            }
        }

        let inner = Arc::new(Inner {
            memory,
            file: Mutex::new(file),
        });
        let cancel = CancellationToken::new();

        let task_inner = inner.clone();
        let task_cancel = cancel.clone();
        // tokio panics on a zero interval; a zero config still gets the
        // close-time snapshot.
        let period = if store_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            store_interval
        };
        let task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick.tick().await; // first tick is immediate
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if let Err(e) = task_inner.save() {
                            tracing::error!(error = %e, "snapshot write failed");
                        }
                    }
                    _ = task_cancel.cancelled() => return,
                }
            }
        });

        Ok(Self {
            inner,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        self.inner.memory.update_gauge(name, value)
    }

    pub fn update_gauges(&self, batch: &HashMap<String, f64>) -> Result<()> {
        self.inner.memory.update_gauges(batch)
    }

    pub fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        self.inner.memory.update_counter(name, delta)
    }

    pub fn update_counters(&self, batch: &HashMap<String, i64>) -> Result<()> {
        self.inner.memory.update_counters(batch)
    }

    pub fn get_gauge(&self, name: &str) -> Result<f64> {
        self.inner.memory.get_gauge(name)
    }

    pub fn get_counter(&self, name: &str) -> Result<i64> {
        self.inner.memory.get_counter(name)
    }

    pub fn get_gauge_list(&self) -> Result<HashMap<String, f64>> {
        self.inner.memory.get_gauge_list()
    }

    pub fn get_counter_list(&self) -> Result<HashMap<String, i64>> {
        self.inner.memory.get_counter_list()
    }

    /// Forces a snapshot outside the periodic schedule.
    pub fn save(&self) -> Result<()> {
        self.inner.save()
    }

    pub fn restore_gauges(&self, gauges: HashMap<String, f64>) {
        self.inner.memory.restore_gauges(gauges);
    }

    pub fn restore_counters(&self, counters: HashMap<String, i64>) {
        self.inner.memory.restore_counters(counters);
    }

    /// Stops the snapshot task and writes the final image. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        let task = self.task.lock().unwrap().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.inner.save()
    }
}
