use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, StoreError};

/// In-memory backend: two maps behind two independent locks.
///
/// Gauges and counters are separate namespaces; a writer to one never blocks
/// a reader of the other. List reads clone under the same lock the writers
/// take, so they are a point-in-time view.
#[derive(Debug, Default)]
pub struct MemoryStore {
    gauges: Mutex<HashMap<String, f64>>,
    counters: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_gauge(&self, name: &str, value: f64) -> Result<()> {
        let mut gauges = self.gauges.lock().unwrap();
        gauges.insert(name.to_string(), value);
        Ok(())
    }

    pub fn update_gauges(&self, batch: &HashMap<String, f64>) -> Result<()> {
        let mut gauges = self.gauges.lock().unwrap();
        for (name, value) in batch {
            gauges.insert(name.clone(), *value);
        }
        Ok(())
    }

    pub fn update_counter(&self, name: &str, delta: i64) -> Result<()> {
        let mut counters = self.counters.lock().unwrap();
        *counters.entry(name.to_string()).or_insert(0) += delta;
        Ok(())
    }

    pub fn update_counters(&self, batch: &HashMap<String, i64>) -> Result<()> {
        let mut counters = self.counters.lock().unwrap();
        for (name, delta) in batch {
            *counters.entry(name.clone()).or_insert(0) += delta;
        }
        Ok(())
    }

    pub fn get_gauge(&self, name: &str) -> Result<f64> {
        let gauges = self.gauges.lock().unwrap();
        gauges
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub fn get_counter(&self, name: &str) -> Result<i64> {
        let counters = self.counters.lock().unwrap();
        counters
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub fn get_gauge_list(&self) -> Result<HashMap<String, f64>> {
        Ok(self.gauges.lock().unwrap().clone())
    }

    pub fn get_counter_list(&self) -> Result<HashMap<String, i64>> {
        Ok(self.counters.lock().unwrap().clone())
    }

    /// Wholesale replacement, used by the file backend on restore.
    pub fn restore_gauges(&self, gauges: HashMap<String, f64>) {
        *self.gauges.lock().unwrap() = gauges;
    }

    /// Wholesale replacement, used by the file backend on restore.
    pub fn restore_counters(&self, counters: HashMap<String, i64>) {
        *self.counters.lock().unwrap() = counters;
    }
}
