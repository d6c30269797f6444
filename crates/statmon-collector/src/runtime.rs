use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use statmon_common::types::Metric;
use sysinfo::{get_current_pid, Pid, ProcessesToUpdate, System};

use crate::system::SystemSampler;
use crate::Collector;

/// Point-in-time view of the process allocator, in bytes unless noted.
///
/// The shape mirrors the fixed gauge list the server expects; fields with no
/// analogue on this platform stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuntimeSnapshot {
    /// Bytes of live heap memory.
    pub alloc: f64,
    /// Cumulative bytes allocated over the process lifetime.
    pub total_alloc: f64,
    /// Total bytes obtained from the OS.
    pub sys: f64,
    pub heap_alloc: f64,
    pub heap_sys: f64,
    pub heap_idle: f64,
    pub heap_inuse: f64,
    pub heap_released: f64,
    pub heap_objects: f64,
    pub stack_inuse: f64,
    pub stack_sys: f64,
    pub mspan_inuse: f64,
    pub mspan_sys: f64,
    pub mcache_inuse: f64,
    pub mcache_sys: f64,
    pub buck_hash_sys: f64,
    pub gc_sys: f64,
    pub other_sys: f64,
    pub next_gc: f64,
    pub last_gc: f64,
    pub pause_total_ns: f64,
    pub num_gc: f64,
    pub num_forced_gc: f64,
    /// Fraction of CPU time spent in collection, [0, 1].
    pub gc_cpu_fraction: f64,
    pub mallocs: f64,
    pub frees: f64,
    pub lookups: f64,
}

/// Source of [`RuntimeSnapshot`]s. The default reads the live process; tests
/// substitute [`FixedSource`].
pub trait RuntimeSource: Send + Sync {
    fn snapshot(&self) -> RuntimeSnapshot;
}

/// Process-backed source. Resident-set and virtual-size figures stand in for
/// the heap accounting; allocator internals that sysinfo cannot see report 0.
pub struct SysinfoSource {
    pid: Pid,
    system: Mutex<System>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let pid = get_current_pid().unwrap_or_else(|_| Pid::from_u32(0));
        Self {
            pid,
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeSource for SysinfoSource {
    fn snapshot(&self) -> RuntimeSnapshot {
        let mut system = self.system.lock().unwrap();
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);

        let Some(process) = system.process(self.pid) else {
            tracing::warn!(pid = %self.pid, "own process not visible, reporting zero snapshot");
            return RuntimeSnapshot::default();
        };

        let resident = process.memory() as f64;
        let virt = process.virtual_memory() as f64;

        RuntimeSnapshot {
            alloc: resident,
            heap_alloc: resident,
            heap_inuse: resident,
            heap_idle: (virt - resident).max(0.0),
            sys: virt,
            heap_sys: virt,
            ..RuntimeSnapshot::default()
        }
    }
}

/// Deterministic source for tests.
pub struct FixedSource(pub RuntimeSnapshot);

impl RuntimeSource for FixedSource {
    fn snapshot(&self) -> RuntimeSnapshot {
        self.0
    }
}

/// Production collector: a runtime source, the system sampler, and the poll
/// counter shared by both report paths.
pub struct StandardCollector {
    source: Box<dyn RuntimeSource>,
    sampler: SystemSampler,
    poll_count: AtomicI64,
}

impl StandardCollector {
    pub fn new() -> Self {
        Self::with_source(Box::new(SysinfoSource::new()))
    }

    pub fn with_source(source: Box<dyn RuntimeSource>) -> Self {
        Self {
            source,
            sampler: SystemSampler::new(),
            poll_count: AtomicI64::new(0),
        }
    }
}

impl Default for StandardCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for StandardCollector {
    fn collect_metrics(&self) -> Vec<Metric> {
        let poll_count = self.poll_count.fetch_add(1, Ordering::SeqCst) + 1;
        let s = self.source.snapshot();

        vec![
            Metric::gauge("Alloc", s.alloc),
            Metric::gauge("BuckHashSys", s.buck_hash_sys),
            Metric::gauge("Frees", s.frees),
            Metric::gauge("GCCPUFraction", s.gc_cpu_fraction),
            Metric::gauge("HeapAlloc", s.heap_alloc),
            Metric::gauge("HeapIdle", s.heap_idle),
            Metric::gauge("HeapInuse", s.heap_inuse),
            Metric::gauge("HeapObjects", s.heap_objects),
            Metric::gauge("HeapReleased", s.heap_released),
            Metric::gauge("HeapSys", s.heap_sys),
            Metric::gauge("LastGC", s.last_gc),
            Metric::gauge("Lookups", s.lookups),
            Metric::gauge("Mallocs", s.mallocs),
            Metric::gauge("MCacheInuse", s.mcache_inuse),
            Metric::gauge("MCacheSys", s.mcache_sys),
            Metric::gauge("MSpanInuse", s.mspan_inuse),
            Metric::gauge("MSpanSys", s.mspan_sys),
            Metric::gauge("NextGC", s.next_gc),
            Metric::gauge("NumGC", s.num_gc),
            Metric::gauge("PauseTotalNs", s.pause_total_ns),
            Metric::gauge("StackInuse", s.stack_inuse),
            Metric::gauge("StackSys", s.stack_sys),
            Metric::gauge("Sys", s.sys),
            Metric::gauge("TotalAlloc", s.total_alloc),
            Metric::counter("PollCount", poll_count),
            Metric::gauge("RandomValue", rand::random::<f64>()),
            Metric::gauge("GCSys", s.gc_sys),
            Metric::gauge("NumForcedGC", s.num_forced_gc),
            Metric::gauge("OtherSys", s.other_sys),
        ]
    }

    fn collect_memory_metrics(&self) -> Vec<Metric> {
        self.sampler.memory_metrics()
    }

    fn reset_counters(&self) {
        self.poll_count.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_collector() -> StandardCollector {
        StandardCollector::with_source(Box::new(FixedSource(RuntimeSnapshot {
            alloc: 1024.0,
            sys: 4096.0,
            ..RuntimeSnapshot::default()
        })))
    }

    #[test]
    fn batch_has_fixed_shape() {
        let collector = fixed_collector();
        let batch = collector.collect_metrics();
        assert_eq!(batch.len(), 29);

        let gauges = batch.iter().filter(|m| m.kind == "gauge").count();
        let counters = batch.iter().filter(|m| m.kind == "counter").count();
        assert_eq!(gauges, 28);
        assert_eq!(counters, 1);

        let alloc = batch.iter().find(|m| m.id == "Alloc").unwrap();
        assert_eq!(alloc.value, Some(1024.0));
        assert!(batch.iter().any(|m| m.id == "RandomValue"));
    }

    #[test]
    fn poll_count_increments_and_resets() {
        let collector = fixed_collector();

        let poll_count = |batch: &[Metric]| {
            batch
                .iter()
                .find(|m| m.id == "PollCount")
                .and_then(|m| m.delta)
                .unwrap()
        };

        assert_eq!(poll_count(&collector.collect_metrics()), 1);
        assert_eq!(poll_count(&collector.collect_metrics()), 2);
        assert_eq!(poll_count(&collector.collect_metrics()), 3);

        collector.reset_counters();
        assert_eq!(poll_count(&collector.collect_metrics()), 1);
    }

    #[test]
    fn random_value_stays_in_unit_interval() {
        let collector = fixed_collector();
        for _ in 0..16 {
            let batch = collector.collect_metrics();
            let rv = batch
                .iter()
                .find(|m| m.id == "RandomValue")
                .and_then(|m| m.value)
                .unwrap();
            assert!((0.0..1.0).contains(&rv));
        }
    }
}
