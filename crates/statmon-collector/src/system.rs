use std::sync::Mutex;

use statmon_common::types::Metric;
use sysinfo::System;

/// Samples host-level memory and first-core CPU utilization.
///
/// Each probe is best-effort: a figure the platform cannot provide drops its
/// entry from the result instead of failing the sample.
pub struct SystemSampler {
    system: Mutex<System>,
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }

    pub fn memory_metrics(&self) -> Vec<Metric> {
        let mut system = self.system.lock().unwrap();
        let mut metrics = Vec::with_capacity(3);

        system.refresh_memory();
        let total = system.total_memory();
        if total > 0 {
            metrics.push(Metric::gauge("TotalMemory", total as f64));
            metrics.push(Metric::gauge("FreeMemory", system.used_memory() as f64));
        }

        system.refresh_cpu_usage();
        if let Some(cpu) = system.cpus().first() {
            metrics.push(Metric::gauge("CPUutilization1", f64::from(cpu.cpu_usage())));
        }

        metrics
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}
