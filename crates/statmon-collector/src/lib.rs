//! Metric sampling for the agent.
//!
//! Two independent sources feed the pipeline: the process runtime snapshot
//! (fixed 29-entry shape, every poll tick) and the slower system-memory
//! sampler. Both sit behind the [`Collector`] trait so the pipeline can be
//! tested against a deterministic double.

pub mod runtime;
pub mod system;

use statmon_common::types::Metric;

pub use runtime::{FixedSource, RuntimeSnapshot, RuntimeSource, StandardCollector, SysinfoSource};

/// Sampling capability consumed by the agent pipeline.
///
/// Methods take `&self`: one collector instance is shared between the poll
/// loop and the memory-sampler loop, so implementations use interior
/// mutability for any refresh state they keep.
pub trait Collector: Send + Sync {
    /// Returns the fixed-shape runtime batch: 27 allocator gauges plus the
    /// `RandomValue` gauge and the `PollCount` counter, which is incremented
    /// by one on every call.
    fn collect_metrics(&self) -> Vec<Metric>;

    /// Returns up to three system entries (`TotalMemory`, `FreeMemory`,
    /// `CPUutilization1`). A failed probe drops its entry, never the call.
    fn collect_memory_metrics(&self) -> Vec<Metric>;

    /// Zeroes `PollCount`. Called by the pipeline after each report tick.
    fn reset_counters(&self);
}
