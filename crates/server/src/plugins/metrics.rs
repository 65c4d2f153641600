//! Lock-free event and tick counters.
//!
//! Handlers and the tick loop update these via atomic operations, with no
//! locks or allocations on the hot path. The metrics task reads them at its
//! own pace and logs a JSON snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Instant;

use serde::Serialize;
use tickwatch_engine::event::{Listener, RemoveReason};
use tickwatch_engine::{TickReport, WorldHost};

use super::Plugin;

/// Atomic counters for one world.
pub struct EventMetrics {
    world: String,

    // Monotonic event counters
    added: AtomicU64,
    removed: AtomicU64,
    merged: AtomicU64,
    moved: AtomicU64,
    quantity_changed: AtomicU64,
    blocks_changed: AtomicU64,

    // Ticks
    ticks: AtomicU64,
    tick_ns_sum: AtomicU64,
    soft_misses: AtomicU64,
    swept: AtomicU64,

    // Tick duration histogram buckets
    hist_under_100us: AtomicU64,
    hist_100us_1ms: AtomicU64,
    hist_1_10ms: AtomicU64,
    hist_10_50ms: AtomicU64,
    hist_over_50ms: AtomicU64,

    started_at: Instant,
}

impl EventMetrics {
    pub fn new(world: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            added: AtomicU64::new(0),
            removed: AtomicU64::new(0),
            merged: AtomicU64::new(0),
            moved: AtomicU64::new(0),
            quantity_changed: AtomicU64::new(0),
            blocks_changed: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            tick_ns_sum: AtomicU64::new(0),
            soft_misses: AtomicU64::new(0),
            swept: AtomicU64::new(0),
            hist_under_100us: AtomicU64::new(0),
            hist_100us_1ms: AtomicU64::new(0),
            hist_1_10ms: AtomicU64::new(0),
            hist_10_50ms: AtomicU64::new(0),
            hist_over_50ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Called by the tick loop after every tick.
    pub fn record_tick(&self, report: &TickReport) {
        self.ticks.fetch_add(1, Relaxed);
        self.tick_ns_sum
            .fetch_add(report.duration.as_nanos() as u64, Relaxed);
        self.soft_misses.fetch_add(report.soft_misses as u64, Relaxed);
        self.swept.fetch_add(report.swept as u64, Relaxed);

        let bucket = match report.duration.as_micros() {
            0..=99 => &self.hist_under_100us,
            100..=999 => &self.hist_100us_1ms,
            1_000..=9_999 => &self.hist_1_10ms,
            10_000..=49_999 => &self.hist_10_50ms,
            _ => &self.hist_over_50ms,
        };
        bucket.fetch_add(1, Relaxed);
    }

    /// Read all counters into a serializable snapshot, folding in the
    /// dispatcher's own delivery counters.
    pub fn snapshot(&self, host: &WorldHost) -> MetricsSnapshot {
        let dispatch = host.dispatcher().stats();
        MetricsSnapshot {
            world: self.world.clone(),
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            added: self.added.load(Relaxed),
            removed: self.removed.load(Relaxed),
            merged: self.merged.load(Relaxed),
            moved: self.moved.load(Relaxed),
            quantity_changed: self.quantity_changed.load(Relaxed),
            blocks_changed: self.blocks_changed.load(Relaxed),
            ticks: self.ticks.load(Relaxed),
            tick_ns_sum: self.tick_ns_sum.load(Relaxed),
            soft_misses: self.soft_misses.load(Relaxed),
            swept: self.swept.load(Relaxed),
            live_items: host.entities().len() as u64,
            tracked_items: host.tracking().len() as u64,
            handler_invocations: dispatch.invocations,
            handler_faults: dispatch.faults,
            hist: [
                self.hist_under_100us.load(Relaxed),
                self.hist_100us_1ms.load(Relaxed),
                self.hist_1_10ms.load(Relaxed),
                self.hist_10_50ms.load(Relaxed),
                self.hist_over_50ms.load(Relaxed),
            ],
        }
    }

    pub fn log_snapshot(&self, host: &WorldHost) {
        match serde_json::to_string(&self.snapshot(host)) {
            Ok(json) => tracing::info!("metrics {}", json),
            Err(e) => tracing::warn!("Failed to serialize metrics for '{}': {}", self.world, e),
        }
    }
}

impl Plugin for EventMetrics {
    fn name(&self) -> &'static str {
        "event-metrics"
    }

    fn listener(self: Arc<Self>, _host: &WorldHost) -> Listener {
        let (a, r, m, q, b) = (
            Arc::clone(&self),
            Arc::clone(&self),
            Arc::clone(&self),
            Arc::clone(&self),
            self,
        );
        Listener::named("event-metrics")
            .on_added(move |_| {
                a.added.fetch_add(1, Relaxed);
            })
            .on_removed(move |e| {
                r.removed.fetch_add(1, Relaxed);
                if e.reason == RemoveReason::Merged {
                    r.merged.fetch_add(1, Relaxed);
                }
            })
            .on_moved(move |_| {
                m.moved.fetch_add(1, Relaxed);
            })
            .on_quantity_changed(move |_| {
                q.quantity_changed.fetch_add(1, Relaxed);
            })
            .on_block_changed(move |_| {
                b.blocks_changed.fetch_add(1, Relaxed);
            })
    }
}

/// Serializable snapshot of one world's metrics at a point in time.
/// Rates are computed by diffing consecutive snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub world: String,
    pub uptime_secs: f64,
    pub added: u64,
    pub removed: u64,
    pub merged: u64,
    pub moved: u64,
    pub quantity_changed: u64,
    pub blocks_changed: u64,
    pub ticks: u64,
    pub tick_ns_sum: u64,
    pub soft_misses: u64,
    pub swept: u64,
    pub live_items: u64,
    pub tracked_items: u64,
    pub handler_invocations: u64,
    pub handler_faults: u64,
    /// `[<100μs, 100μs-1ms, 1-10ms, 10-50ms, >50ms]`
    pub hist: [u64; 5],
}
