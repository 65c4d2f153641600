//! Lock-free dispatch counters.
//!
//! Updated from the tick thread with relaxed `fetch_add`s; read by whoever
//! wants a snapshot (metrics plugins, tests) at their own pace.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use super::EventKind;

pub struct DispatchStats {
    dispatches: [AtomicU64; 5],
    invocations: AtomicU64,
    faults: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self {
            dispatches: Default::default(),
            invocations: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }

    pub(crate) fn record(&self, kind: EventKind, invoked: u64, faulted: u64) {
        self.dispatches[kind.index()].fetch_add(1, Relaxed);
        self.invocations.fetch_add(invoked, Relaxed);
        self.faults.fetch_add(faulted, Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            dispatches: std::array::from_fn(|i| self.dispatches[i].load(Relaxed)),
            invocations: self.invocations.load(Relaxed),
            faults: self.faults.load(Relaxed),
        }
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStatsSnapshot {
    /// Dispatch calls per kind, indexed by [`EventKind::index`].
    pub dispatches: [u64; 5],
    /// Handler invocations attempted, faulted ones included.
    pub invocations: u64,
    pub faults: u64,
}

impl DispatchStatsSnapshot {
    pub fn dispatches_of(&self, kind: EventKind) -> u64 {
        self.dispatches[kind.index()]
    }

    pub fn total_dispatches(&self) -> u64 {
        self.dispatches.iter().sum()
    }
}
