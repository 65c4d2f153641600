//! Tick-based diff detection.
//!
//! A detector remembers the last reported value of one component per entity
//! and, once per tick, compares every entity's current value against it. A
//! difference beyond the policy's threshold becomes an event; everything else
//! is silence. The first sighting of an entity only records a baseline.

pub mod position;
pub mod quantity;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::entity::{EntityId, EntitySource, Observation, Vec3};
use crate::event::{Dispatcher, EventContext, EventKind, WorldEvent};

pub use position::{PositionDetector, PositionDiff};
pub use quantity::{QuantityDetector, QuantityDiff};

/// Last recorded value per entity. Shared between a detector (which updates
/// it) and the lifecycle watcher (which seeds and evicts it).
pub type TrackingMap<V> = Arc<DashMap<EntityId, V>>;

/// What a detector compares and how it reports a change.
pub trait DiffPolicy: Send + Sync {
    type Value: Copy + fmt::Debug + Send + Sync + 'static;

    const KIND: EventKind;

    /// Pull the tracked value out of an observation. `None` is a soft miss.
    fn observe(&self, observation: &Observation) -> Option<Self::Value>;

    /// Whether moving from `old` to `new` is worth reporting.
    fn differs(&self, old: &Self::Value, new: &Self::Value) -> bool;

    fn event(
        &self,
        id: EntityId,
        ctx: EventContext,
        observation: &Observation,
        old: Self::Value,
        new: Self::Value,
    ) -> WorldEvent;
}

/// Counters from one detector pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectorTick {
    pub scanned: usize,
    pub baselined: usize,
    pub emitted: usize,
    pub soft_misses: usize,
}

pub struct TickDiffDetector<P: DiffPolicy> {
    policy: P,
    tracked: TrackingMap<P::Value>,
    dispatcher: Arc<Dispatcher>,
}

impl<P: DiffPolicy> TickDiffDetector<P> {
    pub fn new(policy: P, tracked: TrackingMap<P::Value>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            policy,
            tracked,
            dispatcher,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn tracked(&self) -> &TrackingMap<P::Value> {
        &self.tracked
    }

    /// One pass over `source`. Does nothing at all (no scan, no map writes)
    /// while no handler is registered for the policy's kind.
    ///
    /// The tracking map is updated before dispatch, so a handler that reads
    /// it sees the new value.
    pub fn run(&self, ctx: EventContext, source: &dyn EntitySource) -> DetectorTick {
        let mut tick = DetectorTick::default();
        if !self.dispatcher.has_handlers(P::KIND) {
            return tick;
        }

        source.for_each_observation(&mut |observation| {
            tick.scanned += 1;
            let (Some(id), Some(value)) = (observation.id, self.policy.observe(&observation)) else {
                tick.soft_misses += 1;
                tracing::trace!(
                    "{} detector: soft miss for {:?}",
                    P::KIND.name(),
                    observation.id
                );
                return;
            };

            let previous = self.tracked.get(&id).map(|entry| *entry);
            let Some(old) = previous else {
                self.tracked.insert(id, value);
                tick.baselined += 1;
                return;
            };
            if !self.policy.differs(&old, &value) {
                return;
            }

            self.tracked.insert(id, value);
            let event = self.policy.event(id, ctx, &observation, old, value);
            self.dispatcher.dispatch(&event);
            tick.emitted += 1;
        });

        tick
    }
}

/// The tracking maps of one world, bundled so seeding and eviction always
/// touch every map together.
#[derive(Clone, Default)]
pub struct TrackingMaps {
    pub positions: TrackingMap<Vec3>,
    pub quantities: TrackingMap<u32>,
}

/// Values held for an entity at the moment it was evicted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Evicted {
    pub position: Option<Vec3>,
    pub quantity: Option<u32>,
}

impl TrackingMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, id: EntityId, position: Vec3, quantity: u32) {
        self.positions.insert(id, position);
        self.quantities.insert(id, quantity);
    }

    pub fn evict(&self, id: EntityId) -> Evicted {
        Evicted {
            position: self.positions.remove(&id).map(|(_, v)| v),
            quantity: self.quantities.remove(&id).map(|(_, v)| v),
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.positions.contains_key(&id) || self.quantities.contains_key(&id)
    }

    /// Evict every entry whose entity is no longer live. Returns the ids
    /// that were swept.
    pub fn retain_live(&self, source: &dyn EntitySource) -> Vec<EntityId> {
        let mut swept: Vec<EntityId> = Vec::new();
        self.positions.retain(|id, _| {
            let live = source.is_live(*id);
            if !live {
                swept.push(*id);
            }
            live
        });
        self.quantities.retain(|id, _| {
            let live = source.is_live(*id);
            if !live && !swept.contains(id) {
                swept.push(*id);
            }
            live
        });
        swept
    }

    /// Total entries across both maps.
    pub fn len(&self) -> usize {
        self.positions.len() + self.quantities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.positions.clear();
        self.quantities.clear();
    }
}
