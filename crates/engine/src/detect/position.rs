use crate::config::DEFAULT_MOVE_THRESHOLD;
use crate::entity::{EntityId, Observation, Vec3};
use crate::event::{EventContext, EventKind, ItemMoved, WorldEvent};

use super::{DiffPolicy, TickDiffDetector};

pub type PositionDetector = TickDiffDetector<PositionDiff>;

/// Reports a move once an entity has drifted more than `threshold` blocks
/// from its last reported position.
///
/// Non-finite positions are soft misses: they are never stored, so the
/// tracked value stays the last finite one. Large jumps (teleports) are
/// ordinary moves.
#[derive(Debug, Clone, Copy)]
pub struct PositionDiff {
    threshold_sq: f64,
}

impl PositionDiff {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold_sq: threshold * threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_sq.sqrt()
    }
}

impl Default for PositionDiff {
    fn default() -> Self {
        Self::new(DEFAULT_MOVE_THRESHOLD)
    }
}

impl DiffPolicy for PositionDiff {
    type Value = Vec3;

    const KIND: EventKind = EventKind::Moved;

    fn observe(&self, observation: &Observation) -> Option<Vec3> {
        observation.position.filter(Vec3::is_finite)
    }

    fn differs(&self, old: &Vec3, new: &Vec3) -> bool {
        old.distance_squared(new) > self.threshold_sq
    }

    fn event(&self, id: EntityId, ctx: EventContext, _: &Observation, old: Vec3, new: Vec3) -> WorldEvent {
        ItemMoved { id, ctx, old, new }.into()
    }
}
