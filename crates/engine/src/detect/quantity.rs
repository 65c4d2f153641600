use crate::entity::{EntityId, Observation};
use crate::event::{EventContext, EventKind, QuantityChanged, WorldEvent};

use super::{DiffPolicy, TickDiffDetector};

pub type QuantityDetector = TickDiffDetector<QuantityDiff>;

/// Stack sizes are integers: any difference is a change.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantityDiff;

impl DiffPolicy for QuantityDiff {
    type Value = u32;

    const KIND: EventKind = EventKind::QuantityChanged;

    fn observe(&self, observation: &Observation) -> Option<u32> {
        observation.quantity
    }

    fn differs(&self, old: &u32, new: &u32) -> bool {
        old != new
    }

    fn event(&self, id: EntityId, ctx: EventContext, observation: &Observation, old: u32, new: u32) -> WorldEvent {
        QuantityChanged {
            id,
            ctx,
            item: observation.item,
            old,
            new,
        }
        .into()
    }
}
