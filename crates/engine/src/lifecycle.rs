//! Entity add/remove handling.
//!
//! The host calls into the watcher synchronously from its own add and remove
//! callbacks. Seeding the tracking maps at add time is what guarantees an
//! entity's `Added` precedes any `Moved`/`QuantityChanged`: the first
//! detector pass after the add finds a baseline, not a change.

use std::sync::Arc;

use crate::detect::TrackingMaps;
use crate::entity::{EntityId, ItemSnapshot};
use crate::event::{
    AddReason, Dispatcher, EventContext, EventKind, ItemAdded, ItemRemoved, RemoveReason,
};

pub struct LifecycleWatcher {
    tracking: TrackingMaps,
    dispatcher: Arc<Dispatcher>,
}

impl LifecycleWatcher {
    pub fn new(tracking: TrackingMaps, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            tracking,
            dispatcher,
        }
    }

    /// Seed tracking state and announce the entity.
    ///
    /// Without an identity, a position and a stack there is nothing to seed;
    /// the call is a no-op and the first detector pass establishes the
    /// baseline instead. Returns whether the entity was seeded.
    pub fn on_added(
        &self,
        ctx: EventContext,
        id: Option<EntityId>,
        snapshot: &ItemSnapshot,
        reason: AddReason,
    ) -> bool {
        let (Some(id), Some(position), Some(stack)) = (id, snapshot.position, snapshot.stack) else {
            tracing::trace!("Add callback for {:?} lacks identity or components, deferring", id);
            return false;
        };

        self.tracking.seed(id, position, stack.quantity);

        if self.dispatcher.has_handlers(EventKind::Added) {
            self.dispatcher.dispatch(
                &ItemAdded {
                    id,
                    ctx,
                    position,
                    stack,
                    reason,
                }
                .into(),
            );
        }
        true
    }

    /// Evict every tracking entry for `id`, then announce the removal.
    ///
    /// Eviction happens first and unconditionally. Fields the host could no
    /// longer provide are left empty, except a missing position, which falls
    /// back to the last tracked one.
    pub fn on_removed(
        &self,
        ctx: EventContext,
        id: EntityId,
        last_known: &ItemSnapshot,
        reason: RemoveReason,
    ) {
        let evicted = self.tracking.evict(id);

        if !self.dispatcher.has_handlers(EventKind::Removed) {
            return;
        }

        self.dispatcher.dispatch(
            &ItemRemoved {
                id,
                ctx,
                position: last_known.position.or(evicted.position),
                stack: last_known.stack,
                reason,
            }
            .into(),
        );
    }

    pub fn tracking(&self) -> &TrackingMaps {
        &self.tracking
    }
}
