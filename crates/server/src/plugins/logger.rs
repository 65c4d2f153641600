use std::sync::Arc;

use tickwatch_engine::WorldHost;
use tickwatch_engine::event::Listener;

use super::Plugin;

/// Logs every event at DEBUG, tagged with the world's configured name.
pub struct EventLogger {
    world: String,
}

impl EventLogger {
    pub fn new(world: impl Into<String>) -> Self {
        Self { world: world.into() }
    }
}

impl Plugin for EventLogger {
    fn name(&self) -> &'static str {
        "event-logger"
    }

    fn listener(self: Arc<Self>, _host: &WorldHost) -> Listener {
        let (a, r, m, q, b) = (
            Arc::clone(&self),
            Arc::clone(&self),
            Arc::clone(&self),
            Arc::clone(&self),
            self,
        );
        Listener::named("event-logger")
            .on_added(move |e| {
                tracing::debug!(
                    "[{}] tick {}: item {:?} added ({:?}) at {:?}: {} x {:?}",
                    a.world, e.ctx.tick, e.id, e.reason, e.position, e.stack.quantity, e.stack.item
                )
            })
            .on_removed(move |e| {
                tracing::debug!(
                    "[{}] tick {}: item {:?} removed ({:?}), last seen at {:?}",
                    r.world, e.ctx.tick, e.id, e.reason, e.position
                )
            })
            .on_moved(move |e| {
                tracing::debug!(
                    "[{}] tick {}: item {:?} moved {:?} -> {:?}",
                    m.world, e.ctx.tick, e.id, e.old, e.new
                )
            })
            .on_quantity_changed(move |e| {
                tracing::debug!(
                    "[{}] tick {}: item {:?} quantity {} -> {}",
                    q.world, e.ctx.tick, e.id, e.old, e.new
                )
            })
            .on_block_changed(move |e| {
                tracing::debug!(
                    "[{}] tick {}: block at {:?} is now {:?} ({:?})",
                    b.world, e.ctx.tick, e.pos, e.block, e.orientation
                )
            })
    }
}
