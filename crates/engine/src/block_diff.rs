//! Turns the world's per-section mutation records into `BlockChanged` events.
//!
//! Must run after every system that writes blocks in the same tick, or those
//! writes are reported a tick late. `WorldHost` enforces this through the
//! schedule's run-after ordering.

use std::sync::Arc;

use rayon::prelude::*;

use crate::event::{BlockChanged, Dispatcher, EventContext, EventKind};
use crate::world::World;
use crate::world::chunk::{ChunkSection, MutatedBlock};
use crate::world::position::{BlockPos, SectionPos};

pub struct BlockDiffCollector {
    dispatcher: Arc<Dispatcher>,
}

impl BlockDiffCollector {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Drain every chunk with pending mutations and dispatch one event per
    /// mutated block. Returns `None` if skipped because nobody listens,
    /// otherwise the number of events dispatched.
    ///
    /// Chunks are drained in parallel; dispatch happens afterwards on the
    /// calling thread with no world lock held, so handlers may read or write
    /// blocks freely. Writes made by handlers are reported next tick.
    pub fn run(&self, ctx: EventContext, world: &World) -> Option<usize> {
        if !self.dispatcher.has_handlers(EventKind::BlockChanged) {
            return None;
        }

        let chunks = world.take_mutated_chunks();
        if chunks.is_empty() {
            return Some(0);
        }

        let drained: Vec<MutatedBlock> = chunks
            .par_iter()
            .flat_map_iter(|pos| world.drain_mutations(*pos))
            .collect();

        for mutated in &drained {
            self.dispatcher.dispatch(
                &BlockChanged {
                    ctx,
                    pos: world_position(mutated.section, mutated.index),
                    block: mutated.block,
                    orientation: mutated.orientation,
                }
                .into(),
            );
        }

        tracing::trace!(
            "Block diff: {} changes across {} chunks",
            drained.len(),
            chunks.len()
        );
        Some(drained.len())
    }
}

/// World coordinates of a section-local index: the section origin plus the
/// unpacked `(x, y, z)` offset.
pub fn world_position(section: SectionPos, index: u16) -> BlockPos {
    let (x, y, z) = ChunkSection::unpack(index);
    section.origin().offset(x as i64, y as i64, z as i64)
}
