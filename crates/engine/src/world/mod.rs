pub mod block;
pub mod chunk;
pub mod position;

use block::{BlockId, Orientation};
use chunk::{Chunk, MutatedBlock};
use dashmap::{DashMap, DashSet};
use position::{BlockPos, ChunkPos};

/// The entire block world. Thread-safe, lock-sharded by chunk.
///
/// Any system may write blocks through `&self`; nothing here announces those
/// writes. Instead each chunk keeps a per-section record of mutated indices,
/// and `mutated` indexes the chunks that currently hold a non-empty record so
/// the block diff collector never has to visit quiet chunks.
pub struct World {
    chunks: DashMap<ChunkPos, Chunk>,
    /// Chunks with at least one pending (undrained) mutation.
    mutated: DashSet<ChunkPos>,
}

impl World {
    pub fn new() -> Self {
        Self {
            chunks: DashMap::new(),
            mutated: DashSet::new(),
        }
    }

    /// Read a block at an absolute position. Returns AIR for unloaded chunks.
    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        match self.chunks.get(&pos.chunk()) {
            Some(chunk) => chunk.get_block(pos.local()),
            None => BlockId::AIR,
        }
    }

    pub fn get_orientation(&self, pos: BlockPos) -> Orientation {
        match self.chunks.get(&pos.chunk()) {
            Some(chunk) => chunk.get_orientation(pos.local()),
            None => Orientation::NONE,
        }
    }

    /// Write a block at an absolute position. Creates the chunk if needed.
    pub fn set_block(&self, pos: BlockPos, block: BlockId) -> bool {
        self.set_block_oriented(pos, block, Orientation::NONE)
    }

    /// Write a block state. Returns `true` if anything changed; the change is
    /// then pending until the containing chunk is drained.
    ///
    /// Takes `&self` (not `&mut self`) because `DashMap` provides interior
    /// mutability via per-shard locking.
    pub fn set_block_oriented(&self, pos: BlockPos, block: BlockId, orientation: Orientation) -> bool {
        let chunk_pos = pos.chunk();
        let changed = self
            .chunks
            .entry(chunk_pos)
            .or_default()
            .set_block_oriented(pos.local(), block, orientation);
        if changed {
            self.mutated.insert(chunk_pos);
        }
        changed
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    /// Insert a chunk without recording its contents as mutations (used for
    /// generation/loading).
    pub fn insert_chunk(&self, pos: ChunkPos, mut chunk: Chunk) {
        chunk.discard_mutations();
        self.chunks.insert(pos, chunk);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Positions of every loaded chunk.
    pub fn chunk_positions(&self) -> Vec<ChunkPos> {
        self.chunks.iter().map(|entry| *entry.key()).collect()
    }

    /// Absolute positions of every loaded block matching `matches`, bottom-up
    /// within each chunk.
    pub fn find_blocks(&self, matches: impl Fn(BlockId) -> bool) -> Vec<BlockPos> {
        let mut found = Vec::new();
        for entry in self.chunks.iter() {
            let origin = entry.key().block_origin(0);
            found.extend(
                entry
                    .find_blocks(&matches)
                    .into_iter()
                    .map(|l| BlockPos::new(origin.x + l.x as i64, l.y, origin.z + l.z as i64)),
            );
        }
        found
    }

    /// Take the set of chunks holding pending mutations. After this returns,
    /// the set is empty.
    ///
    /// Callers must drain the returned chunks *after* this call: a write that
    /// lands between collecting and removing a position loses its mark but is
    /// still picked up by the drain that follows.
    pub fn take_mutated_chunks(&self) -> Vec<ChunkPos> {
        let mut taken = Vec::new();
        for entry in self.mutated.iter() {
            taken.push(*entry);
        }
        for pos in &taken {
            self.mutated.remove(pos);
        }
        taken
    }

    /// Atomically read and clear the mutation record of one chunk. The block
    /// states are read under the same shard lock as the clear, so a
    /// concurrent writer either lands before (and is reported now) or after
    /// (and is reported by the next drain).
    pub fn drain_mutations(&self, pos: ChunkPos) -> Vec<MutatedBlock> {
        match self.chunks.get_mut(&pos) {
            Some(mut chunk) => chunk.drain_mutations(pos),
            None => Vec::new(),
        }
    }

    /// Forget every pending mutation without reporting it. Returns how many
    /// indices were dropped.
    pub fn discard_mutations(&self) -> usize {
        let mut discarded = 0;
        for pos in self.take_mutated_chunks() {
            if let Some(mut chunk) = self.chunks.get_mut(&pos) {
                discarded += chunk.pending_mutations();
                chunk.discard_mutations();
            }
        }
        discarded
    }

    /// Number of chunks currently marked as holding pending mutations.
    pub fn mutated_chunk_count(&self) -> usize {
        self.mutated.len()
    }

    /// Total pending mutated indices across all chunks.
    pub fn pending_mutation_count(&self) -> usize {
        self.chunks.iter().map(|entry| entry.pending_mutations()).sum()
    }

    /// Get a reference to a single chunk by position, if present.
    pub fn get_chunk(&self, pos: &ChunkPos) -> Option<dashmap::mapref::one::Ref<'_, ChunkPos, Chunk>> {
        self.chunks.get(pos)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
