use super::block::{BlockId, Orientation};
use super::position::{ChunkPos, LocalBlockPos, SectionPos};
use std::collections::{HashMap, HashSet};

/// Number of blocks along each axis of a chunk section.
pub const SECTION_SIZE: usize = 16;
/// Total block count in one section.
pub const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;

/// A 16x16x16 cube of blocks.
///
/// Stored as flat arrays in XZY order for cache-friendly vertical scans
/// (gravity, lighting). A section that is entirely air is never allocated
/// (see `Chunk`).
#[derive(Clone)]
pub struct ChunkSection {
    blocks: Box<[BlockId; SECTION_VOLUME]>,
    orientations: Box<[Orientation; SECTION_VOLUME]>,
}

impl ChunkSection {
    pub fn new_filled(block: BlockId) -> Self {
        Self {
            blocks: Box::new([block; SECTION_VOLUME]),
            orientations: Box::new([Orientation::NONE; SECTION_VOLUME]),
        }
    }

    pub fn new_empty() -> Self {
        Self::new_filled(BlockId::AIR)
    }

    /// Pack section-local coordinates into a flat index: `y * 256 + z * 16 + x`.
    #[inline]
    pub const fn index(x: u8, y: u8, z: u8) -> usize {
        (y as usize) * SECTION_SIZE * SECTION_SIZE + (z as usize) * SECTION_SIZE + (x as usize)
    }

    /// Inverse of [`ChunkSection::index`]: returns `(x, y, z)`.
    #[inline]
    pub const fn unpack(index: u16) -> (u8, u8, u8) {
        let i = index as usize;
        (
            (i % SECTION_SIZE) as u8,
            (i / (SECTION_SIZE * SECTION_SIZE)) as u8,
            ((i / SECTION_SIZE) % SECTION_SIZE) as u8,
        )
    }

    #[inline]
    pub fn get(&self, x: u8, y: u8, z: u8) -> BlockId {
        self.blocks[Self::index(x, y, z)]
    }

    #[inline]
    pub fn orientation(&self, x: u8, y: u8, z: u8) -> Orientation {
        self.orientations[Self::index(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: u8, y: u8, z: u8, block: BlockId, orientation: Orientation) {
        let i = Self::index(x, y, z);
        self.blocks[i] = block;
        self.orientations[i] = orientation;
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| *b == BlockId::AIR)
    }
}

/// One drained entry of a chunk's mutation record: a section-local index plus
/// the block state found there at drain time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutatedBlock {
    pub section: SectionPos,
    pub index: u16,
    pub block: BlockId,
    pub orientation: Orientation,
}

/// A column of chunk sections, keyed by section index (y >> 4).
///
/// Only non-empty sections are stored (sparse). Writes record the
/// section-local index of every block whose state actually changed; the
/// record is kept beside the sections so that it survives a section being
/// deallocated when it turns to all-air.
pub struct Chunk {
    sections: HashMap<i32, ChunkSection>,
    mutated: HashMap<i32, HashSet<u16>>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            sections: HashMap::new(),
            mutated: HashMap::new(),
        }
    }

    pub fn get_block(&self, pos: LocalBlockPos) -> BlockId {
        match self.sections.get(&pos.section_index()) {
            Some(section) => section.get(pos.x, pos.section_local_y(), pos.z),
            None => BlockId::AIR,
        }
    }

    pub fn get_orientation(&self, pos: LocalBlockPos) -> Orientation {
        match self.sections.get(&pos.section_index()) {
            Some(section) => section.orientation(pos.x, pos.section_local_y(), pos.z),
            None => Orientation::NONE,
        }
    }

    /// Set a block with no orientation. See [`Chunk::set_block_oriented`].
    pub fn set_block(&mut self, pos: LocalBlockPos, block: BlockId) -> bool {
        self.set_block_oriented(pos, block, Orientation::NONE)
    }

    /// Write a block state. Returns `true` if the stored state changed, in
    /// which case the index is added to the section's mutation record.
    ///
    /// Air never carries an orientation.
    pub fn set_block_oriented(
        &mut self,
        pos: LocalBlockPos,
        block: BlockId,
        orientation: Orientation,
    ) -> bool {
        let orientation = if block == BlockId::AIR {
            Orientation::NONE
        } else {
            orientation
        };
        if self.get_block(pos) == block && self.get_orientation(pos) == orientation {
            return false;
        }

        let section_idx = pos.section_index();
        let y = pos.section_local_y();

        if block == BlockId::AIR {
            if let Some(section) = self.sections.get_mut(&section_idx) {
                section.set(pos.x, y, pos.z, block, orientation);
                if section.is_empty() {
                    self.sections.remove(&section_idx);
                }
            }
        } else {
            let section = self
                .sections
                .entry(section_idx)
                .or_insert_with(ChunkSection::new_empty);
            section.set(pos.x, y, pos.z, block, orientation);
        }

        self.mutated
            .entry(section_idx)
            .or_default()
            .insert(ChunkSection::index(pos.x, y, pos.z) as u16);
        true
    }

    /// Read and clear every section's mutation record, pairing each index
    /// with the block state currently stored there.
    pub fn drain_mutations(&mut self, chunk: ChunkPos) -> Vec<MutatedBlock> {
        let mut out = Vec::new();
        for (section_y, indices) in self.mutated.drain() {
            let section = self.sections.get(&section_y);
            for index in indices {
                let (x, y, z) = ChunkSection::unpack(index);
                let (block, orientation) = match section {
                    Some(s) => (s.get(x, y, z), s.orientation(x, y, z)),
                    None => (BlockId::AIR, Orientation::NONE),
                };
                out.push(MutatedBlock {
                    section: chunk.section(section_y),
                    index,
                    block,
                    orientation,
                });
            }
        }
        out
    }

    /// Forget pending mutations without reporting them (generation/loading).
    pub fn discard_mutations(&mut self) {
        self.mutated.clear();
    }

    pub fn pending_mutations(&self) -> usize {
        self.mutated.values().map(HashSet::len).sum()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Every block in allocated sections for which `matches` holds, sorted
    /// bottom-up.
    pub fn find_blocks(&self, matches: impl Fn(BlockId) -> bool) -> Vec<LocalBlockPos> {
        let mut found = Vec::new();
        for (&section_y, section) in &self.sections {
            if section.is_empty() {
                continue;
            }
            for index in 0..SECTION_VOLUME as u16 {
                let (x, y, z) = ChunkSection::unpack(index);
                if matches(section.get(x, y, z)) {
                    found.push(LocalBlockPos {
                        x,
                        y: ((section_y as i64) << 4) + y as i64,
                        z,
                    });
                }
            }
        }
        found.sort_by_key(|p| (p.y, p.x, p.z));
        found
    }

    /// Section indices currently allocated, in no particular order.
    pub fn section_indices(&self) -> impl Iterator<Item = i32> + '_ {
        self.sections.keys().copied()
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}
