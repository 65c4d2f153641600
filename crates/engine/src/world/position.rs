/// Absolute block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk this block belongs to.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: (self.x >> 4) as i32,
            z: (self.z >> 4) as i32,
        }
    }

    /// Position within the chunk (0..16 each axis, 0..max_y for y).
    pub const fn local(&self) -> LocalBlockPos {
        LocalBlockPos {
            x: (self.x & 0xF) as u8,
            y: self.y,
            z: (self.z & 0xF) as u8,
        }
    }

    pub const fn below(&self) -> BlockPos {
        Self::new(self.x, self.y - 1, self.z)
    }

    pub const fn above(&self) -> BlockPos {
        Self::new(self.x, self.y + 1, self.z)
    }

    pub const fn offset(&self, dx: i64, dy: i64, dz: i64) -> BlockPos {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn block_origin(&self, y: i64) -> BlockPos {
        BlockPos::new((self.x as i64) << 4, y, (self.z as i64) << 4)
    }

    /// The section of this column at section index `y` (block y >> 4).
    pub const fn section(&self, y: i32) -> SectionPos {
        SectionPos { chunk: *self, y }
    }
}

/// One 16x16x16 section of a chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionPos {
    pub chunk: ChunkPos,
    pub y: i32,
}

impl SectionPos {
    /// World coordinates of the section's (0, 0, 0) corner.
    pub const fn origin(&self) -> BlockPos {
        self.chunk.block_origin((self.y as i64) << 4)
    }
}

/// Block position local to a chunk (x, z in 0..16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalBlockPos {
    pub x: u8,
    pub y: i64,
    pub z: u8,
}

impl LocalBlockPos {
    pub const fn section_index(&self) -> i32 {
        (self.y >> 4) as i32
    }

    pub const fn section_local_y(&self) -> u8 {
        (self.y.rem_euclid(16)) as u8
    }
}
