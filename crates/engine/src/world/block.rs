/// Opaque block identifier. The engine stores these without interpreting them.
/// Game-specific layers assign meaning to specific IDs (e.g. 0 = air, 12 = sand).
///
/// The only semantic the engine enforces is that `BlockId::AIR` (0) is the
/// "empty" block: chunk sections filled entirely with AIR are deallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The universal "empty" block.
    pub const AIR: BlockId = BlockId(0);

    pub const fn new(id: u16) -> Self {
        Self(id)
    }
}

/// Host-defined rotation index stored beside each block.
///
/// The engine only distinguishes `NONE`; the horizontal facings are provided
/// because nearly every voxel game needs them, but any `u8` is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Orientation(pub u8);

impl Orientation {
    pub const NONE: Orientation = Orientation(0);
    pub const NORTH: Orientation = Orientation(1);
    pub const EAST: Orientation = Orientation(2);
    pub const SOUTH: Orientation = Orientation(3);
    pub const WEST: Orientation = Orientation(4);
}
