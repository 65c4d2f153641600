//! Flat terrain generation.
//!
//! Layout, bottom to top: bedrock at `surface_y - 4`, three layers of stone,
//! then the configured surface block at `surface_y`. Items spawn above it.

use tickwatch_engine::world::World;
use tickwatch_engine::world::block::BlockId;
use tickwatch_engine::world::chunk::{Chunk, SECTION_SIZE};
use tickwatch_engine::world::position::{ChunkPos, LocalBlockPos};

use crate::block;

/// Fill chunks `-radius..radius` on both axes. Generated blocks are not
/// mutations, so no `BlockChanged` is ever reported for them.
pub fn generate_flat(world: &World, radius: i32, surface: BlockId, surface_y: i64) {
    for cx in -radius..radius {
        for cz in -radius..radius {
            let mut chunk = Chunk::new();
            for x in 0..SECTION_SIZE as u8 {
                for z in 0..SECTION_SIZE as u8 {
                    chunk.set_block(LocalBlockPos { x, y: surface_y - 4, z }, block::BEDROCK);
                    for y in surface_y - 3..surface_y {
                        chunk.set_block(LocalBlockPos { x, y, z }, block::STONE);
                    }
                    chunk.set_block(LocalBlockPos { x, y: surface_y, z }, surface);
                }
            }
            world.insert_chunk(ChunkPos::new(cx, cz), chunk);
        }
    }
}
