//! Block vocabulary for the demo host and property lookups.
//!
//! The engine treats `BlockId` as opaque; these values only need to be
//! stable within this server.

use tickwatch_engine::world::block::BlockId;

pub const AIR: BlockId = BlockId(0);
pub const STONE: BlockId = BlockId(1);
pub const DIRT: BlockId = BlockId(2);
pub const BEDROCK: BlockId = BlockId(3);
pub const SAND: BlockId = BlockId(4);
pub const GRAVEL: BlockId = BlockId(5);
pub const OAK_LOG: BlockId = BlockId(6);

/// Does this block fall under gravity (like sand/gravel)?
pub fn has_gravity(id: BlockId) -> bool {
    id == SAND || id == GRAVEL
}

/// Can another block be placed in this space?
pub fn is_replaceable(id: BlockId) -> bool {
    id == AIR
}

/// Is this block fully solid?
pub fn is_solid(id: BlockId) -> bool {
    !is_replaceable(id)
}

/// Look a block up by its config name.
pub fn by_name(name: &str) -> Option<BlockId> {
    match name {
        "air" => Some(AIR),
        "stone" => Some(STONE),
        "dirt" => Some(DIRT),
        "bedrock" => Some(BEDROCK),
        "sand" => Some(SAND),
        "gravel" => Some(GRAVEL),
        "oak_log" => Some(OAK_LOG),
        _ => None,
    }
}
