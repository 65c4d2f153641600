//! World-change events: the closed set of kinds the core emits and the
//! payload each one carries.

pub mod dispatcher;
pub mod stats;

use crate::entity::{EntityId, ItemKind, ItemStack, Vec3};
use crate::world::block::{BlockId, Orientation};
use crate::world::position::BlockPos;

pub use dispatcher::{DispatchOutcome, Dispatcher, HandlerId, Listener, OwnerToken};
pub use stats::{DispatchStats, DispatchStatsSnapshot};

/// Identifies one simulated world (one `WorldHost`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WorldId(pub u32);

/// Where and when an event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext {
    pub world: WorldId,
    pub tick: u64,
}

impl EventContext {
    pub const fn new(world: WorldId, tick: u64) -> Self {
        Self { world, tick }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Removed,
    Moved,
    QuantityChanged,
    BlockChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Added,
        EventKind::Removed,
        EventKind::Moved,
        EventKind::QuantityChanged,
        EventKind::BlockChanged,
    ];

    /// Dense index into per-kind tables.
    pub const fn index(self) -> usize {
        match self {
            EventKind::Added => 0,
            EventKind::Removed => 1,
            EventKind::Moved => 2,
            EventKind::QuantityChanged => 3,
            EventKind::BlockChanged => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Added => "added",
            EventKind::Removed => "removed",
            EventKind::Moved => "moved",
            EventKind::QuantityChanged => "quantity_changed",
            EventKind::BlockChanged => "block_changed",
        }
    }
}

/// Why an entity appeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddReason {
    Spawned,
    /// Dropped by a player or container.
    Dropped,
    /// Brought back by chunk loading.
    Loaded,
    /// Split off another stack.
    Split,
}

/// Why an entity went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveReason {
    Despawned,
    PickedUp,
    /// Absorbed into a neighbouring stack.
    Merged,
    Unloaded,
    Destroyed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemAdded {
    pub id: EntityId,
    pub ctx: EventContext,
    pub position: Vec3,
    pub stack: ItemStack,
    pub reason: AddReason,
}

/// Removal is reported best-effort: the host may have torn down the
/// components already, so position and stack are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRemoved {
    pub id: EntityId,
    pub ctx: EventContext,
    pub position: Option<Vec3>,
    pub stack: Option<ItemStack>,
    pub reason: RemoveReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemMoved {
    pub id: EntityId,
    pub ctx: EventContext,
    pub old: Vec3,
    pub new: Vec3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantityChanged {
    pub id: EntityId,
    pub ctx: EventContext,
    /// Item type at the time of the change, if the entity still had a stack.
    pub item: Option<ItemKind>,
    pub old: u32,
    pub new: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockChanged {
    pub ctx: EventContext,
    pub pos: BlockPos,
    pub block: BlockId,
    pub orientation: Orientation,
}

/// Any event the core can dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Added(ItemAdded),
    Removed(ItemRemoved),
    Moved(ItemMoved),
    QuantityChanged(QuantityChanged),
    BlockChanged(BlockChanged),
}

impl WorldEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorldEvent::Added(_) => EventKind::Added,
            WorldEvent::Removed(_) => EventKind::Removed,
            WorldEvent::Moved(_) => EventKind::Moved,
            WorldEvent::QuantityChanged(_) => EventKind::QuantityChanged,
            WorldEvent::BlockChanged(_) => EventKind::BlockChanged,
        }
    }

    pub fn ctx(&self) -> EventContext {
        match self {
            WorldEvent::Added(e) => e.ctx,
            WorldEvent::Removed(e) => e.ctx,
            WorldEvent::Moved(e) => e.ctx,
            WorldEvent::QuantityChanged(e) => e.ctx,
            WorldEvent::BlockChanged(e) => e.ctx,
        }
    }

    /// The entity this event is about, if any (block events have none).
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            WorldEvent::Added(e) => Some(e.id),
            WorldEvent::Removed(e) => Some(e.id),
            WorldEvent::Moved(e) => Some(e.id),
            WorldEvent::QuantityChanged(e) => Some(e.id),
            WorldEvent::BlockChanged(_) => None,
        }
    }
}

/// A concrete payload type, for typed registration via [`Dispatcher::on`].
pub trait Payload: Send + Sync + 'static {
    const KIND: EventKind;

    fn from_event(event: &WorldEvent) -> Option<&Self>;
}

macro_rules! impl_payload {
    ($ty:ty, $variant:ident) => {
        impl Payload for $ty {
            const KIND: EventKind = EventKind::$variant;

            fn from_event(event: &WorldEvent) -> Option<&Self> {
                match event {
                    WorldEvent::$variant(e) => Some(e),
                    _ => None,
                }
            }
        }

        impl From<$ty> for WorldEvent {
            fn from(e: $ty) -> Self {
                WorldEvent::$variant(e)
            }
        }
    };
}

impl_payload!(ItemAdded, Added);
impl_payload!(ItemRemoved, Removed);
impl_payload!(ItemMoved, Moved);
impl_payload!(QuantityChanged, QuantityChanged);
impl_payload!(BlockChanged, BlockChanged);
