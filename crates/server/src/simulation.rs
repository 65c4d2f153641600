//! Ambient simulation framework.
//!
//! Each [`SimulationLayer`] becomes one system in the world's tick schedule
//! and runs every `interval_ticks` ticks. Layers mutate entities and blocks
//! silently; the engine's detector phases, scheduled after every layer,
//! turn those mutations into events.
//!
//! # Adding a new layer
//!
//! 1. Implement [`SimulationLayer`] for your struct.
//! 2. Push a `Box::new(YourLayer)` into the layer list built in `main.rs`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tickwatch_engine::entity::{EntityId, ItemKind, ItemStack, Vec3};
use tickwatch_engine::event::{AddReason, RemoveReason};
use tickwatch_engine::host::WorldHostBuilder;
use tickwatch_engine::world::position::BlockPos;
use tickwatch_engine::{TickInfo, WorldHost};

use crate::{block, physics};

/// A pluggable simulation layer driven by the world's tick.
///
/// Layers are expected to be cheap per tick -- heavy work should be amortized
/// across ticks or done lazily.
pub trait SimulationLayer: Send + Sync + 'static {
    /// Schedule name, also used for logging.
    fn name(&self) -> &'static str;

    /// Run every this many ticks. `0` disables the layer.
    fn interval_ticks(&self) -> u64 {
        1
    }

    /// Layers that must run before this one within a tick.
    fn after(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether the layer writes blocks (block changes are collected after it).
    fn writes_blocks(&self) -> bool {
        false
    }

    fn run(&self, host: &WorldHost, info: &TickInfo);
}

/// Add every layer to the host's schedule.
pub fn install(mut builder: WorldHostBuilder, layers: Vec<Box<dyn SimulationLayer>>) -> WorldHostBuilder {
    for layer in layers {
        let name = layer.name();
        let after = layer.after();
        let writes_blocks = layer.writes_blocks();
        tracing::info!(
            "Simulation layer '{}' installed (every {} ticks)",
            name,
            layer.interval_ticks()
        );
        let system = move |host: &WorldHost, info: &TickInfo| {
            let interval = layer.interval_ticks();
            if interval == 0 || info.tick % interval != 0 {
                return;
            }
            layer.run(host, info);
        };
        builder = if writes_blocks {
            builder.block_system(name, after, system)
        } else {
            builder.system(name, after, system)
        };
    }
    builder
}

// ---------------------------------------------------------------------------
// Item physics
// ---------------------------------------------------------------------------

/// Gravity, stack merging and void cleanup for item entities.
pub struct ItemPhysics {
    pub void_y: f64,
}

impl ItemPhysics {
    pub const NAME: &'static str = "physics.items";
}

impl SimulationLayer for ItemPhysics {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, host: &WorldHost, info: &TickInfo) {
        physics::apply_item_gravity(host, info.dt);
        let merged = physics::merge_item_stacks(host);
        let destroyed = physics::despawn_below(host, self.void_y);
        if merged > 0 || destroyed > 0 {
            tracing::debug!(
                "World {:?}: {} stacks merged, {} items fell out of the world",
                host.id(),
                merged,
                destroyed
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Item spawner
// ---------------------------------------------------------------------------

/// Periodically drops a stack above spawn, cycling through item kinds, and
/// despawns the oldest of its own drops once `max_items` are alive.
pub struct ItemSpawner {
    pub spawn: Vec3,
    pub interval: u64,
    pub max_items: usize,
    pub kinds: Vec<ItemKind>,
    dropped: AtomicU64,
    /// Live drops in spawn order, oldest first.
    spawned: Mutex<VecDeque<EntityId>>,
}

impl ItemSpawner {
    pub const NAME: &'static str = "spawner.items";

    pub fn new(spawn: Vec3, interval: u64, max_items: usize, kinds: Vec<ItemKind>) -> Self {
        Self {
            spawn,
            interval,
            max_items,
            kinds,
            dropped: AtomicU64::new(0),
            spawned: Mutex::new(VecDeque::new()),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SimulationLayer for ItemSpawner {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn interval_ticks(&self) -> u64 {
        self.interval
    }

    fn run(&self, host: &WorldHost, _info: &TickInfo) {
        if self.kinds.is_empty() {
            return;
        }
        let mut spawned = self.spawned.lock().expect("spawner queue poisoned");
        // Drops merged away or destroyed since the last run.
        spawned.retain(|id| host.entities().get(*id).is_some());
        while self.max_items > 0 && host.entities().len() >= self.max_items {
            let Some(oldest) = spawned.pop_front() else {
                break;
            };
            host.remove_item(oldest, RemoveReason::Despawned);
        }

        let n = self.dropped.fetch_add(1, Ordering::Relaxed);
        let kind = self.kinds[(n % self.kinds.len() as u64) as usize];
        // Small deterministic sideways kick so drops don't all stack exactly.
        let spread = (n % 5) as f64 * 0.1 - 0.2;
        let velocity = Vec3::new(spread, 0.0, -spread);
        let quantity = 1 + (n % 16) as u32;
        let id = host.spawn_item(self.spawn, velocity, ItemStack::new(kind, quantity), AddReason::Spawned);
        spawned.retain(|s| *s != id);
        spawned.push_back(id);
    }
}

// ---------------------------------------------------------------------------
// Falling blocks
// ---------------------------------------------------------------------------

/// Moves gravity blocks (sand, gravel) down one block per run while the block
/// below is replaceable, and every `drop_every` runs places a new one at
/// `drop_at`, alternating sand and gravel.
pub struct SandFall {
    pub interval: u64,
    pub drop_at: BlockPos,
    pub drop_every: u64,
    runs: AtomicU64,
}

impl SandFall {
    pub const NAME: &'static str = "blocks.gravity";

    pub fn new(interval: u64, drop_at: BlockPos, drop_every: u64) -> Self {
        Self {
            interval,
            drop_at,
            drop_every,
            runs: AtomicU64::new(0),
        }
    }
}

impl SimulationLayer for SandFall {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn interval_ticks(&self) -> u64 {
        self.interval
    }

    fn writes_blocks(&self) -> bool {
        true
    }

    fn run(&self, host: &WorldHost, _info: &TickInfo) {
        let world = host.world();
        let mut fell = 0;
        // Bottom-up, so a column falls as a unit.
        for pos in world.find_blocks(block::has_gravity) {
            let below = pos.below();
            if block::is_replaceable(world.get_block(below)) {
                let id = world.get_block(pos);
                world.set_block(below, id);
                world.set_block(pos, block::AIR);
                fell += 1;
            }
        }

        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        if self.drop_every > 0 && run % self.drop_every == 0 && block::is_replaceable(world.get_block(self.drop_at)) {
            let id = if (run / self.drop_every) % 2 == 0 {
                block::SAND
            } else {
                block::GRAVEL
            };
            world.set_block(self.drop_at, id);
        }

        if fell > 0 {
            tracing::trace!("World {:?}: {} gravity blocks fell", host.id(), fell);
        }
    }
}
