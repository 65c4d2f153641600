//! The per-world context: one dispatcher, one set of tracking maps, and the
//! detectors that feed them, driven by a single tick schedule.
//!
//! Nothing here is process-global. Each simulated world builds its own
//! `WorldHost`, and tearing the world down (`shutdown`) drops every
//! registration and tracking entry it owned.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::block_diff::BlockDiffCollector;
use crate::config::WatchConfig;
use crate::detect::{PositionDetector, PositionDiff, QuantityDetector, QuantityDiff, TrackingMaps};
use crate::entity::{EntityId, EntityStore, ItemEntity, ItemStack, Vec3};
use crate::error::Result;
use crate::event::{AddReason, Dispatcher, EventContext, RemoveReason, WorldId};
use crate::lifecycle::LifecycleWatcher;
use crate::schedule::TickSchedule;
use crate::world::World;

/// Names of the phases every host schedules after its own systems.
pub const DETECT_POSITIONS: &str = "detect.position";
pub const DETECT_QUANTITIES: &str = "detect.quantity";
pub const COLLECT_BLOCKS: &str = "detect.blocks";
pub const SWEEP: &str = "sweep";

/// Timing for the current tick, passed to every host system.
#[derive(Debug, Clone, Copy)]
pub struct TickInfo {
    pub tick: u64,
    pub dt: Duration,
}

/// A host-supplied system. Runs on the tick thread with shared access to the
/// whole world context.
pub type HostSystem = Box<dyn Fn(&WorldHost, &TickInfo) + Send + Sync>;

enum Stage {
    Host(HostSystem),
    DetectPositions,
    DetectQuantities,
    CollectBlocks,
    Sweep,
}

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub tick: u64,
    pub moved: usize,
    pub quantity_changed: usize,
    pub blocks_changed: usize,
    pub soft_misses: usize,
    pub swept: usize,
    pub duration: Duration,
}

impl TickReport {
    pub fn events(&self) -> usize {
        self.moved + self.quantity_changed + self.blocks_changed
    }
}

struct SystemSpec {
    name: String,
    after: Vec<String>,
    mutates_blocks: bool,
    system: HostSystem,
}

pub struct WorldHostBuilder {
    id: WorldId,
    config: WatchConfig,
    world: World,
    systems: Vec<SystemSpec>,
}

impl WorldHostBuilder {
    pub fn config(mut self, config: WatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from a pre-generated world instead of an empty one.
    pub fn world(mut self, world: World) -> Self {
        self.world = world;
        self
    }

    /// Add a system that only touches entities.
    pub fn system<F>(self, name: &str, after: &[&str], system: F) -> Self
    where
        F: Fn(&WorldHost, &TickInfo) + Send + Sync + 'static,
    {
        self.push(name, after, false, Box::new(system))
    }

    /// Add a system that writes blocks. The block diff collector is
    /// scheduled after every such system.
    pub fn block_system<F>(self, name: &str, after: &[&str], system: F) -> Self
    where
        F: Fn(&WorldHost, &TickInfo) + Send + Sync + 'static,
    {
        self.push(name, after, true, Box::new(system))
    }

    fn push(mut self, name: &str, after: &[&str], mutates_blocks: bool, system: HostSystem) -> Self {
        self.systems.push(SystemSpec {
            name: name.to_string(),
            after: after.iter().map(|s| s.to_string()).collect(),
            mutates_blocks,
            system,
        });
        self
    }

    pub fn build(self) -> Result<WorldHost> {
        self.config.validate()?;

        let host_names: Vec<String> = self.systems.iter().map(|s| s.name.clone()).collect();
        let mutator_names: Vec<String> = self
            .systems
            .iter()
            .filter(|s| s.mutates_blocks)
            .map(|s| s.name.clone())
            .collect();

        let mut builder = TickSchedule::builder();
        for spec in self.systems {
            let after: Vec<&str> = spec.after.iter().map(String::as_str).collect();
            builder.add(spec.name, &after, Stage::Host(spec.system));
        }
        let all_host: Vec<&str> = host_names.iter().map(String::as_str).collect();
        let mutators: Vec<&str> = mutator_names.iter().map(String::as_str).collect();
        builder
            .add(DETECT_POSITIONS, &all_host, Stage::DetectPositions)
            .add(DETECT_QUANTITIES, &all_host, Stage::DetectQuantities)
            .add(COLLECT_BLOCKS, &mutators, Stage::CollectBlocks)
            .add(SWEEP, &[DETECT_POSITIONS, DETECT_QUANTITIES], Stage::Sweep);
        let schedule = builder.build()?;

        let dispatcher = Arc::new(Dispatcher::new());
        let tracking = TrackingMaps::new();
        let positions = PositionDetector::new(
            PositionDiff::new(self.config.move_threshold),
            Arc::clone(&tracking.positions),
            Arc::clone(&dispatcher),
        );
        let quantities = QuantityDetector::new(
            QuantityDiff,
            Arc::clone(&tracking.quantities),
            Arc::clone(&dispatcher),
        );
        let watcher = LifecycleWatcher::new(tracking.clone(), Arc::clone(&dispatcher));
        let blocks = BlockDiffCollector::new(Arc::clone(&dispatcher));

        tracing::info!(
            "World {:?} ready: {} systems scheduled ({})",
            self.id,
            schedule.len(),
            schedule.names().join(" -> ")
        );

        Ok(WorldHost {
            id: self.id,
            config: self.config,
            dispatcher,
            world: self.world,
            entities: EntityStore::new(),
            tracking,
            positions,
            quantities,
            watcher,
            blocks,
            schedule,
            tick: AtomicU64::new(0),
        })
    }
}

pub struct WorldHost {
    id: WorldId,
    config: WatchConfig,
    dispatcher: Arc<Dispatcher>,
    world: World,
    entities: EntityStore,
    tracking: TrackingMaps,
    positions: PositionDetector,
    quantities: QuantityDetector,
    watcher: LifecycleWatcher,
    blocks: BlockDiffCollector,
    schedule: TickSchedule<Stage>,
    tick: AtomicU64,
}

impl WorldHost {
    pub fn builder(id: WorldId) -> WorldHostBuilder {
        WorldHostBuilder {
            id,
            config: WatchConfig::default(),
            world: World::new(),
            systems: Vec::new(),
        }
    }

    /// A host with no systems of its own, only the core phases.
    pub fn new(id: WorldId, config: WatchConfig) -> Result<Self> {
        Self::builder(id).config(config).build()
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// The registration surface for plugins.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn tracking(&self) -> &TrackingMaps {
        &self.tracking
    }

    pub fn watcher(&self) -> &LifecycleWatcher {
        &self.watcher
    }

    /// System names in execution order.
    pub fn schedule(&self) -> Vec<&str> {
        self.schedule.names()
    }

    /// The last tick started (0 before the first).
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    pub fn context(&self) -> EventContext {
        EventContext::new(self.id, self.current_tick())
    }

    /// Create an item entity and run the add callback.
    pub fn spawn_item(&self, position: Vec3, velocity: Vec3, stack: ItemStack, reason: AddReason) -> EntityId {
        let id = self.entities.allocate_id();
        let entity = ItemEntity::new(position, velocity, stack);
        let snapshot = entity.snapshot();
        self.entities.insert(id, entity);
        self.watcher.on_added(self.context(), Some(id), &snapshot, reason);
        id
    }

    /// Remove an item entity and run the remove callback. The id is released
    /// for reuse only after its tracking state has been evicted.
    pub fn remove_item(&self, id: EntityId, reason: RemoveReason) -> bool {
        let Some(entity) = self.entities.remove(id) else {
            return false;
        };
        self.watcher
            .on_removed(self.context(), id, &entity.snapshot(), reason);
        self.entities.release_id(id);
        true
    }

    /// Run one tick: every system in schedule order, then report.
    pub fn tick(&self, dt: Duration) -> TickReport {
        let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        let info = TickInfo { tick, dt };
        let ctx = EventContext::new(self.id, tick);
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        for (_, stage) in self.schedule.iter() {
            match stage {
                Stage::Host(system) => system(self, &info),
                Stage::DetectPositions => {
                    let pass = self.positions.run(ctx, &self.entities);
                    report.moved += pass.emitted;
                    report.soft_misses += pass.soft_misses;
                }
                Stage::DetectQuantities => {
                    let pass = self.quantities.run(ctx, &self.entities);
                    report.quantity_changed += pass.emitted;
                    report.soft_misses += pass.soft_misses;
                }
                Stage::CollectBlocks => match self.blocks.run(ctx, &self.world) {
                    Some(n) => report.blocks_changed = n,
                    // Nobody listens: end-of-tick clear, so a later subscriber
                    // is not handed stale changes.
                    None => {
                        self.world.discard_mutations();
                    }
                },
                Stage::Sweep => report.swept = self.sweep(tick),
            }
        }

        report.duration = started.elapsed();
        if report.events() > 0 || report.swept > 0 {
            tracing::debug!(
                "World {:?} tick {}: {} moved, {} quantity, {} blocks, {} swept in {:?}",
                self.id,
                tick,
                report.moved,
                report.quantity_changed,
                report.blocks_changed,
                report.swept,
                report.duration
            );
        }
        report
    }

    fn sweep(&self, tick: u64) -> usize {
        let interval = self.config.sweep_interval_ticks;
        if interval == 0 || tick % interval != 0 {
            return 0;
        }
        let swept = self.tracking.retain_live(&self.entities);
        for id in &swept {
            tracing::debug!("World {:?}: swept stale tracking entry for {:?}", self.id, id);
        }
        swept.len()
    }

    /// Tear the world's event state down: drop every registration and every
    /// tracking entry.
    pub fn shutdown(&self) {
        let owners = self.dispatcher.owner_count();
        self.dispatcher.clear();
        self.tracking.clear();
        tracing::info!(
            "World {:?} shut down ({} owners released)",
            self.id,
            owners
        );
    }
}
