//! End to end: simulation layers mutate silently, the engine reports.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tickwatch_engine::entity::{EntityId, ItemKind, ItemStack, Vec3};
use tickwatch_engine::event::{
    AddReason, BlockChanged, EventKind, ItemRemoved, RemoveReason, WorldEvent, WorldId,
};
use tickwatch_engine::world::World;
use tickwatch_engine::world::position::BlockPos;
use tickwatch_engine::{WatchConfig, WorldHost};
use tickwatch_server::block;
use tickwatch_server::plugins::{self, EventMetrics};
use tickwatch_server::simulation::{self, ItemPhysics, ItemSpawner, SandFall, SimulationLayer};
use tickwatch_server::terrain;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DT: Duration = Duration::from_millis(50);
const SURFACE_Y: i64 = 64;
const COBBLE: ItemKind = ItemKind(4);

fn host_with(layers: Vec<Box<dyn SimulationLayer>>) -> WorldHost {
    let world = World::new();
    terrain::generate_flat(&world, 1, block::DIRT, SURFACE_Y);
    let builder = WorldHost::builder(WorldId(0))
        .config(WatchConfig::default())
        .world(world);
    simulation::install(builder, layers).build().unwrap()
}

fn physics() -> Box<dyn SimulationLayer> {
    Box::new(ItemPhysics { void_y: 0.0 })
}

fn record_all(host: &WorldHost) -> Arc<Mutex<Vec<WorldEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let owner = host.dispatcher().new_owner();
    for kind in EventKind::ALL {
        let l = Arc::clone(&log);
        host.dispatcher()
            .register(owner, kind, move |e| l.lock().unwrap().push(e.clone()));
    }
    log
}

fn count(log: &Mutex<Vec<WorldEvent>>, kind: EventKind) -> usize {
    log.lock().unwrap().iter().filter(|e| e.kind() == kind).count()
}

// ---------------------------------------------------------------------------
// Item physics
// ---------------------------------------------------------------------------

#[test]
fn falling_item_is_reported_until_it_lands() {
    let host = host_with(vec![physics()]);
    let log = record_all(&host);
    let id = host.spawn_item(
        Vec3::new(0.5, 70.0, 0.5),
        Vec3::ZERO,
        ItemStack::new(COBBLE, 1),
        AddReason::Dropped,
    );

    for _ in 0..40 {
        host.tick(DT);
    }

    let item = host.entities().get(id).unwrap();
    assert!(item.on_ground);
    assert_eq!(item.position, Some(Vec3::new(0.5, 65.0, 0.5)));

    let moves: Vec<Vec3> = log
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            WorldEvent::Moved(m) => Some(m.new),
            _ => None,
        })
        .collect();
    assert!(moves.len() > 1);
    assert_eq!(moves.last(), Some(&Vec3::new(0.5, 65.0, 0.5)));
    assert!(moves.windows(2).all(|w| w[1].y < w[0].y));

    // At rest: nothing more to report.
    let before = log.lock().unwrap().len();
    for _ in 0..10 {
        host.tick(DT);
    }
    assert_eq!(log.lock().unwrap().len(), before);
}

#[test]
fn merged_stacks_report_removal_and_quantity_change() {
    let host = host_with(vec![physics()]);
    let log = record_all(&host);
    let survivor = host.spawn_item(
        Vec3::new(0.5, 65.0, 0.5),
        Vec3::ZERO,
        ItemStack::new(COBBLE, 10),
        AddReason::Dropped,
    );
    let absorbed = host.spawn_item(
        Vec3::new(0.7, 65.0, 0.5),
        Vec3::ZERO,
        ItemStack::new(COBBLE, 5),
        AddReason::Dropped,
    );

    let report = host.tick(DT);

    assert_eq!(report.quantity_changed, 1);
    assert_eq!(report.moved, 0);
    assert!(host.entities().get(absorbed).is_none());
    assert!(!host.tracking().contains(absorbed));

    let events = log.lock().unwrap();
    let kinds: Vec<EventKind> = events.iter().map(WorldEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Added,
            EventKind::Added,
            EventKind::Removed,
            EventKind::QuantityChanged
        ]
    );
    assert!(matches!(
        &events[2],
        WorldEvent::Removed(ItemRemoved { id, reason: RemoveReason::Merged, .. }) if *id == absorbed
    ));
    match &events[3] {
        WorldEvent::QuantityChanged(q) => {
            assert_eq!(q.id, survivor);
            assert_eq!((q.old, q.new), (10, 15));
        }
        other => panic!("expected QuantityChanged, got {other:?}"),
    }
}

#[test]
fn different_kinds_do_not_merge() {
    let host = host_with(vec![physics()]);
    host.spawn_item(Vec3::new(0.5, 65.0, 0.5), Vec3::ZERO, ItemStack::new(ItemKind(1), 3), AddReason::Dropped);
    host.spawn_item(Vec3::new(0.5, 65.0, 0.5), Vec3::ZERO, ItemStack::new(ItemKind(2), 3), AddReason::Dropped);
    host.tick(DT);
    assert_eq!(host.entities().len(), 2);
}

#[test]
fn item_falling_out_of_the_world_is_destroyed() {
    let host = host_with(vec![Box::new(ItemPhysics { void_y: 60.0 })]);
    let log = record_all(&host);
    // Outside the generated terrain, so nothing stops the fall.
    let id = host.spawn_item(
        Vec3::new(500.5, 65.0, 500.5),
        Vec3::ZERO,
        ItemStack::new(COBBLE, 1),
        AddReason::Dropped,
    );

    for _ in 0..40 {
        host.tick(DT);
    }

    assert!(host.entities().get(id).is_none());
    assert!(host.tracking().is_empty());
    assert!(log.lock().unwrap().iter().any(|e| matches!(
        e,
        WorldEvent::Removed(ItemRemoved { reason: RemoveReason::Destroyed, .. })
    )));
}

// ---------------------------------------------------------------------------
// Spawner
// ---------------------------------------------------------------------------

#[test]
fn spawner_drops_on_interval_and_caps_live_items() {
    let spawner = ItemSpawner::new(Vec3::new(0.5, 80.0, 0.5), 2, 2, vec![ItemKind(1), ItemKind(2)]);
    let host = host_with(vec![Box::new(spawner)]);
    let log = record_all(&host);

    for _ in 0..6 {
        host.tick(DT);
    }

    assert_eq!(count(&log, EventKind::Added), 3);
    assert_eq!(count(&log, EventKind::Removed), 1);
    assert_eq!(host.entities().len(), 2);
}

#[test]
fn spawner_despawns_its_oldest_drop_even_when_ids_are_reused() {
    let spawner = ItemSpawner::new(Vec3::new(0.5, 80.0, 0.5), 1, 2, vec![ItemKind(1)]);
    let host = host_with(vec![Box::new(spawner)]);

    host.tick(DT);
    host.tick(DT);
    let (first, second) = (EntityId(1), EntityId(2));
    assert_eq!(host.entities().ids(), vec![first, second]);

    // Freeing the lowest id makes the next drop its newest holder.
    assert!(host.remove_item(first, RemoveReason::PickedUp));
    host.tick(DT);
    assert_eq!(host.entities().ids(), vec![first, second]);

    let log = record_all(&host);
    host.tick(DT);

    let removed: Vec<EntityId> = log
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            WorldEvent::Removed(r) => Some(r.id),
            _ => None,
        })
        .collect();
    assert_eq!(removed, vec![second]);
}

// ---------------------------------------------------------------------------
// Falling blocks
// ---------------------------------------------------------------------------

#[test]
fn falling_sand_is_reported_block_by_block() {
    let host = host_with(vec![Box::new(SandFall::new(1, BlockPos::new(0, 90, 0), 0))]);
    host.world().set_block(BlockPos::new(4, 67, 4), block::SAND);
    host.world().discard_mutations();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    host.dispatcher()
        .on::<BlockChanged, _>(host.dispatcher().new_owner(), move |e| {
            s.lock().unwrap().push((e.ctx.tick, e.pos.y, e.block));
        });

    for _ in 0..4 {
        host.tick(DT);
    }

    let mut events = seen.lock().unwrap().clone();
    events.sort_by_key(|&(tick, y, _)| (tick, y));
    assert_eq!(
        events,
        vec![
            (1, 66, block::SAND),
            (1, 67, block::AIR),
            (2, 65, block::SAND),
            (2, 66, block::AIR),
        ]
    );
    assert_eq!(host.world().get_block(BlockPos::new(4, 65, 4)), block::SAND);
}

#[test]
fn sand_fall_drops_new_blocks_at_its_drop_point() {
    let drop_at = BlockPos::new(2, 80, 2);
    let host = host_with(vec![Box::new(SandFall::new(1, drop_at, 3))]);
    host.tick(DT);
    assert_eq!(host.world().get_block(drop_at), block::SAND);
}

// ---------------------------------------------------------------------------
// Plugins
// ---------------------------------------------------------------------------

#[test]
fn metrics_plugin_counts_and_uninstalls_cleanly() {
    let host = host_with(vec![physics()]);
    let metrics = Arc::new(EventMetrics::new("test"));
    let installed = plugins::install(&host, Arc::clone(&metrics));
    assert_eq!(installed.handlers, 5);

    host.spawn_item(Vec3::new(0.5, 65.0, 0.5), Vec3::ZERO, ItemStack::new(COBBLE, 2), AddReason::Spawned);
    host.spawn_item(Vec3::new(0.6, 65.0, 0.5), Vec3::ZERO, ItemStack::new(COBBLE, 2), AddReason::Spawned);
    let report = host.tick(DT);
    metrics.record_tick(&report);

    let snap = metrics.snapshot(&host);
    assert_eq!(snap.added, 2);
    assert_eq!(snap.removed, 1);
    assert_eq!(snap.merged, 1);
    assert_eq!(snap.quantity_changed, 1);
    assert_eq!(snap.ticks, 1);
    assert_eq!(snap.live_items, 1);
    assert_eq!(snap.hist.iter().sum::<u64>(), 1);
    assert!(serde_json::to_string(&snap).unwrap().contains("\"merged\":1"));

    assert_eq!(plugins::uninstall(&host, &installed), 5);
    assert_eq!(host.dispatcher().owner_count(), 0);
    for kind in EventKind::ALL {
        assert!(!host.dispatcher().has_handlers(kind));
    }
}
