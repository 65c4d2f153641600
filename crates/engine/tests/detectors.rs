//! Position and quantity diff detectors against a hand-built entity source.

use std::sync::{Arc, Mutex};

use tickwatch_engine::detect::{
    PositionDetector, PositionDiff, QuantityDetector, QuantityDiff, TrackingMaps,
};
use tickwatch_engine::entity::{EntityId, EntitySource, ItemKind, Observation, Vec3};
use tickwatch_engine::event::{
    Dispatcher, EventContext, EventKind, ItemMoved, QuantityChanged, WorldEvent, WorldId,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A fixed set of observations standing in for one tick of host state.
struct Scene(Vec<Observation>);

impl EntitySource for Scene {
    fn for_each_observation(&self, visit: &mut dyn FnMut(Observation)) {
        for observation in &self.0 {
            visit(*observation);
        }
    }

    fn is_live(&self, id: EntityId) -> bool {
        self.0.iter().any(|o| o.id == Some(id))
    }
}

fn at(id: u32, x: f64, y: f64, z: f64) -> Observation {
    Observation {
        id: Some(EntityId(id)),
        position: Some(Vec3::new(x, y, z)),
        quantity: None,
        item: None,
    }
}

fn stack(id: u32, quantity: u32) -> Observation {
    Observation {
        id: Some(EntityId(id)),
        position: None,
        quantity: Some(quantity),
        item: Some(ItemKind(2)),
    }
}

fn ctx(tick: u64) -> EventContext {
    EventContext::new(WorldId(0), tick)
}

fn recorder(d: &Dispatcher, kind: EventKind) -> Arc<Mutex<Vec<WorldEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let l = Arc::clone(&log);
    d.register(d.new_owner(), kind, move |e| l.lock().unwrap().push(e.clone()));
    log
}

fn position_detector(threshold: f64) -> (Arc<Dispatcher>, TrackingMaps, PositionDetector) {
    let d = Arc::new(Dispatcher::new());
    let maps = TrackingMaps::new();
    let det = PositionDetector::new(
        PositionDiff::new(threshold),
        Arc::clone(&maps.positions),
        Arc::clone(&d),
    );
    (d, maps, det)
}

fn quantity_detector() -> (Arc<Dispatcher>, TrackingMaps, QuantityDetector) {
    let d = Arc::new(Dispatcher::new());
    let maps = TrackingMaps::new();
    let det = QuantityDetector::new(QuantityDiff, Arc::clone(&maps.quantities), Arc::clone(&d));
    (d, maps, det)
}

fn tracked_position(maps: &TrackingMaps, id: u32) -> Option<Vec3> {
    maps.positions.get(&EntityId(id)).map(|v| *v)
}

// ---------------------------------------------------------------------------
// Short-circuit
// ---------------------------------------------------------------------------

#[test]
fn no_handlers_means_no_scan_and_no_writes() {
    let (d, maps, det) = position_detector(0.1);
    // A listener for a different kind does not wake this detector.
    recorder(&d, EventKind::QuantityChanged);

    let pass = det.run(ctx(1), &Scene(vec![at(1, 0.0, 0.0, 0.0), at(2, 5.0, 0.0, 0.0)]));

    assert_eq!(pass.scanned, 0);
    assert!(maps.positions.is_empty());
    assert_eq!(d.stats().total_dispatches(), 0);
}

#[test]
fn quantity_detector_short_circuits_too() {
    let (d, maps, det) = quantity_detector();
    let pass = det.run(ctx(1), &Scene(vec![stack(1, 5)]));
    assert_eq!(pass.scanned, 0);
    assert!(maps.quantities.is_empty());
    assert_eq!(d.stats().total_dispatches(), 0);
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

#[test]
fn first_sighting_is_a_silent_baseline() {
    let (d, maps, det) = position_detector(0.1);
    let log = recorder(&d, EventKind::Moved);

    let pass = det.run(ctx(1), &Scene(vec![at(1, 3.0, 4.0, 5.0)]));

    assert_eq!(pass.baselined, 1);
    assert_eq!(pass.emitted, 0);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(tracked_position(&maps, 1), Some(Vec3::new(3.0, 4.0, 5.0)));
}

#[test]
fn movement_below_threshold_is_noise() {
    let (d, maps, det) = position_detector(0.1);
    let log = recorder(&d, EventKind::Moved);
    maps.positions.insert(EntityId(1), Vec3::ZERO);

    det.run(ctx(1), &Scene(vec![at(1, 0.0, 0.0, 0.05)]));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(tracked_position(&maps, 1), Some(Vec3::ZERO));

    det.run(ctx(2), &Scene(vec![at(1, 0.0, 0.0, 0.2)]));
    let events = log.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        WorldEvent::Moved(ItemMoved {
            id: EntityId(1),
            ctx: ctx(2),
            old: Vec3::ZERO,
            new: Vec3::new(0.0, 0.0, 0.2),
        })
    );
    assert_eq!(tracked_position(&maps, 1), Some(Vec3::new(0.0, 0.0, 0.2)));
}

#[test]
fn slow_drift_is_measured_from_last_report() {
    let (d, maps, det) = position_detector(0.1);
    let log = recorder(&d, EventKind::Moved);
    maps.positions.insert(EntityId(1), Vec3::ZERO);

    // 0.06 per tick: the second step crosses the threshold relative to the
    // last *reported* position, not the previous tick.
    det.run(ctx(1), &Scene(vec![at(1, 0.06, 0.0, 0.0)]));
    det.run(ctx(2), &Scene(vec![at(1, 0.12, 0.0, 0.0)]));

    let events = log.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0] {
        WorldEvent::Moved(m) => {
            assert_eq!(m.old, Vec3::ZERO);
            assert_eq!(m.new, Vec3::new(0.12, 0.0, 0.0));
        }
        other => panic!("expected Moved, got {other:?}"),
    }
}

#[test]
fn teleport_is_an_ordinary_move() {
    let (d, maps, det) = position_detector(0.01);
    let log = recorder(&d, EventKind::Moved);
    maps.positions.insert(EntityId(9), Vec3::ZERO);

    det.run(ctx(1), &Scene(vec![at(9, 10_000.0, 64.0, -10_000.0)]));

    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn non_finite_position_is_a_soft_miss() {
    let (d, maps, det) = position_detector(0.1);
    let log = recorder(&d, EventKind::Moved);
    maps.positions.insert(EntityId(1), Vec3::new(1.0, 1.0, 1.0));

    let pass = det.run(ctx(1), &Scene(vec![at(1, f64::NAN, 0.0, 0.0), at(2, f64::INFINITY, 0.0, 0.0)]));

    assert_eq!(pass.soft_misses, 2);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(tracked_position(&maps, 1), Some(Vec3::new(1.0, 1.0, 1.0)));
    assert_eq!(tracked_position(&maps, 2), None);
}

#[test]
fn missing_component_leaves_tracking_untouched() {
    let (d, maps, det) = position_detector(0.1);
    let log = recorder(&d, EventKind::Moved);
    maps.positions.insert(EntityId(1), Vec3::new(2.0, 0.0, 0.0));

    let vanished = Observation {
        id: Some(EntityId(1)),
        ..Observation::default()
    };
    let anonymous = Observation {
        id: None,
        position: Some(Vec3::ZERO),
        ..Observation::default()
    };
    let pass = det.run(ctx(1), &Scene(vec![vanished, anonymous]));

    assert_eq!(pass.scanned, 2);
    assert_eq!(pass.soft_misses, 2);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(tracked_position(&maps, 1), Some(Vec3::new(2.0, 0.0, 0.0)));
    assert_eq!(maps.positions.len(), 1);
}

#[test]
fn tracking_is_updated_before_handlers_run() {
    let (d, maps, det) = position_detector(0.1);
    maps.positions.insert(EntityId(1), Vec3::ZERO);
    let seen = Arc::new(Mutex::new(None));
    let (s, m) = (Arc::clone(&seen), Arc::clone(&maps.positions));
    d.on::<ItemMoved, _>(d.new_owner(), move |e| {
        *s.lock().unwrap() = m.get(&e.id).map(|v| *v);
    });

    det.run(ctx(1), &Scene(vec![at(1, 1.0, 0.0, 0.0)]));

    assert_eq!(*seen.lock().unwrap(), Some(Vec3::new(1.0, 0.0, 0.0)));
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

#[test]
fn quantity_changes_are_exact() {
    let (d, maps, det) = quantity_detector();
    let log = recorder(&d, EventKind::QuantityChanged);
    maps.quantities.insert(EntityId(4), 5);

    det.run(ctx(1), &Scene(vec![stack(4, 5)]));
    assert!(log.lock().unwrap().is_empty());

    det.run(ctx(2), &Scene(vec![stack(4, 3)]));
    let events = log.lock().unwrap();
    assert_eq!(
        *events,
        vec![WorldEvent::QuantityChanged(QuantityChanged {
            id: EntityId(4),
            ctx: ctx(2),
            item: Some(ItemKind(2)),
            old: 5,
            new: 3,
        })]
    );
    assert_eq!(maps.quantities.get(&EntityId(4)).map(|v| *v), Some(3));
}

#[test]
fn quantity_change_without_item_kind_still_reports() {
    let (d, maps, det) = quantity_detector();
    let log = recorder(&d, EventKind::QuantityChanged);
    maps.quantities.insert(EntityId(6), 2);
    let bare = Observation {
        item: None,
        ..stack(6, 9)
    };

    let pass = det.run(ctx(1), &Scene(vec![bare]));

    assert_eq!(pass.emitted, 1);
    match &log.lock().unwrap()[0] {
        WorldEvent::QuantityChanged(q) => assert_eq!((q.item, q.old, q.new), (None, 2, 9)),
        other => panic!("expected QuantityChanged, got {other:?}"),
    }
}

#[test]
fn quantity_baseline_then_change() {
    let (d, _maps, det) = quantity_detector();
    let log = recorder(&d, EventKind::QuantityChanged);

    let first = det.run(ctx(1), &Scene(vec![stack(1, 64), stack(2, 1)]));
    let second = det.run(ctx(2), &Scene(vec![stack(1, 63), stack(2, 1)]));

    assert_eq!(first.baselined, 2);
    assert_eq!(second.emitted, 1);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn faulting_handler_does_not_disturb_detection() {
    let (d, maps, det) = quantity_detector();
    d.register(d.new_owner(), EventKind::QuantityChanged, |_| panic!("bad plugin"));
    let log = recorder(&d, EventKind::QuantityChanged);
    maps.quantities.insert(EntityId(1), 10);

    let pass = det.run(ctx(1), &Scene(vec![stack(1, 12)]));

    assert_eq!(pass.emitted, 1);
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(maps.quantities.get(&EntityId(1)).map(|v| *v), Some(12));
    assert_eq!(d.stats().faults, 1);
}
