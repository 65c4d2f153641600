//! Item entities: dropped stacks that physics moves and merge logic resizes.
//!
//! The store is the host side of the contract. It hands out stable
//! [`EntityId`]s, holds the live component values, and exposes them to the
//! diff detectors through [`EntitySource`]. It never emits events itself.

use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

/// Host-assigned identity, unique among live entities.
///
/// Freed ids are reused, so holding one past the entity's removal is a bug on
/// the holder's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Opaque item type identifier, interpreted by the game layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemKind(pub u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStack {
    pub item: ItemKind,
    pub quantity: u32,
}

impl ItemStack {
    pub const fn new(item: ItemKind, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// Whatever the host can still tell about an entity at a lifecycle callback.
/// Either field may be missing if the host has already torn the entity down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ItemSnapshot {
    pub position: Option<Vec3>,
    pub stack: Option<ItemStack>,
}

impl ItemSnapshot {
    pub fn new(position: Vec3, stack: ItemStack) -> Self {
        Self {
            position: Some(position),
            stack: Some(stack),
        }
    }
}

/// A live item entity. Components are optional because the host may strip
/// one mid-lifetime (e.g. a stack being picked up is emptied before the
/// entity itself goes away).
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEntity {
    pub position: Option<Vec3>,
    pub velocity: Vec3,
    pub stack: Option<ItemStack>,
    pub on_ground: bool,
}

impl ItemEntity {
    pub fn new(position: Vec3, velocity: Vec3, stack: ItemStack) -> Self {
        Self {
            position: Some(position),
            velocity,
            stack: Some(stack),
            on_ground: false,
        }
    }

    pub fn snapshot(&self) -> ItemSnapshot {
        ItemSnapshot {
            position: self.position,
            stack: self.stack,
        }
    }
}

/// One entity as seen by a detector scan. Every field may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observation {
    pub id: Option<EntityId>,
    pub position: Option<Vec3>,
    pub quantity: Option<u32>,
    pub item: Option<ItemKind>,
}

/// Read access to the entities a detector should scan this tick.
pub trait EntitySource {
    /// Visit every candidate entity once.
    fn for_each_observation(&self, visit: &mut dyn FnMut(Observation));

    /// Whether `id` currently names a live entity.
    fn is_live(&self, id: EntityId) -> bool;
}

/// Thread-safe store of live item entities.
pub struct EntityStore {
    entities: DashMap<EntityId, ItemEntity>,
    free: Mutex<BTreeSet<u32>>,
    next_id: AtomicU32,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
            free: Mutex::new(BTreeSet::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Allocate an identity, preferring the lowest released one.
    pub fn allocate_id(&self) -> EntityId {
        let reused = self.free.lock().expect("entity free list poisoned").pop_first();
        match reused {
            Some(raw) => EntityId(raw),
            None => EntityId(self.next_id.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Return an identity to the pool. Ignored while the id is still live.
    pub fn release_id(&self, id: EntityId) {
        if self.entities.contains_key(&id) {
            tracing::warn!("Refusing to release live entity id {:?}", id);
            return;
        }
        self.free.lock().expect("entity free list poisoned").insert(id.0);
    }

    pub fn insert(&self, id: EntityId, entity: ItemEntity) {
        self.entities.insert(id, entity);
    }

    pub fn remove(&self, id: EntityId) -> Option<ItemEntity> {
        self.entities.remove(&id).map(|(_, entity)| entity)
    }

    pub fn get(&self, id: EntityId) -> Option<ItemEntity> {
        self.entities.get(&id).map(|entry| entry.clone())
    }

    /// Mutate one entity in place. Returns `None` if it is not live.
    pub fn with_mut<R>(&self, id: EntityId, f: impl FnOnce(&mut ItemEntity) -> R) -> Option<R> {
        self.entities.get_mut(&id).map(|mut entry| f(entry.value_mut()))
    }

    /// Ids of every live entity, sorted ascending.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntitySource for EntityStore {
    /// Ids are collected up front so no shard lock is held while the visitor
    /// dispatches (handlers may spawn or remove entities). Each entity is
    /// re-read just before its visit; one removed in the meantime is visited
    /// with no values.
    fn for_each_observation(&self, visit: &mut dyn FnMut(Observation)) {
        let ids: Vec<EntityId> = self.entities.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            let observation = match self.get(id) {
                Some(entity) => Observation {
                    id: Some(id),
                    position: entity.position,
                    quantity: entity.stack.map(|s| s.quantity),
                    item: entity.stack.map(|s| s.item),
                },
                None => Observation {
                    id: Some(id),
                    ..Observation::default()
                },
            };
            visit(observation);
        }
    }

    fn is_live(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }
}
