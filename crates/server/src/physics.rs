//! Item entity physics: falling, landing, stack merging, and void cleanup.
//!
//! All of this mutates entities silently through the entity store; the
//! engine's detectors pick the results up later in the same tick.

use std::time::Duration;

use tickwatch_engine::WorldHost;
use tickwatch_engine::entity::{EntityId, ItemEntity, ItemStack, Vec3};
use tickwatch_engine::event::RemoveReason;
use tickwatch_engine::world::World;
use tickwatch_engine::world::position::BlockPos;

use crate::block;

/// Downward acceleration in blocks/s².
pub const ITEM_GRAVITY: f64 = 16.0;
/// Fall speed cap in blocks/s.
pub const TERMINAL_VELOCITY: f64 = 40.0;
/// Resting items of the same kind closer than this merge.
pub const MERGE_RADIUS: f64 = 0.5;
pub const MAX_STACK: u32 = 64;

fn block_at(x: f64, y: i64, z: f64) -> BlockPos {
    BlockPos::new(x.floor() as i64, y, z.floor() as i64)
}

/// Advance one item by `dt`. Returns `true` if its position changed.
fn step_item(world: &World, item: &mut ItemEntity, dt: f64) -> bool {
    let Some(pos) = item.position else {
        return false;
    };

    if item.on_ground {
        let support = block_at(pos.x, pos.y.floor() as i64 - 1, pos.z);
        if block::is_solid(world.get_block(support)) {
            return false;
        }
        item.on_ground = false;
    }

    item.velocity.y = (item.velocity.y - ITEM_GRAVITY * dt).max(-TERMINAL_VELOCITY);
    let mut next = Vec3::new(
        pos.x + item.velocity.x * dt,
        pos.y + item.velocity.y * dt,
        pos.z + item.velocity.z * dt,
    );

    // Land on the first solid top surface crossed this step, checking every
    // layer so fast items can't tunnel.
    if next.y < pos.y {
        let top = pos.y.ceil() as i64 - 1;
        let bottom = next.y.floor() as i64;
        for y in (bottom..=top).rev() {
            let surface = (y + 1) as f64;
            if surface > pos.y || surface <= next.y {
                continue;
            }
            if block::is_solid(world.get_block(block_at(next.x, y, next.z))) {
                next.y = surface;
                item.velocity = Vec3::ZERO;
                item.on_ground = true;
                break;
            }
        }
    }

    item.position = Some(next);
    next != pos
}

/// Integrate gravity for every airborne item. Returns how many moved.
pub fn apply_item_gravity(host: &WorldHost, dt: Duration) -> usize {
    let dt = dt.as_secs_f64();
    let mut moved = 0;
    for id in host.entities().ids() {
        if host.entities().with_mut(id, |item| step_item(host.world(), item, dt)) == Some(true) {
            moved += 1;
        }
    }
    moved
}

/// Merge resting stacks of the same kind that sit within [`MERGE_RADIUS`].
///
/// The lower id survives and absorbs as much as fits under [`MAX_STACK`].
/// A fully absorbed item is removed with [`RemoveReason::Merged`]; the
/// quantity changes on both sides are left for the detectors to report.
pub fn merge_item_stacks(host: &WorldHost) -> usize {
    let mut resting: Vec<(EntityId, Vec3, ItemStack)> = host
        .entities()
        .ids()
        .into_iter()
        .filter_map(|id| {
            let item = host.entities().get(id)?;
            match (item.on_ground, item.position, item.stack) {
                (true, Some(pos), Some(stack)) if stack.quantity > 0 => Some((id, pos, stack)),
                _ => None,
            }
        })
        .collect();

    let radius_sq = MERGE_RADIUS * MERGE_RADIUS;
    let mut merged = 0;
    for i in 0..resting.len() {
        for j in i + 1..resting.len() {
            let (survivor, at, stack) = resting[i];
            let (other, other_at, other_stack) = resting[j];
            if other_stack.quantity == 0
                || stack.quantity >= MAX_STACK
                || other_stack.item != stack.item
                || at.distance_squared(&other_at) > radius_sq
            {
                continue;
            }

            let moved = other_stack.quantity.min(MAX_STACK - stack.quantity);
            resting[i].2.quantity += moved;
            resting[j].2.quantity -= moved;
            let total = resting[i].2.quantity;
            let left = resting[j].2.quantity;

            host.entities().with_mut(survivor, |item| {
                if let Some(s) = item.stack.as_mut() {
                    s.quantity = total;
                }
            });
            if left == 0 {
                host.remove_item(other, RemoveReason::Merged);
                merged += 1;
            } else {
                host.entities().with_mut(other, |item| {
                    if let Some(s) = item.stack.as_mut() {
                        s.quantity = left;
                    }
                });
            }
        }
    }
    merged
}

/// Remove items that fell out of the world. Returns how many were removed.
pub fn despawn_below(host: &WorldHost, min_y: f64) -> usize {
    let fallen: Vec<EntityId> = host
        .entities()
        .ids()
        .into_iter()
        .filter(|&id| {
            host.entities()
                .get(id)
                .and_then(|item| item.position)
                .is_some_and(|pos| pos.y < min_y)
        })
        .collect();
    for &id in &fallen {
        host.remove_item(id, RemoveReason::Destroyed);
    }
    fallen.len()
}
