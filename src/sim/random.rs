//! Shared randomness across an emission hierarchy
//!
//! A shared random value is keyed by a 24-bit hash built from the caller's
//! operation id and the origin ids met while walking up the hierarchy. The
//! ancestor reached by the walk owns the value: the first query computes it
//! from that ancestor's seed, every later query with the same hash reads it
//! back from the ancestor's memo.

use super::state::{UnitId, UnitRegistry};
use crate::consts::{SHARED_HASH_BITS, SHARED_HASH_MASK, SHOT_ORDER_PRIME};
use crate::param::RandomFactor;

/// Where a shared random value lives and under which hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedKey {
    pub owner: UnitId,
    pub hash: u32,
}

/// Deterministic value in [0, 1) from a seed and a hash.
///
/// Each of the low 23 hash bits that is set adds `2^-(bit + 1)` to the seed.
pub fn seeded_value(seed: f32, hash: u32) -> f32 {
    let mut acc = seed as f64;
    for bit in 0..SHARED_HASH_BITS {
        if hash & (1 << bit) != 0 {
            acc += 1.0 / (1u64 << (bit + 1)) as f64;
        }
    }
    let value = acc.rem_euclid(1.0) as f32;
    // Rounding to f32 can land on exactly 1.0
    if value >= 1.0 { 0.0 } else { value }
}

/// Build the shared key for a query started at `unit`.
///
/// `None` when the walk runs out of hierarchy.
pub fn shared_key(
    registry: &UnitRegistry,
    unit: UnitId,
    operation_id: u32,
    factor: &RandomFactor,
) -> Option<SharedKey> {
    let mut hash = operation_id;
    let mut current = registry.get(unit)?;
    let mut shot_order = current.shot_index_in_pattern;

    for _ in 0..factor.relative_to_ancestor {
        hash ^= current.origin.combined();
        shot_order = current.shot_index_in_pattern;
        current = registry.get(current.parent?)?;
    }

    if factor.different_per_shot {
        hash ^= shot_order.wrapping_mul(SHOT_ORDER_PRIME);
    }

    Some(SharedKey {
        owner: current.id,
        hash: hash & SHARED_HASH_MASK,
    })
}

/// Shared random value for a query started at `unit`, memoized on the owner.
///
/// `None` when the hierarchy needed for the key is missing.
pub fn shared_random(
    registry: &mut UnitRegistry,
    unit: UnitId,
    operation_id: u32,
    factor: &RandomFactor,
) -> Option<f32> {
    let key = shared_key(registry, unit, operation_id, factor)?;
    let owner = registry.get_mut(key.owner)?;
    if let Some(value) = owner.memoized(key.hash) {
        return Some(value);
    }
    let value = seeded_value(owner.random_seed, key.hash);
    Some(owner.memoize(key.hash, value))
}

/// Random interpolation factor: shared when requested and possible, fresh otherwise
pub fn random_factor(
    registry: &mut UnitRegistry,
    unit: Option<UnitId>,
    operation_id: u32,
    factor: &RandomFactor,
) -> f32 {
    if factor.share_across_instances {
        if let Some(value) = unit.and_then(|u| shared_random(registry, u, operation_id, factor)) {
            return value;
        }
        log::debug!(
            "shared random (op {operation_id}) has no hierarchy to walk, drawing a fresh value"
        );
    }
    registry.random_unit()
}
