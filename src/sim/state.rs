//! Emission hierarchy state
//!
//! Every live projectile is an [`EmissionUnit`] that may itself emit further
//! shots. Units live in a [`UnitRegistry`]; the link to the unit that emitted
//! them is a plain [`UnitId`] and may outlive its target.

use std::collections::HashMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::shot::{EmissionMetadata, ResolvedShot};
use crate::param::ParameterTable;

/// Stable id of an emission unit. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Authored asset ids a unit originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OriginIds {
    pub pattern: u32,
    pub shot: u32,
    pub bullet: u32,
}

impl OriginIds {
    /// XOR of all three ids, folded into shared-random hashes
    pub fn combined(&self) -> u32 {
        self.pattern ^ self.shot ^ self.bullet
    }
}

/// Data a unit inherits from the shot that spawned it
#[derive(Debug, Clone, Default)]
pub struct SpawnInfo {
    pub origin: OriginIds,
    pub position_in_shot: Vec2,
    pub rotation_at_spawn: f32,
    pub shot_index_in_pattern: u32,
    pub shot_time_in_pattern: f32,
    pub pattern_index_in_emitter: u32,
    pub pattern_shots_fired: u32,
    pub pattern_time_played: f32,
}

/// One live projectile, and potential sub-emitter
#[derive(Debug, Clone)]
pub struct EmissionUnit {
    pub id: UnitId,
    /// Unit that emitted this one (lookup only)
    pub parent: Option<UnitId>,
    pub origin: OriginIds,
    /// Normalized position inside the spawning shot, in [0, 1]²
    pub position_in_shot: Vec2,
    /// Heading at spawn, degrees
    pub rotation_at_spawn: f32,
    pub shot_index_in_pattern: u32,
    pub shot_time_in_pattern: f32,
    pub pattern_index_in_emitter: u32,
    /// Emitting pattern's shot count when this unit spawned
    pub pattern_shots_fired: u32,
    /// Emitting pattern's play time when this unit spawned
    pub pattern_time_played: f32,
    /// Per-unit seed in [0, 1)
    pub random_seed: f32,
    pub time_alive: f32,
    /// Custom named parameters
    pub custom: ParameterTable,
    memo: HashMap<u32, f32>,
}

impl EmissionUnit {
    fn new(id: UnitId, parent: Option<UnitId>, info: SpawnInfo, random_seed: f32) -> Self {
        Self {
            id,
            parent,
            origin: info.origin,
            position_in_shot: info.position_in_shot,
            rotation_at_spawn: info.rotation_at_spawn,
            shot_index_in_pattern: info.shot_index_in_pattern,
            shot_time_in_pattern: info.shot_time_in_pattern,
            pattern_index_in_emitter: info.pattern_index_in_emitter,
            pattern_shots_fired: info.pattern_shots_fired,
            pattern_time_played: info.pattern_time_played,
            random_seed,
            time_alive: 0.0,
            custom: ParameterTable::new(),
            memo: HashMap::new(),
        }
    }

    /// Previously computed shared random value for a hash
    pub fn memoized(&self, hash: u32) -> Option<f32> {
        self.memo.get(&hash).copied()
    }

    /// Store a shared random value. An existing entry is kept.
    pub fn memoize(&mut self, hash: u32, value: f32) -> f32 {
        *self.memo.entry(hash).or_insert(value)
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Forget every shared random value (unit death or reuse)
    pub fn flush_memo(&mut self) {
        self.memo.clear();
    }
}

/// Owner of every live unit and of the deterministic RNG
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    /// Run seed for reproducibility
    pub seed: u64,
    rng: Pcg32,
    /// Live units (sorted by id for determinism)
    units: Vec<EmissionUnit>,
    next_id: u32,
}

impl UnitRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            units: Vec::new(),
            next_id: 1,
        }
    }

    fn next_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Fresh uniform draw in [0, 1)
    pub fn random_unit(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    /// Spawn a unit with no emitter (a top-level emitter)
    pub fn spawn_root(&mut self, origin: OriginIds) -> UnitId {
        self.spawn(
            None,
            SpawnInfo {
                origin,
                position_in_shot: Vec2::splat(0.5),
                ..Default::default()
            },
        )
    }

    /// Spawn a unit. A parent that is not alive is still recorded; walks
    /// through it simply stop there.
    pub fn spawn(&mut self, parent: Option<UnitId>, info: SpawnInfo) -> UnitId {
        let id = self.next_unit_id();
        let seed = self.random_unit();
        self.units.push(EmissionUnit::new(id, parent, info, seed));
        id
    }

    /// Materialize one child unit per spawn of a resolved shot
    pub fn spawn_shot(&mut self, shot: &ResolvedShot, meta: &EmissionMetadata) -> Vec<UnitId> {
        shot.spawns
            .iter()
            .map(|spawn| {
                self.spawn(
                    meta.emitter,
                    SpawnInfo {
                        origin: OriginIds {
                            pattern: meta.pattern_id,
                            shot: shot.shot_id,
                            bullet: spawn.bullet.0,
                        },
                        position_in_shot: spawn.position_in_shot,
                        rotation_at_spawn: spawn.rotation,
                        shot_index_in_pattern: meta.shot_index_in_pattern,
                        shot_time_in_pattern: meta.shot_time_in_pattern,
                        pattern_index_in_emitter: meta.pattern_index_in_emitter,
                        pattern_shots_fired: meta.shot_index_in_pattern + 1,
                        pattern_time_played: meta.shot_time_in_pattern,
                    },
                )
            })
            .collect()
    }

    pub fn get(&self, id: UnitId) -> Option<&EmissionUnit> {
        self.units
            .binary_search_by_key(&id, |u| u.id)
            .ok()
            .map(|i| &self.units[i])
    }

    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut EmissionUnit> {
        match self.units.binary_search_by_key(&id, |u| u.id) {
            Ok(i) => Some(&mut self.units[i]),
            Err(_) => None,
        }
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.get(id).is_some()
    }

    /// Walk `distance` parent links up from `id`.
    /// `None` if any unit along the way is gone or has no parent.
    pub fn ancestor_id(&self, id: UnitId, distance: u32) -> Option<UnitId> {
        let mut current = self.get(id)?;
        for _ in 0..distance {
            current = self.get(current.parent?)?;
        }
        Some(current.id)
    }

    pub fn ancestor(&self, id: UnitId, distance: u32) -> Option<&EmissionUnit> {
        self.ancestor_id(id, distance).and_then(|a| self.get(a))
    }

    /// Remove a unit, flushing its memo. Children keep their dangling link.
    pub fn despawn(&mut self, id: UnitId) -> bool {
        match self.units.binary_search_by_key(&id, |u| u.id) {
            Ok(i) => {
                let mut unit = self.units.remove(i);
                unit.flush_memo();
                true
            }
            Err(_) => false,
        }
    }

    /// Age every live unit
    pub fn advance(&mut self, dt: f32) {
        for unit in &mut self.units {
            unit.time_alive += dt;
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Live units in id order. Ids only grow and removal keeps order, so the
    /// vector never needs re-sorting.
    pub fn iter(&self) -> impl Iterator<Item = &EmissionUnit> {
        self.units.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(pattern: u32, shot: u32, bullet: u32) -> OriginIds {
        OriginIds { pattern, shot, bullet }
    }

    #[test]
    fn test_spawn_assigns_monotonic_ids() {
        let mut registry = UnitRegistry::new(7);
        let a = registry.spawn_root(origin(1, 2, 3));
        let b = registry.spawn(Some(a), SpawnInfo::default());
        assert_eq!(a, UnitId(1));
        assert_eq!(b, UnitId(2));
        assert_eq!(registry.get(b).unwrap().parent, Some(a));
        let seed = registry.get(a).unwrap().random_seed;
        assert!((0.0..1.0).contains(&seed));
    }

    #[test]
    fn test_units_stay_in_id_order() {
        let mut registry = UnitRegistry::new(3);
        let ids: Vec<UnitId> = (0..6).map(|_| registry.spawn(None, SpawnInfo::default())).collect();
        registry.despawn(ids[1]);
        registry.despawn(ids[4]);
        let late = registry.spawn(Some(ids[0]), SpawnInfo::default());

        let order: Vec<UnitId> = registry.iter().map(|u| u.id).collect();
        assert_eq!(order, vec![ids[0], ids[2], ids[3], ids[5], late]);
        assert!(registry.get(late).is_some());
        assert!(registry.get(ids[4]).is_none());
    }

    #[test]
    fn test_ancestor_walk() {
        let mut registry = UnitRegistry::new(1);
        let root = registry.spawn_root(OriginIds::default());
        let child = registry.spawn(Some(root), SpawnInfo::default());
        let grandchild = registry.spawn(Some(child), SpawnInfo::default());

        assert_eq!(registry.ancestor_id(grandchild, 0), Some(grandchild));
        assert_eq!(registry.ancestor_id(grandchild, 2), Some(root));
        assert_eq!(registry.ancestor_id(grandchild, 3), None);

        registry.despawn(child);
        assert_eq!(registry.ancestor_id(grandchild, 1), None);
        assert_eq!(registry.ancestor_id(grandchild, 0), Some(grandchild));
    }

    #[test]
    fn test_memo_keeps_first_value() {
        let mut registry = UnitRegistry::new(3);
        let id = registry.spawn_root(OriginIds::default());
        let unit = registry.get_mut(id).unwrap();
        assert_eq!(unit.memoize(42, 0.25), 0.25);
        assert_eq!(unit.memoize(42, 0.75), 0.25);
        assert_eq!(unit.memoized(42), Some(0.25));
        unit.flush_memo();
        assert_eq!(unit.memoized(42), None);
    }

    #[test]
    fn test_same_seed_same_unit_seeds() {
        let mut a = UnitRegistry::new(99);
        let mut b = UnitRegistry::new(99);
        for _ in 0..4 {
            let ua = a.spawn_root(OriginIds::default());
            let ub = b.spawn_root(OriginIds::default());
            assert_eq!(a.get(ua).unwrap().random_seed, b.get(ub).unwrap().random_seed);
        }
    }

    #[test]
    fn test_advance_ages_units() {
        let mut registry = UnitRegistry::new(0);
        let id = registry.spawn_root(OriginIds::default());
        registry.advance(0.5);
        registry.advance(0.25);
        assert!((registry.get(id).unwrap().time_alive - 0.75).abs() < 1e-6);
        assert!(registry.despawn(id));
        assert!(!registry.despawn(id));
        assert!(registry.is_empty());
    }
}
