//! Authored shots and their resolution
//!
//! A [`ShotDescriptor`] holds dynamic parameters. Firing it resolves those
//! parameters into concrete [`LayoutStep`]s and runs the layout.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::layout::{BulletSpawn, LayoutStep, Pivot, Selection, apply_layout};
use super::state::UnitId;
use crate::consts::MAX_SHOT_BULLETS;
use crate::param::{DynamicParam, ObjectRef, OwnerKind, ResolveContext};

/// Authored layout operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShotModifier {
    Select(Selection),
    SelectAll,
    SpreadAngle(DynamicParam<f32>),
    SpacingAngle(DynamicParam<f32>),
    SpreadHorizontal(DynamicParam<f32>),
    SpreadVertical(DynamicParam<f32>),
    SpacingHorizontal(DynamicParam<f32>),
    SpacingVertical(DynamicParam<f32>),
    TranslateGlobal(DynamicParam<Vec2>),
    TranslateLocal(DynamicParam<Vec2>),
    SetPivot(DynamicParam<Vec2>),
    Rotate {
        degrees: DynamicParam<f32>,
        #[serde(default)]
        pivot: Pivot,
    },
    Scale {
        scale: DynamicParam<Vec2>,
        #[serde(default)]
        pivot: Pivot,
    },
    LookAt(DynamicParam<Vec2>),
    LookAway(DynamicParam<Vec2>),
    ResetCoordinates {
        position: bool,
        rotation: bool,
    },
    OverrideBullet(DynamicParam<ObjectRef>),
}

impl ShotModifier {
    /// Resolve into a concrete layout step (shot-owned parameters)
    pub fn resolve(&self, ctx: &mut ResolveContext<'_>) -> LayoutStep {
        let owner = OwnerKind::Shot;
        match self {
            ShotModifier::Select(selection) => LayoutStep::Select(selection.clone()),
            ShotModifier::SelectAll => LayoutStep::SelectAll,
            ShotModifier::SpreadAngle(p) => LayoutStep::SpreadAngle(p.resolve(owner, ctx)),
            ShotModifier::SpacingAngle(p) => LayoutStep::SpacingAngle(p.resolve(owner, ctx)),
            ShotModifier::SpreadHorizontal(p) => LayoutStep::SpreadHorizontal(p.resolve(owner, ctx)),
            ShotModifier::SpreadVertical(p) => LayoutStep::SpreadVertical(p.resolve(owner, ctx)),
            ShotModifier::SpacingHorizontal(p) => LayoutStep::SpacingHorizontal(p.resolve(owner, ctx)),
            ShotModifier::SpacingVertical(p) => LayoutStep::SpacingVertical(p.resolve(owner, ctx)),
            ShotModifier::TranslateGlobal(p) => LayoutStep::TranslateGlobal(p.resolve(owner, ctx)),
            ShotModifier::TranslateLocal(p) => LayoutStep::TranslateLocal(p.resolve(owner, ctx)),
            ShotModifier::SetPivot(p) => LayoutStep::SetPivot(p.resolve(owner, ctx)),
            ShotModifier::Rotate { degrees, pivot } => LayoutStep::Rotate {
                degrees: degrees.resolve(owner, ctx),
                pivot: *pivot,
            },
            ShotModifier::Scale { scale, pivot } => LayoutStep::Scale {
                scale: scale.resolve(owner, ctx),
                pivot: *pivot,
            },
            ShotModifier::LookAt(p) => LayoutStep::LookAt {
                target: p.resolve(owner, ctx),
            },
            ShotModifier::LookAway(p) => LayoutStep::LookAway {
                target: p.resolve(owner, ctx),
            },
            ShotModifier::ResetCoordinates { position, rotation } => LayoutStep::ResetCoordinates {
                position: *position,
                rotation: *rotation,
            },
            ShotModifier::OverrideBullet(p) => LayoutStep::OverrideBullet(p.resolve(owner, ctx)),
        }
    }
}

/// Authored shot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotDescriptor {
    /// Stable asset id, folded into shared-random hashes of spawned units
    pub id: u32,
    pub bullet_count: DynamicParam<i32>,
    pub bullet: DynamicParam<ObjectRef>,
    #[serde(default)]
    pub modifiers: Vec<ShotModifier>,
}

impl ShotDescriptor {
    pub fn new(id: u32, bullet_count: i32, bullet: ObjectRef) -> Self {
        Self {
            id,
            bullet_count: DynamicParam::fixed(bullet_count),
            bullet: DynamicParam::fixed(bullet),
            modifiers: Vec::new(),
        }
    }

    pub fn with_modifier(mut self, modifier: ShotModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Resolve every parameter and lay the shot out
    pub fn resolve(&self, ctx: &mut ResolveContext<'_>) -> ResolvedShot {
        let requested = self.bullet_count.resolve(OwnerKind::Shot, ctx);
        let count = requested.clamp(0, MAX_SHOT_BULLETS as i32) as usize;
        if requested > MAX_SHOT_BULLETS as i32 {
            log::warn!("shot {} asked for {requested} bullets, capped to {MAX_SHOT_BULLETS}", self.id);
        }
        let bullet = self.bullet.resolve(OwnerKind::Shot, ctx);
        let steps: Vec<LayoutStep> = self.modifiers.iter().map(|m| m.resolve(ctx)).collect();

        ResolvedShot {
            shot_id: self.id,
            spawns: apply_layout(count, bullet, &steps),
        }
    }
}

/// A shot ready to spawn
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedShot {
    pub shot_id: u32,
    pub spawns: Vec<BulletSpawn>,
}

/// Where a shot comes from, handed to the spawner with the shot
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionMetadata {
    pub emitter: Option<UnitId>,
    pub pattern_id: u32,
    pub pattern_index_in_emitter: u32,
    /// Shots fired by the pattern before this one
    pub shot_index_in_pattern: u32,
    /// Pattern play time when fired
    pub shot_time_in_pattern: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{InterpolationSpec, ParamTree, ParameterTable};
    use crate::sim::state::{OriginIds, UnitRegistry};

    #[test]
    fn test_resolve_fixed_shot() {
        let mut registry = UnitRegistry::new(0);
        let globals = ParameterTable::new();
        let mut ctx = ResolveContext::new(&mut registry, &globals);
        let shot = ShotDescriptor::new(12, 5, ObjectRef(3))
            .with_modifier(ShotModifier::SpreadAngle(DynamicParam::fixed(120.0)))
            .with_modifier(ShotModifier::TranslateLocal(DynamicParam::fixed(Vec2::new(0.0, 1.0))));

        let resolved = shot.resolve(&mut ctx);
        assert_eq!(resolved.shot_id, 12);
        assert_eq!(resolved.spawns.len(), 5);
        assert!(resolved.spawns.iter().all(|s| s.bullet == ObjectRef(3)));
        assert!((resolved.spawns[2].position - Vec2::Y).length() < 1e-5);
        assert!((resolved.spawns[0].rotation - 300.0).abs() < 1e-4);
    }

    #[test]
    fn test_negative_count_is_empty() {
        let mut registry = UnitRegistry::new(0);
        let globals = ParameterTable::new();
        let mut ctx = ResolveContext::new(&mut registry, &globals);
        let shot = ShotDescriptor::new(1, -4, ObjectRef(1));
        assert!(shot.resolve(&mut ctx).spawns.is_empty());
    }

    #[test]
    fn test_count_from_global() {
        let mut registry = UnitRegistry::new(0);
        let globals = ParameterTable::new().with("density", 1.0f32);
        let emitter = registry.spawn_root(OriginIds::default());
        let mut ctx = ResolveContext::new(&mut registry, &globals).with_unit(emitter);

        let mut shot = ShotDescriptor::new(1, 0, ObjectRef(1));
        shot.bullet_count = DynamicParam::new(ParamTree::from_to(2, 10, InterpolationSpec::global("density")), 4);
        assert_eq!(shot.resolve(&mut ctx).spawns.len(), 10);
    }
}
