//! Interpolation factors
//!
//! FromTo and Blend nodes pick between their children with a selector in
//! [0, 1]. The selector comes from a raw factor (random, hierarchy state or a
//! global parameter) remapped through a curve.

use serde::{Deserialize, Serialize};

use super::node::OwnerKind;
use super::resolve::ResolveContext;
use super::source::ParameterSource;
use crate::consts::FULL_TURN_DEGREES;
use crate::curve::{Curve, WrapMode};
use crate::normalize_degrees;
use crate::sim::random::random_factor;
use crate::sim::state::EmissionUnit;

/// Random factor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RandomFactor {
    /// Reuse one value for every instance sharing the same hierarchy key
    #[serde(default)]
    pub share_across_instances: bool,
    /// Which ancestor supplies the seed and stores the shared value
    #[serde(default)]
    pub relative_to_ancestor: u32,
    /// Fold the shot's order into the key so each shot gets its own value
    #[serde(default)]
    pub different_per_shot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BulletFacet {
    PositionInShotX,
    PositionInShotY,
    RotationAtSpawn,
    TimeAlive,
    CustomScalar(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShotFacet {
    SpawnOrder,
    SpawnTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternFacet {
    Index,
    ShotsFired,
    TimePlayed,
}

/// Which entity is queried and which of its values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HierarchyFacet {
    Bullet(BulletFacet),
    Shot(ShotFacet),
    Pattern(PatternFacet),
}

/// Hierarchy state factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyQuery {
    #[serde(default)]
    pub ancestor_distance: u32,
    pub facet: HierarchyFacet,
    /// Length of one cycle for unbounded facets
    #[serde(default = "default_period")]
    pub period: f32,
    #[serde(default)]
    pub wrap: WrapMode,
}

fn default_period() -> f32 {
    1.0
}

impl HierarchyQuery {
    pub fn new(facet: HierarchyFacet) -> Self {
        let period = match facet {
            HierarchyFacet::Bullet(BulletFacet::RotationAtSpawn) => FULL_TURN_DEGREES,
            _ => default_period(),
        };
        Self {
            ancestor_distance: 0,
            facet,
            period,
            wrap: WrapMode::Clamp,
        }
    }

    pub fn at_distance(mut self, distance: u32) -> Self {
        self.ancestor_distance = distance;
        self
    }

    pub fn with_period(mut self, period: f32, wrap: WrapMode) -> Self {
        self.period = period;
        self.wrap = wrap;
        self
    }

    /// Fold an unbounded facet value into [0, 1]
    fn cycle(&self, value: f32) -> f32 {
        let period = if self.period > 0.0 { self.period } else { default_period() };
        self.wrap.apply(value / period)
    }
}

/// Source of the raw factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterpolationFactor {
    Random(RandomFactor),
    HierarchyState(HierarchyQuery),
    GlobalParameter(String),
    /// Reserved; always yields a raw factor of 0
    Combined,
}

/// Full description of how a selector is computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationSpec {
    pub factor: InterpolationFactor,
    /// Remap applied to the raw factor
    #[serde(default)]
    pub curve: Curve,
}

impl Default for InterpolationSpec {
    fn default() -> Self {
        Self::random()
    }
}

impl InterpolationSpec {
    /// Fresh random value per resolution
    pub fn random() -> Self {
        Self {
            factor: InterpolationFactor::Random(RandomFactor::default()),
            curve: Curve::linear(),
        }
    }

    /// Random value shared by every instance under the given ancestor
    pub fn shared_random(relative_to_ancestor: u32, different_per_shot: bool) -> Self {
        Self {
            factor: InterpolationFactor::Random(RandomFactor {
                share_across_instances: true,
                relative_to_ancestor,
                different_per_shot,
            }),
            curve: Curve::linear(),
        }
    }

    pub fn hierarchy(query: HierarchyQuery) -> Self {
        Self {
            factor: InterpolationFactor::HierarchyState(query),
            curve: Curve::linear(),
        }
    }

    pub fn global(name: impl Into<String>) -> Self {
        Self {
            factor: InterpolationFactor::GlobalParameter(name.into()),
            curve: Curve::linear(),
        }
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }
}

/// Compute the selector in [0, 1] for a node
pub fn resolve_interpolation(
    spec: &InterpolationSpec,
    operation_id: u32,
    owner: OwnerKind,
    ctx: &mut ResolveContext<'_>,
) -> f32 {
    let raw = match &spec.factor {
        InterpolationFactor::Random(factor) => {
            random_factor(ctx.registry, ctx.unit, operation_id, factor)
        }
        InterpolationFactor::HierarchyState(query) => hierarchy_factor(query, owner, ctx),
        InterpolationFactor::GlobalParameter(name) => {
            ctx.globals.get_scalar(name).unwrap_or_else(|| {
                log::debug!("global parameter '{name}' missing, interpolation factor is 0");
                0.0
            })
        }
        InterpolationFactor::Combined => 0.0,
    };

    let selector = spec.curve.evaluate(raw);
    if selector.is_nan() { 0.0 } else { selector.clamp(0.0, 1.0) }
}

fn hierarchy_factor(query: &HierarchyQuery, owner: OwnerKind, ctx: &ResolveContext<'_>) -> f32 {
    // Shot and pattern parameters evaluated by a running pattern see that
    // pattern's live state at distance 0
    if query.ancestor_distance == 0 && owner != OwnerKind::Bullet {
        if let Some(live) = ctx.live {
            match &query.facet {
                HierarchyFacet::Shot(ShotFacet::SpawnOrder) => {
                    return query.cycle(live.shots_fired as f32);
                }
                HierarchyFacet::Shot(ShotFacet::SpawnTime) => return query.cycle(live.time_played),
                HierarchyFacet::Pattern(PatternFacet::Index) => {
                    return query.cycle(live.pattern_index as f32);
                }
                HierarchyFacet::Pattern(PatternFacet::ShotsFired) => {
                    return query.cycle(live.shots_fired as f32);
                }
                HierarchyFacet::Pattern(PatternFacet::TimePlayed) => {
                    return query.cycle(live.time_played);
                }
                HierarchyFacet::Bullet(_) => {}
            }
        }
    }

    let unit = ctx
        .unit
        .and_then(|id| ctx.registry.ancestor(id, query.ancestor_distance));
    match unit {
        Some(unit) => facet_value(query, unit),
        None => {
            log::debug!(
                "hierarchy factor {:?} has no unit at distance {}, factor is 0",
                query.facet,
                query.ancestor_distance
            );
            0.0
        }
    }
}

fn facet_value(query: &HierarchyQuery, unit: &EmissionUnit) -> f32 {
    match &query.facet {
        HierarchyFacet::Bullet(BulletFacet::PositionInShotX) => unit.position_in_shot.x.clamp(0.0, 1.0),
        HierarchyFacet::Bullet(BulletFacet::PositionInShotY) => unit.position_in_shot.y.clamp(0.0, 1.0),
        HierarchyFacet::Bullet(BulletFacet::RotationAtSpawn) => {
            query.cycle(normalize_degrees(unit.rotation_at_spawn))
        }
        HierarchyFacet::Bullet(BulletFacet::TimeAlive) => query.cycle(unit.time_alive),
        HierarchyFacet::Bullet(BulletFacet::CustomScalar(name)) => {
            query.cycle(unit.custom.get_scalar(name).unwrap_or(0.0))
        }
        HierarchyFacet::Shot(ShotFacet::SpawnOrder) => query.cycle(unit.shot_index_in_pattern as f32),
        HierarchyFacet::Shot(ShotFacet::SpawnTime) => query.cycle(unit.shot_time_in_pattern),
        HierarchyFacet::Pattern(PatternFacet::Index) => query.cycle(unit.pattern_index_in_emitter as f32),
        HierarchyFacet::Pattern(PatternFacet::ShotsFired) => query.cycle(unit.pattern_shots_fired as f32),
        HierarchyFacet::Pattern(PatternFacet::TimePlayed) => query.cycle(unit.pattern_time_played),
    }
}
