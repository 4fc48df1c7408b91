//! Host-side collaborators of a running pattern
//!
//! The runtime never moves, draws or collides projectiles itself. Everything
//! an instruction does to the world goes through these traits, implemented
//! by whatever engine embeds the runtime.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::curve::{Curve, WrapMode};
use crate::param::{Color, ObjectRef};
use crate::sim::shot::{EmissionMetadata, ResolvedShot};
use crate::sim::state::UnitId;

/// Curve-driven property of a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveTarget {
    Speed,
    AngularSpeed,
    Scale,
    HomingSpeed,
    Color,
    Alpha,
}

/// Playback control of a curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveAction {
    Play,
    Pause,
    Rewind,
    Reset,
}

/// How a tag list is edited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TagOp {
    #[default]
    Set,
    Add,
    Remove,
}

/// Which candidate a homing projectile picks as its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetPreference {
    #[default]
    Closest,
    Farthest,
    Random,
    Oldest,
    Newest,
}

/// Toggleable projectile module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Module {
    Homing,
    Curve(CurveTarget),
    Renderer,
    Collision,
}

/// A resolved change to a projectile
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    TranslateGlobal(Vec2),
    TranslateLocal(Vec2),
    SetWorldPosition(Vec2),
    SetLocalPosition(Vec2),
    Rotate(f32),
    SetWorldRotation(f32),
    SetLocalRotation(f32),
    SetSpeed(f32),
    MultiplySpeed(f32),
    SetAngularSpeed(f32),
    MultiplyAngularSpeed(f32),
    SetScale(f32),
    MultiplyScale(f32),

    /// Turn toward the current target by a ratio in [0, 1]
    TurnToTarget(f32),
    ChangeTarget(TargetPreference),
    SetHomingSpeed(f32),
    MultiplyHomingSpeed(f32),
    ChangeHomingTags { op: TagOp, tags: String },

    CurvePlayback { target: CurveTarget, action: CurveAction },
    SetCurve { target: CurveTarget, curve: Curve },
    SetCurveDuration { target: CurveTarget, duration: f32 },
    MultiplyCurveDuration { target: CurveTarget, factor: f32 },
    SetCurveWrapMode { target: CurveTarget, wrap: WrapMode },
    SetCurveProgress { target: CurveTarget, progress: f32 },

    SetColor(Color),
    AddColor(Color),
    MultiplyColor(Color),
    OverlayColor(Color),
    SetAlpha(f32),
    AddAlpha(f32),
    MultiplyAlpha(f32),

    ChangeCollisionTags { op: TagOp, tags: String },
    SetCollisionSize(f32),
    MultiplyCollisionSize(f32),
}

impl Mutation {
    /// Whether the mutation can be spread over time
    pub fn is_interpolable(&self) -> bool {
        !matches!(
            self,
            Mutation::ChangeTarget(_)
                | Mutation::ChangeHomingTags { .. }
                | Mutation::CurvePlayback { .. }
                | Mutation::SetCurve { .. }
                | Mutation::SetCurveWrapMode { .. }
                | Mutation::ChangeCollisionTags { .. }
        )
    }
}

/// A mutation applied progressively by the host
#[derive(Debug, Clone, PartialEq)]
pub struct MicroAction {
    pub mutation: Mutation,
    /// Seconds, never negative
    pub duration: f32,
    /// Progress remap over the duration
    pub easing: Curve,
}

/// Pattern lifecycle command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowCommand {
    Play,
    Pause,
    Stop,
    Reboot,
}

/// Which pattern of an emitter a flow instruction addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternTarget {
    ThisPattern,
    ByIndex(u32),
    ByTag(String),
}

/// Projectile behavior modules
pub trait UnitModules {
    fn apply(&mut self, unit: UnitId, mutation: Mutation);
    fn schedule(&mut self, unit: UnitId, action: MicroAction);
    fn set_module_enabled(&mut self, unit: UnitId, module: Module, enabled: bool);
    fn kill(&mut self, unit: UnitId);
}

/// Turns resolved shots into live projectiles
pub trait ProjectileSpawner {
    fn spawn_projectiles(&mut self, shot: &ResolvedShot, meta: &EmissionMetadata);
}

/// Plays audio cues
pub trait AudioPlayer {
    fn play(&mut self, cue: ObjectRef);
}

/// Plays and stops visual effects
pub trait VfxPlayer {
    fn play(&mut self, unit: UnitId, vfx: ObjectRef);
    fn stop(&mut self, unit: UnitId, vfx: ObjectRef);
}

/// Lifecycle control of an emitter's other patterns
pub trait PatternControl {
    fn control_pattern(&mut self, unit: UnitId, target: &PatternTarget, command: FlowCommand);
}

/// Everything a pattern needs from its host
pub trait PatternHost: UnitModules + ProjectileSpawner + AudioPlayer + VfxPlayer + PatternControl {}

impl<T> PatternHost for T where T: UnitModules + ProjectileSpawner + AudioPlayer + VfxPlayer + PatternControl {}

#[cfg(test)]
pub(crate) mod recording {
    //! Host that records every call, for tests

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum HostCall {
        Apply(UnitId, Mutation),
        Schedule(UnitId, MicroAction),
        Module(UnitId, Module, bool),
        Kill(UnitId),
        Audio(ObjectRef),
        VfxPlay(UnitId, ObjectRef),
        VfxStop(UnitId, ObjectRef),
        Control(UnitId, PatternTarget, FlowCommand),
    }

    #[derive(Debug, Default)]
    pub struct RecordingHost {
        pub calls: Vec<HostCall>,
        pub shots: Vec<(ResolvedShot, EmissionMetadata)>,
    }

    impl UnitModules for RecordingHost {
        fn apply(&mut self, unit: UnitId, mutation: Mutation) {
            self.calls.push(HostCall::Apply(unit, mutation));
        }

        fn schedule(&mut self, unit: UnitId, action: MicroAction) {
            self.calls.push(HostCall::Schedule(unit, action));
        }

        fn set_module_enabled(&mut self, unit: UnitId, module: Module, enabled: bool) {
            self.calls.push(HostCall::Module(unit, module, enabled));
        }

        fn kill(&mut self, unit: UnitId) {
            self.calls.push(HostCall::Kill(unit));
        }
    }

    impl ProjectileSpawner for RecordingHost {
        fn spawn_projectiles(&mut self, shot: &ResolvedShot, meta: &EmissionMetadata) {
            self.shots.push((shot.clone(), meta.clone()));
        }
    }

    impl AudioPlayer for RecordingHost {
        fn play(&mut self, cue: ObjectRef) {
            self.calls.push(HostCall::Audio(cue));
        }
    }

    impl VfxPlayer for RecordingHost {
        fn play(&mut self, unit: UnitId, vfx: ObjectRef) {
            self.calls.push(HostCall::VfxPlay(unit, vfx));
        }

        fn stop(&mut self, unit: UnitId, vfx: ObjectRef) {
            self.calls.push(HostCall::VfxStop(unit, vfx));
        }
    }

    impl PatternControl for RecordingHost {
        fn control_pattern(&mut self, unit: UnitId, target: &PatternTarget, command: FlowCommand) {
            self.calls.push(HostCall::Control(unit, target.clone(), command));
        }
    }
}
