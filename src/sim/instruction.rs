//! Pattern programs
//!
//! A pattern is a flat list of instructions run by a
//! [`PatternInstance`](super::tick::PatternInstance). Loops are delimited by
//! `BeginLoop`/`EndLoop` pairs; a malformed list is repaired at run time.

use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::shot::ShotDescriptor;
use crate::curve::{Curve, WrapMode};
use crate::host::{CurveAction, CurveTarget, FlowCommand, Module, Mutation, PatternTarget, TagOp, TargetPreference};
use crate::param::{Color, DynamicParam, DynamicValue, ObjectRef};

/// What an instruction does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstructionKind {
    // Main
    Wait(DynamicParam<f32>),
    Shoot(Box<ShotDescriptor>),
    BeginLoop {
        iterations: DynamicParam<i32>,
        #[serde(default)]
        endless: bool,
    },
    EndLoop,
    PlayAudio(DynamicParam<ObjectRef>),
    PlayVfx(DynamicParam<ObjectRef>),
    StopVfx(DynamicParam<ObjectRef>),
    Die,

    // Transform
    TranslateGlobal(DynamicParam<Vec2>),
    TranslateLocal(DynamicParam<Vec2>),
    SetWorldPosition(DynamicParam<Vec2>),
    SetLocalPosition(DynamicParam<Vec2>),
    Rotate(DynamicParam<f32>),
    SetWorldRotation(DynamicParam<f32>),
    SetLocalRotation(DynamicParam<f32>),
    SetSpeed(DynamicParam<f32>),
    MultiplySpeed(DynamicParam<f32>),
    SetAngularSpeed(DynamicParam<f32>),
    MultiplyAngularSpeed(DynamicParam<f32>),
    SetScale(DynamicParam<f32>),
    MultiplyScale(DynamicParam<f32>),

    // Homing
    EnableHoming,
    DisableHoming,
    TurnToTarget(DynamicParam<f32>),
    ChangeTarget(TargetPreference),
    SetHomingSpeed(DynamicParam<f32>),
    MultiplyHomingSpeed(DynamicParam<f32>),
    ChangeHomingTags {
        #[serde(default)]
        op: TagOp,
        tags: DynamicParam<String>,
    },

    // Curve control
    EnableCurve(CurveTarget),
    DisableCurve(CurveTarget),
    PlayCurve(CurveTarget),
    PauseCurve(CurveTarget),
    RewindCurve(CurveTarget),
    ResetCurve(CurveTarget),

    // Curve values
    SetCurve {
        target: CurveTarget,
        curve: DynamicParam<Curve>,
    },
    SetCurveDuration {
        target: CurveTarget,
        duration: DynamicParam<f32>,
    },
    MultiplyCurveDuration {
        target: CurveTarget,
        factor: DynamicParam<f32>,
    },
    SetCurveWrapMode {
        target: CurveTarget,
        wrap: WrapMode,
    },
    SetCurveProgress {
        target: CurveTarget,
        progress: DynamicParam<f32>,
    },

    // Graphics
    EnableRenderer,
    DisableRenderer,
    SetColor(DynamicParam<Color>),
    AddColor(DynamicParam<Color>),
    MultiplyColor(DynamicParam<Color>),
    OverlayColor(DynamicParam<Color>),
    SetAlpha(DynamicParam<f32>),
    AddAlpha(DynamicParam<f32>),
    MultiplyAlpha(DynamicParam<f32>),

    // Collision
    EnableCollision,
    DisableCollision,
    ChangeCollisionTags {
        #[serde(default)]
        op: TagOp,
        tags: DynamicParam<String>,
    },
    SetCollisionSize(DynamicParam<f32>),
    MultiplyCollisionSize(DynamicParam<f32>),

    // Custom parameters
    SetCustomScalar {
        name: String,
        value: DynamicParam<f32>,
    },
    AddCustomScalar {
        name: String,
        delta: DynamicParam<f32>,
    },

    // Pattern flow
    PlayPattern(PatternTarget),
    PausePattern(PatternTarget),
    StopPattern(PatternTarget),
    RebootPattern(PatternTarget),
}

/// Resolves the main value of an instruction
pub trait ParamResolver {
    fn value<T: DynamicValue>(&mut self, param: &DynamicParam<T>) -> T;
}

impl InstructionKind {
    /// Resolve the projectile mutation this instruction performs, if any
    pub fn mutation<R: ParamResolver>(&self, r: &mut R) -> Option<Mutation> {
        use InstructionKind as K;

        let mutation = match self {
            K::TranslateGlobal(p) => Mutation::TranslateGlobal(r.value(p)),
            K::TranslateLocal(p) => Mutation::TranslateLocal(r.value(p)),
            K::SetWorldPosition(p) => Mutation::SetWorldPosition(r.value(p)),
            K::SetLocalPosition(p) => Mutation::SetLocalPosition(r.value(p)),
            K::Rotate(p) => Mutation::Rotate(r.value(p)),
            K::SetWorldRotation(p) => Mutation::SetWorldRotation(r.value(p)),
            K::SetLocalRotation(p) => Mutation::SetLocalRotation(r.value(p)),
            K::SetSpeed(p) => Mutation::SetSpeed(r.value(p)),
            K::MultiplySpeed(p) => Mutation::MultiplySpeed(r.value(p)),
            K::SetAngularSpeed(p) => Mutation::SetAngularSpeed(r.value(p)),
            K::MultiplyAngularSpeed(p) => Mutation::MultiplyAngularSpeed(r.value(p)),
            K::SetScale(p) => Mutation::SetScale(r.value(p)),
            K::MultiplyScale(p) => Mutation::MultiplyScale(r.value(p)),

            K::TurnToTarget(p) => Mutation::TurnToTarget(r.value(p).clamp(0.0, 1.0)),
            K::ChangeTarget(preference) => Mutation::ChangeTarget(*preference),
            K::SetHomingSpeed(p) => Mutation::SetHomingSpeed(r.value(p)),
            K::MultiplyHomingSpeed(p) => Mutation::MultiplyHomingSpeed(r.value(p)),
            K::ChangeHomingTags { op, tags } => Mutation::ChangeHomingTags {
                op: *op,
                tags: r.value(tags),
            },

            K::PlayCurve(target) => curve_playback(*target, CurveAction::Play),
            K::PauseCurve(target) => curve_playback(*target, CurveAction::Pause),
            K::RewindCurve(target) => curve_playback(*target, CurveAction::Rewind),
            K::ResetCurve(target) => curve_playback(*target, CurveAction::Reset),

            K::SetCurve { target, curve } => Mutation::SetCurve {
                target: *target,
                curve: r.value(curve),
            },
            K::SetCurveDuration { target, duration } => Mutation::SetCurveDuration {
                target: *target,
                duration: r.value(duration).max(0.0),
            },
            K::MultiplyCurveDuration { target, factor } => Mutation::MultiplyCurveDuration {
                target: *target,
                factor: r.value(factor),
            },
            K::SetCurveWrapMode { target, wrap } => Mutation::SetCurveWrapMode {
                target: *target,
                wrap: *wrap,
            },
            K::SetCurveProgress { target, progress } => Mutation::SetCurveProgress {
                target: *target,
                progress: r.value(progress).clamp(0.0, 1.0),
            },

            K::SetColor(p) => Mutation::SetColor(r.value(p)),
            K::AddColor(p) => Mutation::AddColor(r.value(p)),
            K::MultiplyColor(p) => Mutation::MultiplyColor(r.value(p)),
            K::OverlayColor(p) => Mutation::OverlayColor(r.value(p)),
            K::SetAlpha(p) => Mutation::SetAlpha(r.value(p)),
            K::AddAlpha(p) => Mutation::AddAlpha(r.value(p)),
            K::MultiplyAlpha(p) => Mutation::MultiplyAlpha(r.value(p)),

            K::ChangeCollisionTags { op, tags } => Mutation::ChangeCollisionTags {
                op: *op,
                tags: r.value(tags),
            },
            K::SetCollisionSize(p) => Mutation::SetCollisionSize(r.value(p).max(0.0)),
            K::MultiplyCollisionSize(p) => Mutation::MultiplyCollisionSize(r.value(p)),

            _ => return None,
        };
        Some(mutation)
    }

    /// Module switched on or off by this instruction, if any
    pub fn module_toggle(&self) -> Option<(Module, bool)> {
        use InstructionKind as K;

        match self {
            K::EnableHoming => Some((Module::Homing, true)),
            K::DisableHoming => Some((Module::Homing, false)),
            K::EnableCurve(target) => Some((Module::Curve(*target), true)),
            K::DisableCurve(target) => Some((Module::Curve(*target), false)),
            K::EnableRenderer => Some((Module::Renderer, true)),
            K::DisableRenderer => Some((Module::Renderer, false)),
            K::EnableCollision => Some((Module::Collision, true)),
            K::DisableCollision => Some((Module::Collision, false)),
            _ => None,
        }
    }

    /// Lifecycle command and target of a pattern flow instruction
    pub fn flow(&self) -> Option<(FlowCommand, &PatternTarget)> {
        match self {
            InstructionKind::PlayPattern(target) => Some((FlowCommand::Play, target)),
            InstructionKind::PausePattern(target) => Some((FlowCommand::Pause, target)),
            InstructionKind::StopPattern(target) => Some((FlowCommand::Stop, target)),
            InstructionKind::RebootPattern(target) => Some((FlowCommand::Reboot, target)),
            _ => None,
        }
    }

    pub fn is_loop_start(&self) -> bool {
        matches!(self, InstructionKind::BeginLoop { .. })
    }

    pub fn is_loop_end(&self) -> bool {
        matches!(self, InstructionKind::EndLoop)
    }
}

fn curve_playback(target: CurveTarget, action: CurveAction) -> Mutation {
    Mutation::CurvePlayback { target, action }
}

/// How a mutation is applied
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Timing {
    #[default]
    Instant,
    /// Spread over a duration with an easing curve (interpolable mutations only)
    Progressive {
        duration: DynamicParam<f32>,
        easing: DynamicParam<Curve>,
    },
}

impl Timing {
    pub fn progressive(duration: f32, easing: Curve) -> Self {
        Timing::Progressive {
            duration: DynamicParam::fixed(duration),
            easing: DynamicParam::fixed(easing),
        }
    }
}

/// One entry of a pattern program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternInstruction {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub kind: InstructionKind,
    #[serde(default)]
    pub timing: Timing,
}

fn enabled_by_default() -> bool {
    true
}

impl PatternInstruction {
    pub fn new(kind: InstructionKind) -> Self {
        Self {
            enabled: true,
            kind,
            timing: Timing::Instant,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn wait(seconds: f32) -> Self {
        Self::new(InstructionKind::Wait(DynamicParam::fixed(seconds)))
    }

    pub fn begin_loop(iterations: i32) -> Self {
        Self::new(InstructionKind::BeginLoop {
            iterations: DynamicParam::fixed(iterations),
            endless: false,
        })
    }

    pub fn endless_loop() -> Self {
        Self::new(InstructionKind::BeginLoop {
            iterations: DynamicParam::fixed(0),
            endless: true,
        })
    }

    pub fn end_loop() -> Self {
        Self::new(InstructionKind::EndLoop)
    }

    pub fn shoot(shot: ShotDescriptor) -> Self {
        Self::new(InstructionKind::Shoot(Box::new(shot)))
    }
}

/// An authored pattern, shared by every instance playing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternProgram {
    /// Stable asset id
    pub id: u32,
    pub instructions: Vec<PatternInstruction>,
}

impl PatternProgram {
    pub fn new(id: u32, instructions: Vec<PatternInstruction>) -> Self {
        Self { id, instructions }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Parse a program from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Index just past the `EndLoop` matching the `BeginLoop` at `begin`.
    ///
    /// Only enabled loop instructions count. Without a match, the end of the list.
    pub fn skip_loop(&self, begin: usize) -> usize {
        let mut depth = 0u32;
        for (i, instruction) in self.instructions.iter().enumerate().skip(begin + 1) {
            if !instruction.enabled {
                continue;
            }
            if instruction.kind.is_loop_start() {
                depth += 1;
            } else if instruction.kind.is_loop_end() {
                if depth == 0 {
                    return i + 1;
                }
                depth -= 1;
            }
        }
        self.instructions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resolves every parameter to its default value
    struct Defaults;

    impl ParamResolver for Defaults {
        fn value<T: DynamicValue>(&mut self, param: &DynamicParam<T>) -> T {
            param.default_value().clone()
        }
    }

    #[test]
    fn test_mutation_mapping() {
        let kind = InstructionKind::SetSpeed(DynamicParam::fixed(4.0));
        assert_eq!(kind.mutation(&mut Defaults), Some(Mutation::SetSpeed(4.0)));

        let progress = InstructionKind::SetCurveProgress {
            target: CurveTarget::Scale,
            progress: DynamicParam::fixed(3.0),
        };
        assert_eq!(
            progress.mutation(&mut Defaults),
            Some(Mutation::SetCurveProgress {
                target: CurveTarget::Scale,
                progress: 1.0
            })
        );

        assert_eq!(InstructionKind::EndLoop.mutation(&mut Defaults), None);
        assert_eq!(InstructionKind::EnableHoming.mutation(&mut Defaults), None);
    }

    #[test]
    fn test_module_toggles_and_flow() {
        assert_eq!(
            InstructionKind::DisableCurve(CurveTarget::Alpha).module_toggle(),
            Some((Module::Curve(CurveTarget::Alpha), false))
        );
        assert_eq!(InstructionKind::Die.module_toggle(), None);
        assert_eq!(
            InstructionKind::StopPattern(PatternTarget::ByIndex(2)).flow(),
            Some((FlowCommand::Stop, &PatternTarget::ByIndex(2)))
        );
    }

    #[test]
    fn test_skip_loop_is_nesting_aware() {
        let program = PatternProgram::new(
            1,
            vec![
                PatternInstruction::begin_loop(0),
                PatternInstruction::begin_loop(2),
                PatternInstruction::wait(1.0),
                PatternInstruction::end_loop(),
                PatternInstruction::end_loop().disabled(),
                PatternInstruction::end_loop(),
                PatternInstruction::wait(1.0),
            ],
        );
        assert_eq!(program.skip_loop(0), 6);
        assert_eq!(program.skip_loop(1), 4);

        let unterminated = PatternProgram::new(1, vec![PatternInstruction::begin_loop(0), PatternInstruction::wait(1.0)]);
        assert_eq!(unterminated.skip_loop(0), 2);
    }

    #[test]
    fn test_program_from_json() {
        let json = r#"{
            "id": 7,
            "instructions": [
                { "kind": { "BeginLoop": { "iterations": { "tree": { "nodes": [
                    { "mode": "Fixed", "default_value": 3 }
                ] } } } } },
                { "kind": { "Wait": { "tree": { "nodes": [
                    { "mode": "Fixed", "default_value": 0.5 }
                ] } } } },
                { "kind": "EndLoop", "enabled": false }
            ]
        }"#;
        let program = PatternProgram::from_json(json).unwrap();
        assert_eq!(program.id, 7);
        assert_eq!(program.len(), 3);
        assert!(program.instructions[0].enabled);
        assert!(!program.instructions[2].enabled);
        assert_eq!(program.instructions[0].timing, Timing::Instant);
        match &program.instructions[1].kind {
            InstructionKind::Wait(p) => assert_eq!(*p.default_value(), 0.5),
            other => panic!("unexpected {other:?}"),
        }

        let round = PatternProgram::from_json(&program.to_json().unwrap()).unwrap();
        assert_eq!(round, program);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(PatternProgram::from_json("{\"id\": 1}").is_err());
    }

    #[test]
    fn test_tree_without_root_is_rejected() {
        let json = r#"{"id":1,"instructions":[{"kind":{"Wait":{"tree":{"nodes":[]}}}}]}"#;
        let err = PatternProgram::from_json(json).unwrap_err();
        assert!(err.to_string().contains("no root node"));
    }
}
