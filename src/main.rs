//! Barrage demo runner
//!
//! Plays a pattern program on a single emitter and logs every shot.
//!
//! Usage: `barrage [settings.json] [program.json]`

use std::sync::Arc;

use glam::Vec2;

use barrage::Settings;
use barrage::audio::AudioQueue;
use barrage::curve::Curve;
use barrage::host::{
    AudioPlayer, FlowCommand, MicroAction, Module, Mutation, PatternControl, PatternTarget,
    ProjectileSpawner, UnitModules, VfxPlayer,
};
use barrage::param::{DynamicParam, InterpolationSpec, ObjectRef, ParamTree, ParameterTable, TreeIssue};
use barrage::sim::{
    EmissionMetadata, InstructionKind, OriginIds, PatternInstance, PatternInstruction, PatternProgram,
    PatternStatus, ResolvedShot, ShotDescriptor, ShotModifier, Timing, UnitId, UnitRegistry,
};

/// Hard stop for programs that never finish
const MAX_DEMO_FRAMES: u32 = 60 * 60;

/// Host that logs what the pattern asks for and queues shots for spawning
struct DemoHost {
    audio: AudioQueue,
    pending: Vec<(ResolvedShot, EmissionMetadata)>,
}

impl UnitModules for DemoHost {
    fn apply(&mut self, unit: UnitId, mutation: Mutation) {
        log::info!("unit {}: {mutation:?}", unit.0);
    }

    fn schedule(&mut self, unit: UnitId, action: MicroAction) {
        log::info!("unit {}: {:?} over {:.2}s", unit.0, action.mutation, action.duration);
    }

    fn set_module_enabled(&mut self, unit: UnitId, module: Module, enabled: bool) {
        log::info!("unit {}: {module:?} enabled = {enabled}", unit.0);
    }

    fn kill(&mut self, unit: UnitId) {
        log::info!("unit {} killed", unit.0);
    }
}

impl ProjectileSpawner for DemoHost {
    fn spawn_projectiles(&mut self, shot: &ResolvedShot, meta: &EmissionMetadata) {
        self.pending.push((shot.clone(), meta.clone()));
    }
}

impl AudioPlayer for DemoHost {
    fn play(&mut self, cue: ObjectRef) {
        AudioPlayer::play(&mut self.audio, cue);
    }
}

impl VfxPlayer for DemoHost {
    fn play(&mut self, unit: UnitId, vfx: ObjectRef) {
        log::info!("unit {}: vfx {} on", unit.0, vfx.0);
    }

    fn stop(&mut self, unit: UnitId, vfx: ObjectRef) {
        log::info!("unit {}: vfx {} off", unit.0, vfx.0);
    }
}

impl PatternControl for DemoHost {
    fn control_pattern(&mut self, unit: UnitId, target: &PatternTarget, command: FlowCommand) {
        log::info!("unit {}: {command:?} {target:?}", unit.0);
    }
}

/// Three fanned shots of five bullets, half a second apart
fn demo_program() -> PatternProgram {
    let shot = ShotDescriptor::new(10, 5, ObjectRef(1))
        .with_modifier(ShotModifier::SpreadAngle(DynamicParam::new(
            ParamTree::from_to(30.0, 90.0, InterpolationSpec::global("difficulty")),
            1,
        )))
        .with_modifier(ShotModifier::TranslateLocal(DynamicParam::fixed(Vec2::new(0.0, 0.5))));

    PatternProgram::new(
        1,
        vec![
            PatternInstruction::new(InstructionKind::PlayAudio(DynamicParam::fixed(ObjectRef(7)))),
            PatternInstruction::begin_loop(3),
            PatternInstruction::shoot(shot),
            PatternInstruction::new(InstructionKind::Rotate(DynamicParam::new(
                ParamTree::from_to(-15.0, 15.0, InterpolationSpec::random()),
                2,
            )))
            .with_timing(Timing::progressive(0.25, Curve::ease_in_out())),
            PatternInstruction::wait(0.5),
            PatternInstruction::end_loop(),
        ],
    )
}

fn load_program(path: &str) -> Option<PatternProgram> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(err) => {
            log::warn!("Could not read program {path}: {err}");
            return None;
        }
    };
    match PatternProgram::from_json(&json) {
        Ok(program) => Some(program),
        Err(err) => {
            log::warn!("Invalid program {path}: {err}");
            None
        }
    }
}

/// Structural issues in the numeric parameters of a program
fn program_issues(program: &PatternProgram) -> Vec<(usize, TreeIssue)> {
    let mut issues = Vec::new();
    for (index, instruction) in program.instructions.iter().enumerate() {
        let found = match &instruction.kind {
            InstructionKind::Wait(p) | InstructionKind::Rotate(p) | InstructionKind::SetSpeed(p) => {
                p.tree.validate()
            }
            InstructionKind::BeginLoop { iterations, .. } => iterations.tree.validate(),
            InstructionKind::Shoot(shot) => shot.bullet_count.tree.validate(),
            _ => Vec::new(),
        };
        issues.extend(found.into_iter().map(|issue| (index, issue)));
    }
    issues
}

fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let settings = args.next().map(Settings::load).unwrap_or_default();
    let program = args
        .next()
        .and_then(|path| load_program(&path))
        .unwrap_or_else(demo_program);
    log::info!(
        "Barrage starting: pattern {} ({} instructions), seed {}",
        program.id,
        program.len(),
        settings.seed
    );

    if settings.log_recoveries {
        for (index, issue) in program_issues(&program) {
            log::info!("instruction {index}: {issue:?} will resolve to a default value");
        }
    }

    let mut registry = UnitRegistry::new(settings.seed);
    let emitter = registry.spawn_root(OriginIds {
        pattern: program.id,
        shot: 0,
        bullet: 0,
    });
    let globals = ParameterTable::new().with("difficulty", 0.5f32);
    let mut host = DemoHost {
        audio: AudioQueue::from_settings(&settings.audio),
        pending: Vec::new(),
    };
    let mut pattern = PatternInstance::new(Arc::new(program), emitter, 0);

    let mut frame = 0u32;
    while pattern.status() == PatternStatus::Playing && frame < MAX_DEMO_FRAMES {
        let report = pattern.update(settings.frame_dt, &mut registry, &globals, &mut host);
        registry.advance(settings.frame_dt);

        for (shot, meta) in host.pending.drain(..) {
            let units = registry.spawn_shot(&shot, &meta);
            let headings: Vec<String> = shot.spawns.iter().map(|s| format!("{:.1}", s.rotation)).collect();
            log::info!(
                "frame {frame}: shot {} #{} spawned {} units, headings [{}]",
                shot.shot_id,
                meta.shot_index_in_pattern,
                units.len(),
                headings.join(", ")
            );
        }
        for cue in host.audio.drain() {
            log::info!("frame {frame}: audio cue {} at volume {:.2}", cue.cue.0, cue.volume);
        }
        if report.loops_repaired > 0 {
            log::info!("frame {frame}: closed {} unterminated loops", report.loops_repaired);
        }
        frame += 1;
    }

    log::info!(
        "Pattern {:?} after {frame} frames: {} shots, {} live units",
        pattern.status(),
        pattern.shots_fired(),
        registry.len()
    );
}
