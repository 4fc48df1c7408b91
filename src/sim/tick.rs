//! Pattern interpreter
//!
//! Advances a pattern instance frame by frame. Each update runs instructions
//! until a Wait leaves time on the clock, the pattern yields, or it ends.

use std::sync::Arc;

use super::instruction::{InstructionKind, ParamResolver, PatternInstruction, PatternProgram, Timing};
use super::reroll::{Channel, RerollCache};
use super::shot::EmissionMetadata;
use super::state::{UnitId, UnitRegistry};
use crate::host::{AudioPlayer, FlowCommand, MicroAction, PatternHost, PatternTarget, VfxPlayer};
use crate::param::{DynamicParam, DynamicValue, LivePattern, OwnerKind, ParameterSource, ResolveContext};

/// An open loop
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFrame {
    /// First instruction of the loop body
    pub start_index: usize,
    pub iterations_remaining: i32,
    pub iterations_finished: u32,
    pub endless: bool,
    /// Changes every time the loop begins an iteration
    pub iteration_stamp: u64,
    /// A positive Wait ran during the current iteration
    pub waited: bool,
}

/// Lifecycle state of a pattern instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternStatus {
    #[default]
    Playing,
    Paused,
    Stopped,
    /// Ran past its last instruction (or died)
    Done,
}

/// What happened during one update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    pub instructions_executed: u32,
    pub shots_fired: u32,
    /// Unterminated loops closed at the end of the list
    pub loops_repaired: u32,
    /// The frame ended on a yield rather than a wait
    pub yielded: bool,
}

/// Control flow after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    JumpTo(usize),
    /// Advance, then end the frame
    Yield,
    /// Jump, then end the frame
    YieldAt(usize),
    /// End the frame without moving the pointer
    Halt,
    Finish,
}

/// A pattern program running on an emitter
#[derive(Debug, Clone)]
pub struct PatternInstance {
    program: Arc<PatternProgram>,
    /// Emitter the pattern runs on
    pub unit: UnitId,
    /// Position of the pattern among its emitter's patterns
    pub pattern_index: u32,
    pointer: usize,
    loop_stack: Vec<LoopFrame>,
    wait_time_remaining: f32,
    status: PatternStatus,
    shots_fired: u32,
    time_played: f32,
    cache: RerollCache,
    next_stamp: u64,
}

impl PatternInstance {
    pub fn new(program: Arc<PatternProgram>, unit: UnitId, pattern_index: u32) -> Self {
        let status = if program.is_empty() {
            PatternStatus::Done
        } else {
            PatternStatus::Playing
        };
        Self {
            program,
            unit,
            pattern_index,
            pointer: 0,
            loop_stack: Vec::new(),
            wait_time_remaining: 0.0,
            status,
            shots_fired: 0,
            time_played: 0.0,
            cache: RerollCache::new(),
            next_stamp: 0,
        }
    }

    pub fn program(&self) -> &Arc<PatternProgram> {
        &self.program
    }

    pub fn status(&self) -> PatternStatus {
        self.status
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn loop_depth(&self) -> usize {
        self.loop_stack.len()
    }

    pub fn shots_fired(&self) -> u32 {
        self.shots_fired
    }

    pub fn time_played(&self) -> f32 {
        self.time_played
    }

    pub fn wait_time_remaining(&self) -> f32 {
        self.wait_time_remaining
    }

    /// Live state seen by shot and pattern parameters
    pub fn live(&self) -> LivePattern {
        LivePattern {
            pattern_index: self.pattern_index,
            shots_fired: self.shots_fired,
            time_played: self.time_played,
        }
    }

    /// Resume a paused pattern, or restart a stopped or finished one
    pub fn play(&mut self) {
        match self.status {
            PatternStatus::Playing => {}
            PatternStatus::Paused => self.status = PatternStatus::Playing,
            PatternStatus::Stopped | PatternStatus::Done => self.reboot(),
        }
    }

    pub fn pause(&mut self) {
        if self.status == PatternStatus::Playing {
            self.status = PatternStatus::Paused;
        }
    }

    /// Reset to the start and stay still until played
    pub fn stop(&mut self) {
        self.reset();
        self.status = PatternStatus::Stopped;
    }

    /// Reset to the start and keep playing
    pub fn reboot(&mut self) {
        self.reset();
        self.status = if self.program.is_empty() {
            PatternStatus::Done
        } else {
            PatternStatus::Playing
        };
        log::info!("pattern {} rebooted on unit {:?}", self.program.id, self.unit);
    }

    /// Apply a lifecycle command
    pub fn command(&mut self, command: FlowCommand) {
        match command {
            FlowCommand::Play => self.play(),
            FlowCommand::Pause => self.pause(),
            FlowCommand::Stop => self.stop(),
            FlowCommand::Reboot => self.reboot(),
        }
    }

    fn reset(&mut self) {
        self.pointer = 0;
        self.loop_stack.clear();
        self.wait_time_remaining = 0.0;
        self.shots_fired = 0;
        self.time_played = 0.0;
        self.cache.clear();
    }

    fn next_stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    /// Advance the pattern by `dt` seconds
    pub fn update<H: PatternHost + ?Sized>(
        &mut self,
        dt: f32,
        registry: &mut UnitRegistry,
        globals: &dyn ParameterSource,
        host: &mut H,
    ) -> FrameReport {
        let mut report = FrameReport::default();
        if self.status != PatternStatus::Playing {
            return report;
        }

        self.time_played += dt;
        self.wait_time_remaining -= dt;

        let program = Arc::clone(&self.program);
        while self.wait_time_remaining <= 0.0 {
            if self.pointer >= program.instructions.len() {
                if self.loop_stack.pop().is_some() {
                    // Unterminated loop: close it as if its EndLoop ran out
                    report.loops_repaired += 1;
                    log::debug!("pattern {}: closing unterminated loop", program.id);
                    continue;
                }
                self.status = PatternStatus::Done;
                break;
            }

            let index = self.pointer;
            let instruction = &program.instructions[index];
            if !instruction.enabled {
                self.pointer += 1;
                continue;
            }

            report.instructions_executed = report.instructions_executed.saturating_add(1);
            match self.execute(index, instruction, registry, globals, host, &mut report) {
                Flow::Continue => self.pointer += 1,
                Flow::JumpTo(target) => self.pointer = target,
                Flow::Yield => {
                    self.pointer += 1;
                    report.yielded = true;
                    break;
                }
                Flow::YieldAt(target) => {
                    self.pointer = target;
                    report.yielded = true;
                    break;
                }
                Flow::Halt => break,
                Flow::Finish => {
                    self.status = PatternStatus::Done;
                    break;
                }
            }
        }
        report
    }

    fn execute<H: PatternHost + ?Sized>(
        &mut self,
        index: usize,
        instruction: &PatternInstruction,
        registry: &mut UnitRegistry,
        globals: &dyn ParameterSource,
        host: &mut H,
        report: &mut FrameReport,
    ) -> Flow {
        let unit = self.unit;
        let live = self.live();

        match &instruction.kind {
            InstructionKind::Wait(param) => {
                let seconds = self.main_value(index, param, registry, globals).max(0.0);
                self.wait_time_remaining = seconds;
                if seconds > 0.0 {
                    for frame in &mut self.loop_stack {
                        frame.waited = true;
                    }
                }
                Flow::Continue
            }

            InstructionKind::Shoot(shot) => {
                let mut ctx = ResolveContext::new(registry, globals).with_unit(unit).with_live(live);
                let resolved = shot.resolve(&mut ctx);
                let meta = EmissionMetadata {
                    emitter: Some(unit),
                    pattern_id: self.program.id,
                    pattern_index_in_emitter: self.pattern_index,
                    shot_index_in_pattern: self.shots_fired,
                    shot_time_in_pattern: self.time_played,
                };
                host.spawn_projectiles(&resolved, &meta);
                self.shots_fired += 1;
                report.shots_fired += 1;
                Flow::Continue
            }

            InstructionKind::BeginLoop { iterations, endless } => {
                let count = self.main_value(index, iterations, registry, globals);
                if !endless && count <= 0 {
                    return Flow::JumpTo(self.program.skip_loop(index));
                }
                let stamp = self.next_stamp();
                self.loop_stack.push(LoopFrame {
                    start_index: index + 1,
                    iterations_remaining: count,
                    iterations_finished: 0,
                    endless: *endless,
                    iteration_stamp: stamp,
                    waited: false,
                });
                Flow::Continue
            }

            InstructionKind::EndLoop => self.end_loop(),

            InstructionKind::PlayAudio(param) => {
                let cue = self.main_value(index, param, registry, globals);
                AudioPlayer::play(host, cue);
                Flow::Continue
            }

            InstructionKind::PlayVfx(param) => {
                let vfx = self.main_value(index, param, registry, globals);
                VfxPlayer::play(host, unit, vfx);
                Flow::Continue
            }

            InstructionKind::StopVfx(param) => {
                let vfx = self.main_value(index, param, registry, globals);
                VfxPlayer::stop(host, unit, vfx);
                Flow::Continue
            }

            InstructionKind::Die => {
                host.kill(unit);
                Flow::Finish
            }

            InstructionKind::SetCustomScalar { name, value } => {
                let value = self.main_value(index, value, registry, globals);
                if let Some(emitter) = registry.get_mut(unit) {
                    emitter.custom.set(name.as_str(), value);
                }
                Flow::Continue
            }

            InstructionKind::AddCustomScalar { name, delta } => {
                let delta = self.main_value(index, delta, registry, globals);
                if let Some(emitter) = registry.get_mut(unit) {
                    if emitter.custom.add_scalar(name, delta).is_none() {
                        log::debug!("custom parameter '{name}' is not a scalar, add ignored");
                    }
                }
                Flow::Continue
            }

            kind => {
                if let Some((command, target)) = kind.flow() {
                    return self.flow_command(command, target, host);
                }
                if let Some((module, enabled)) = kind.module_toggle() {
                    host.set_module_enabled(unit, module, enabled);
                    return Flow::Continue;
                }
                self.mutate(index, instruction, registry, globals, host);
                Flow::Continue
            }
        }
    }

    fn end_loop(&mut self) -> Flow {
        let stamp = self.next_stamp + 1;
        let Some(frame) = self.loop_stack.last_mut() else {
            log::debug!("pattern {}: EndLoop without an open loop", self.program.id);
            return Flow::Continue;
        };

        frame.iterations_finished += 1;
        if !frame.endless {
            frame.iterations_remaining -= 1;
        }
        if !frame.endless && frame.iterations_remaining <= 0 {
            self.loop_stack.pop();
            return Flow::Continue;
        }

        let start = frame.start_index;
        let idle = frame.endless && !frame.waited;
        frame.waited = false;
        frame.iteration_stamp = stamp;
        self.next_stamp = stamp;

        // An endless loop that never waited would spin forever
        if idle { Flow::YieldAt(start) } else { Flow::JumpTo(start) }
    }

    fn flow_command<H: PatternHost + ?Sized>(
        &mut self,
        command: FlowCommand,
        target: &PatternTarget,
        host: &mut H,
    ) -> Flow {
        if *target != PatternTarget::ThisPattern {
            host.control_pattern(self.unit, target, command);
            return Flow::Continue;
        }
        match command {
            FlowCommand::Play => Flow::Continue,
            FlowCommand::Pause => {
                self.status = PatternStatus::Paused;
                Flow::Yield
            }
            FlowCommand::Stop => {
                self.stop();
                Flow::Halt
            }
            FlowCommand::Reboot => {
                self.reboot();
                Flow::Halt
            }
        }
    }

    fn mutate<H: PatternHost + ?Sized>(
        &mut self,
        index: usize,
        instruction: &PatternInstruction,
        registry: &mut UnitRegistry,
        globals: &dyn ParameterSource,
        host: &mut H,
    ) {
        let unit = self.unit;
        let mut ctx = ResolveContext::new(registry, globals).with_unit(unit).with_live(self.live());
        let mut resolver = ChannelResolver {
            cache: &mut self.cache,
            frames: &self.loop_stack,
            index,
            channel: Channel::Main,
            ctx: &mut ctx,
        };
        let Some(mutation) = instruction.kind.mutation(&mut resolver) else {
            return;
        };

        match &instruction.timing {
            Timing::Progressive { duration, easing } if mutation.is_interpolable() => {
                resolver.channel = Channel::Duration;
                let duration = resolver.value(duration).max(0.0);
                resolver.channel = Channel::Easing;
                let easing = resolver.value(easing);
                host.schedule(unit, MicroAction { mutation, duration, easing });
            }
            _ => host.apply(unit, mutation),
        }
    }

    /// Resolve the main channel of an instruction through the reroll cache
    fn main_value<T: DynamicValue>(
        &mut self,
        index: usize,
        param: &DynamicParam<T>,
        registry: &mut UnitRegistry,
        globals: &dyn ParameterSource,
    ) -> T {
        let mut ctx = ResolveContext::new(registry, globals).with_unit(self.unit).with_live(self.live());
        self.cache
            .resolve((index, Channel::Main), param, &self.loop_stack, OwnerKind::Pattern, &mut ctx)
    }
}

struct ChannelResolver<'c, 'r> {
    cache: &'c mut RerollCache,
    frames: &'c [LoopFrame],
    index: usize,
    channel: Channel,
    ctx: &'c mut ResolveContext<'r>,
}

impl ParamResolver for ChannelResolver<'_, '_> {
    fn value<T: DynamicValue>(&mut self, param: &DynamicParam<T>) -> T {
        self.cache
            .resolve((self.index, self.channel), param, self.frames, OwnerKind::Pattern, self.ctx)
    }
}
