//! When an instruction re-resolves its dynamic parameters
//!
//! Every instruction has up to three channels (main value, progressive
//! duration, progressive easing). Each channel keeps its last resolved value
//! and re-resolves according to its parameter's [`RerollPolicy`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::tick::LoopFrame;
use crate::param::{DynamicParam, DynamicValue, OwnerKind, Payload, ResolveContext};

/// Re-resolution policy of one dynamic parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RerollPolicy {
    /// Resolve on every execution
    #[default]
    WheneverCalled,
    /// Resolve on first execution, then reuse until the pattern restarts
    OnlyOncePerPattern,
    /// Resolve when a given enclosing loop has started a new, selected iteration
    AtCertainLoops(LoopRerollRule),
}

/// Which iterations of which loop trigger a reroll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopRerollRule {
    /// 0 is the innermost open loop
    #[serde(default)]
    pub loop_depth: u32,
    #[serde(default)]
    pub every_iteration: bool,
    /// Iterations are matched against the mask modulo this period
    #[serde(default = "default_period")]
    pub period: u32,
    /// Bit `n` selects iteration `n` of each period
    #[serde(default)]
    pub iteration_mask: u32,
}

fn default_period() -> u32 {
    1
}

impl LoopRerollRule {
    pub fn every_iteration(loop_depth: u32) -> Self {
        Self {
            loop_depth,
            every_iteration: true,
            period: default_period(),
            iteration_mask: 0,
        }
    }

    pub fn masked(loop_depth: u32, period: u32, iteration_mask: u32) -> Self {
        Self {
            loop_depth,
            every_iteration: false,
            period,
            iteration_mask,
        }
    }

    /// Whether the iteration a frame is currently in is selected
    fn selects(&self, iterations_finished: u32) -> bool {
        if self.every_iteration {
            return true;
        }
        let period = self.period.clamp(1, 32);
        let bit = iterations_finished % period;
        self.iteration_mask & (1 << bit) != 0
    }
}

/// Value channel of an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Main,
    Duration,
    Easing,
}

#[derive(Debug, Clone)]
struct CachedValue {
    payload: Payload,
    /// Iteration stamp of the governing loop frame when resolved
    stamp: Option<u64>,
}

/// Loop frame a rule refers to, counted from the innermost
fn frame_at_depth(frames: &[LoopFrame], depth: u32) -> Option<&LoopFrame> {
    frames.iter().rev().nth(depth as usize)
}

/// Last resolved values of a pattern's instruction channels
#[derive(Debug, Clone, Default)]
pub struct RerollCache {
    values: HashMap<(usize, Channel), CachedValue>,
}

impl RerollCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every cached value (pattern reboot or stop)
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether the channel at `key` must be resolved again
    pub fn is_reroll_necessary(
        &self,
        key: (usize, Channel),
        policy: &RerollPolicy,
        frames: &[LoopFrame],
    ) -> bool {
        let Some(cached) = self.values.get(&key) else {
            return true;
        };
        match policy {
            RerollPolicy::WheneverCalled => true,
            RerollPolicy::OnlyOncePerPattern => false,
            RerollPolicy::AtCertainLoops(rule) => match frame_at_depth(frames, rule.loop_depth) {
                Some(frame) => {
                    cached.stamp != Some(frame.iteration_stamp) && rule.selects(frame.iterations_finished)
                }
                None => false,
            },
        }
    }

    /// Value of a parameter for one execution, resolved or reused
    pub fn resolve<T: DynamicValue>(
        &mut self,
        key: (usize, Channel),
        param: &DynamicParam<T>,
        frames: &[LoopFrame],
        owner: OwnerKind,
        ctx: &mut ResolveContext<'_>,
    ) -> T {
        if !self.is_reroll_necessary(key, &param.reroll, frames) {
            if let Some(value) = self.values.get(&key).and_then(|c| T::from_payload(&c.payload)) {
                return value;
            }
        }

        let value = param.resolve(owner, ctx);
        match &param.reroll {
            RerollPolicy::WheneverCalled => {}
            RerollPolicy::OnlyOncePerPattern => {
                self.store(key, value.clone(), None);
            }
            RerollPolicy::AtCertainLoops(rule) => {
                let stamp = frame_at_depth(frames, rule.loop_depth).map(|f| f.iteration_stamp);
                self.store(key, value.clone(), stamp);
            }
        }
        value
    }

    fn store<T: DynamicValue>(&mut self, key: (usize, Channel), value: T, stamp: Option<u64>) {
        self.values.insert(
            key,
            CachedValue {
                payload: value.into_payload(),
                stamp,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{InterpolationSpec, ParamTree, ParameterTable};
    use crate::sim::state::UnitRegistry;

    fn frame(stamp: u64, finished: u32) -> LoopFrame {
        LoopFrame {
            start_index: 0,
            iterations_remaining: 10,
            iterations_finished: finished,
            endless: false,
            iteration_stamp: stamp,
            waited: false,
        }
    }

    fn random_param(policy: RerollPolicy) -> DynamicParam<f32> {
        DynamicParam::new(ParamTree::from_to(0.0, 1000.0, InterpolationSpec::random()), 3)
            .with_reroll(policy)
    }

    #[test]
    fn test_first_resolution_always_happens() {
        let cache = RerollCache::new();
        for policy in [
            RerollPolicy::WheneverCalled,
            RerollPolicy::OnlyOncePerPattern,
            RerollPolicy::AtCertainLoops(LoopRerollRule::every_iteration(0)),
        ] {
            assert!(cache.is_reroll_necessary((0, Channel::Main), &policy, &[]));
        }
    }

    #[test]
    fn test_only_once_reuses_until_cleared() {
        let mut registry = UnitRegistry::new(8);
        let globals = ParameterTable::new();
        let mut ctx = ResolveContext::new(&mut registry, &globals);
        let mut cache = RerollCache::new();
        let param = random_param(RerollPolicy::OnlyOncePerPattern);

        let first = cache.resolve((2, Channel::Main), &param, &[], OwnerKind::Pattern, &mut ctx);
        for _ in 0..5 {
            let again = cache.resolve((2, Channel::Main), &param, &[], OwnerKind::Pattern, &mut ctx);
            assert_eq!(first, again);
        }
        // Another channel of the same instruction is independent
        assert!(cache.is_reroll_necessary((2, Channel::Duration), &param.reroll, &[]));

        cache.clear();
        let draws: Vec<f32> = (0..4)
            .map(|_| {
                cache.clear();
                cache.resolve((2, Channel::Main), &param, &[], OwnerKind::Pattern, &mut ctx)
            })
            .collect();
        assert!(draws.iter().any(|v| *v != first));
    }

    #[test]
    fn test_whenever_called_never_caches() {
        let mut registry = UnitRegistry::new(8);
        let globals = ParameterTable::new();
        let mut ctx = ResolveContext::new(&mut registry, &globals);
        let mut cache = RerollCache::new();
        let param = random_param(RerollPolicy::WheneverCalled);
        cache.resolve((0, Channel::Main), &param, &[], OwnerKind::Pattern, &mut ctx);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_loop_rule_rerolls_once_per_iteration() {
        let mut registry = UnitRegistry::new(8);
        let globals = ParameterTable::new();
        let mut ctx = ResolveContext::new(&mut registry, &globals);
        let mut cache = RerollCache::new();
        let param = random_param(RerollPolicy::AtCertainLoops(LoopRerollRule::every_iteration(0)));
        let key = (1, Channel::Main);

        let frames = [frame(1, 0)];
        let a = cache.resolve(key, &param, &frames, OwnerKind::Pattern, &mut ctx);
        assert_eq!(a, cache.resolve(key, &param, &frames, OwnerKind::Pattern, &mut ctx));

        // New iteration of the same loop
        let frames = [frame(2, 1)];
        assert!(cache.is_reroll_necessary(key, &param.reroll, &frames));
        cache.resolve(key, &param, &frames, OwnerKind::Pattern, &mut ctx);
        assert!(!cache.is_reroll_necessary(key, &param.reroll, &frames));
    }

    #[test]
    fn test_inner_loop_progress_does_not_reroll_outer_rule() {
        let rule = RerollPolicy::AtCertainLoops(LoopRerollRule::every_iteration(1));
        let mut cache = RerollCache::new();
        cache.store((0, Channel::Main), 1.0f32, Some(5));

        let outer = frame(5, 0);
        assert!(!cache.is_reroll_necessary((0, Channel::Main), &rule, &[outer.clone(), frame(6, 0)]));
        assert!(!cache.is_reroll_necessary((0, Channel::Main), &rule, &[outer, frame(9, 3)]));
        assert!(cache.is_reroll_necessary((0, Channel::Main), &rule, &[frame(10, 1), frame(11, 0)]));
    }

    #[test]
    fn test_iteration_mask() {
        // Period 3, iterations 0 and 2 selected
        let rule = RerollPolicy::AtCertainLoops(LoopRerollRule::masked(0, 3, 0b101));
        let mut cache = RerollCache::new();
        cache.store((0, Channel::Main), 1.0f32, Some(0));

        assert!(!cache.is_reroll_necessary((0, Channel::Main), &rule, &[frame(1, 1)]));
        assert!(cache.is_reroll_necessary((0, Channel::Main), &rule, &[frame(1, 2)]));
        assert!(cache.is_reroll_necessary((0, Channel::Main), &rule, &[frame(1, 3)]));
        assert!(!cache.is_reroll_necessary((0, Channel::Main), &rule, &[frame(1, 4)]));
    }

    #[test]
    fn test_missing_loop_acts_like_once_per_pattern() {
        let rule = RerollPolicy::AtCertainLoops(LoopRerollRule::every_iteration(2));
        let mut cache = RerollCache::new();
        cache.store((0, Channel::Main), 1.0f32, None);
        assert!(!cache.is_reroll_necessary((0, Channel::Main), &rule, &[frame(1, 0)]));
        assert!(!cache.is_reroll_necessary((0, Channel::Main), &rule, &[]));
    }
}
