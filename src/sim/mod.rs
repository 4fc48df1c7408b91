//! Deterministic pattern simulation
//!
//! Everything that runs a pattern lives here. This module must stay
//! deterministic:
//! - Seeded RNG only
//! - Stable iteration order (by unit ID)
//! - No engine dependencies; the world is reached through `host` traits

pub mod instruction;
pub mod layout;
pub mod random;
pub mod reroll;
pub mod shot;
pub mod state;
pub mod tick;

pub use instruction::{InstructionKind, ParamResolver, PatternInstruction, PatternProgram, Timing};
pub use layout::{BulletSpawn, LayoutStep, Pivot, Selection, apply_layout};
pub use random::{SharedKey, random_factor, seeded_value, shared_key, shared_random};
pub use reroll::{Channel, LoopRerollRule, RerollCache, RerollPolicy};
pub use shot::{EmissionMetadata, ResolvedShot, ShotDescriptor, ShotModifier};
pub use state::{EmissionUnit, OriginIds, SpawnInfo, UnitId, UnitRegistry};
pub use tick::{FrameReport, LoopFrame, PatternInstance, PatternStatus};
