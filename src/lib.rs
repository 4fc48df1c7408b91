//! Barrage - a deterministic bullet-pattern runtime
//!
//! Core modules:
//! - `param`: Dynamic parameter trees and their resolver
//! - `curve`: Keyframe curves and color gradients
//! - `sim`: Emission hierarchy, shared randomness, pattern interpreter, shot layout
//! - `host`: Collaborator contracts (projectile modules, spawning, VFX, pattern control)
//! - `audio`: Audio collaborator and a volume-aware cue queue
//! - `settings`: Runtime configuration

pub mod audio;
pub mod curve;
pub mod host;
pub mod param;
pub mod settings;
pub mod sim;

pub use settings::Settings;

use glam::Vec2;

/// Runtime configuration constants
pub mod consts {
    /// Default frame step used by the demo binary (60 Hz)
    pub const DEFAULT_FRAME_DT: f32 = 1.0 / 60.0;

    /// Deepest recursion allowed while resolving a parameter tree.
    /// Anything deeper is treated as a cycle and falls back to a default value.
    pub const MAX_RESOLVE_DEPTH: u32 = 64;

    /// Shared-random hashes are kept within 24 bits
    pub const SHARED_HASH_MASK: u32 = 0x00FF_FFFF;
    /// Number of hash bits folded into a shared random value
    pub const SHARED_HASH_BITS: u32 = 23;
    /// Large prime used to spread shot order across the hash space
    pub const SHOT_ORDER_PRIME: u32 = 805_306_457;
    /// Prime used to derive per-node operation ids inside a tree
    pub const NODE_INDEX_PRIME: u32 = 2_654_435_761;

    /// Default period for cyclic hierarchy facets expressed in degrees
    pub const FULL_TURN_DEGREES: f32 = 360.0;

    /// Upper bound on bullets in a single shot
    pub const MAX_SHOT_BULLETS: u32 = 4096;
    /// Node visits a single resolution may make before falling back to defaults
    pub const MAX_RESOLVE_VISITS: u32 = 4096;
}

/// Normalize an angle in degrees to [0, 360)
#[inline]
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(consts::FULL_TURN_DEGREES);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= consts::FULL_TURN_DEGREES {
        0.0
    } else {
        wrapped
    }
}

/// Forward direction for a heading in degrees.
///
/// Heading 0 points along +Y, positive angles turn counter-clockwise.
#[inline]
pub fn heading_to_direction(degrees: f32) -> Vec2 {
    let radians = degrees.to_radians();
    Vec2::new(-radians.sin(), radians.cos())
}

/// Right-hand direction for a heading in degrees (forward rotated by -90°)
#[inline]
pub fn heading_to_right(degrees: f32) -> Vec2 {
    let radians = degrees.to_radians();
    Vec2::new(radians.cos(), radians.sin())
}

/// Heading in degrees, normalized to [0, 360), of a direction vector
#[inline]
pub fn direction_to_heading(dir: Vec2) -> f32 {
    normalize_degrees((-dir.x).atan2(dir.y).to_degrees())
}

/// Rotate a point around a pivot by the given angle in degrees
#[inline]
pub fn rotate_around(point: Vec2, pivot: Vec2, degrees: f32) -> Vec2 {
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();
    let offset = point - pivot;
    pivot + Vec2::new(offset.x * cos - offset.y * sin, offset.x * sin + offset.y * cos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_heading_directions() {
        let up = heading_to_direction(0.0);
        assert!((up - Vec2::Y).length() < 1e-5);
        let left = heading_to_direction(90.0);
        assert!((left - Vec2::NEG_X).length() < 1e-5);
        let right = heading_to_right(0.0);
        assert!((right - Vec2::X).length() < 1e-5);
    }

    #[test]
    fn test_direction_to_heading() {
        assert!(direction_to_heading(Vec2::Y).abs() < 1e-4);
        assert!((direction_to_heading(Vec2::NEG_X) - 90.0).abs() < 1e-4);
        assert!((direction_to_heading(Vec2::NEG_Y) - 180.0).abs() < 1e-4);
        assert!((direction_to_heading(Vec2::X) - 270.0).abs() < 1e-4);
    }

    #[test]
    fn test_rotate_around_pivot() {
        let p = rotate_around(Vec2::new(2.0, 1.0), Vec2::new(1.0, 1.0), 90.0);
        assert!((p - Vec2::new(1.0, 2.0)).length() < 1e-5);
    }

    proptest! {
        #[test]
        fn normalized_degrees_stay_in_range(angle in -10_000.0f32..10_000.0) {
            let n = normalize_degrees(angle);
            prop_assert!((0.0..360.0).contains(&n));
        }

        #[test]
        fn heading_round_trips_through_direction(angle in 0.5f32..359.5) {
            let back = direction_to_heading(heading_to_direction(angle));
            prop_assert!((back - angle).abs() < 1e-2);
        }
    }
}
