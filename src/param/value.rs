//! Resolvable value types
//!
//! Every payload a parameter tree can produce implements [`DynamicValue`].
//! [`Payload`] is the untyped form used by parameter tables and reroll caches.

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::curve::{Curve, Gradient};

/// RGBA color with linear float channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const CLEAR: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    pub fn from_vec4(v: Vec4) -> Self {
        Self::rgba(v.x, v.y, v.z, v.w)
    }

    /// Same color with a different alpha
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Component-wise interpolation, exact at both ends
    pub fn lerp(self, to: Color, t: f32) -> Color {
        Color::rgba(
            lerp_f32(self.r, to.r, t),
            lerp_f32(self.g, to.g, t),
            lerp_f32(self.b, to.b, t),
            lerp_f32(self.a, to.a, t),
        )
    }
}

/// Stable handle to an external asset (audio clip, VFX, projectile descriptor, sub-pattern)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectRef(pub u32);

impl ObjectRef {
    pub const NONE: ObjectRef = ObjectRef(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Untyped parameter payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Color(Color),
    Curve(Curve),
    Text(String),
    Object(ObjectRef),
}

/// `from * (1 - t) + to * t`, which returns each endpoint bit-exactly
#[inline]
pub fn lerp_f32(from: f32, to: f32, t: f32) -> f32 {
    from * (1.0 - t) + to * t
}

/// A value a parameter tree can resolve to
pub trait DynamicValue: Clone + std::fmt::Debug {
    /// Interpolate between two resolved children.
    ///
    /// Must return `from` at `t == 0` and `to` at `t == 1`.
    fn lerp(from: &Self, to: &Self, t: f32) -> Self;

    /// Read a value out of an untyped payload, if the payload has a compatible type
    fn from_payload(payload: &Payload) -> Option<Self>;

    /// Wrap into an untyped payload
    fn into_payload(self) -> Payload;

    /// Sample a gradient. Only color-like values support this.
    fn sample_gradient(_gradient: &Gradient, _t: f32) -> Option<Self> {
        None
    }
}

/// Step interpolation for values with no meaningful blend
fn step<T: Clone>(from: &T, to: &T, t: f32) -> T {
    if t < 0.5 { from.clone() } else { to.clone() }
}

impl DynamicValue for f32 {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        lerp_f32(*from, *to, t)
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Float(v) => Some(*v),
            Payload::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Float(self)
    }
}

impl DynamicValue for i32 {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        if t <= 0.0 {
            return *from;
        }
        if t >= 1.0 {
            return *to;
        }
        lerp_f32(*from as f32, *to as f32, t).round() as i32
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Int(v) => Some(*v),
            Payload::Float(v) => Some(v.round() as i32),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Int(self)
    }
}

impl DynamicValue for bool {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        step(from, to, t)
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Bool(self)
    }
}

impl DynamicValue for Vec2 {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        *from * (1.0 - t) + *to * t
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Vec2(v) => Some(*v),
            Payload::Vec3(v) => Some(v.truncate()),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Vec2(self)
    }
}

impl DynamicValue for Vec3 {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        *from * (1.0 - t) + *to * t
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Vec3(v) => Some(*v),
            Payload::Vec2(v) => Some(v.extend(0.0)),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Vec3(self)
    }
}

impl DynamicValue for Vec4 {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        *from * (1.0 - t) + *to * t
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Vec4(v) => Some(*v),
            Payload::Color(c) => Some(c.to_vec4()),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Vec4(self)
    }
}

impl DynamicValue for Color {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        from.lerp(*to, t)
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Color(c) => Some(*c),
            Payload::Vec4(v) => Some(Color::from_vec4(*v)),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Color(self)
    }

    fn sample_gradient(gradient: &Gradient, t: f32) -> Option<Self> {
        Some(gradient.evaluate(t))
    }
}

impl DynamicValue for Curve {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        step(from, to, t)
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Curve(c) => Some(c.clone()),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Curve(self)
    }
}

impl DynamicValue for String {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        step(from, to, t)
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Text(self)
    }
}

impl DynamicValue for ObjectRef {
    fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        step(from, to, t)
    }

    fn from_payload(payload: &Payload) -> Option<Self> {
        match payload {
            Payload::Object(o) => Some(*o),
            _ => None,
        }
    }

    fn into_payload(self) -> Payload {
        Payload::Object(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_lerp_endpoints_exact() {
        let from = 0.1f32;
        let to = 0.3f32;
        assert_eq!(f32::lerp(&from, &to, 0.0), from);
        assert_eq!(f32::lerp(&from, &to, 1.0), to);
        assert!((f32::lerp(&from, &to, 0.5) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_int_lerp_rounds_to_nearest() {
        assert_eq!(i32::lerp(&0, &10, 0.26), 3);
        assert_eq!(i32::lerp(&0, &10, 0.24), 2);
        assert_eq!(i32::lerp(&-7, &12, 1.0), 12);
    }

    #[test]
    fn test_step_types_switch_at_half() {
        assert!(!bool::lerp(&false, &true, 0.49));
        assert!(bool::lerp(&false, &true, 0.5));
        assert_eq!(ObjectRef::lerp(&ObjectRef(1), &ObjectRef(2), 1.0), ObjectRef(2));
    }

    #[test]
    fn test_payload_conversions() {
        assert_eq!(f32::from_payload(&Payload::Int(3)), Some(3.0));
        assert_eq!(i32::from_payload(&Payload::Float(2.6)), Some(3));
        assert_eq!(bool::from_payload(&Payload::Float(1.0)), None);
        let c = Color::rgb(0.2, 0.4, 0.6);
        assert_eq!(Color::from_payload(&c.into_payload()), Some(c));
    }

    #[test]
    fn test_only_colors_sample_gradients() {
        let gradient = Gradient::two_colors(Color::BLACK, Color::WHITE);
        assert!(f32::sample_gradient(&gradient, 0.5).is_none());
        let mid = Color::sample_gradient(&gradient, 0.5).unwrap();
        assert!((mid.r - 0.5).abs() < 1e-5);
    }
}
