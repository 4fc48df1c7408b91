//! Named parameter tables
//!
//! The global parameter table and every unit's custom parameters share one
//! shape: values looked up by a stable string name.

use std::collections::HashMap;

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::value::{Color, DynamicValue, ObjectRef, Payload};
use crate::curve::Curve;

/// Read-only access to named parameters
pub trait ParameterSource {
    fn lookup(&self, name: &str) -> Option<&Payload>;

    /// Typed lookup through [`DynamicValue`] conversion
    fn get<T: DynamicValue>(&self, name: &str) -> Option<T>
    where
        Self: Sized,
    {
        self.lookup(name).and_then(T::from_payload)
    }

    fn get_scalar(&self, name: &str) -> Option<f32> {
        self.lookup(name).and_then(f32::from_payload)
    }

    fn get_int(&self, name: &str) -> Option<i32> {
        self.lookup(name).and_then(i32::from_payload)
    }

    fn get_bool(&self, name: &str) -> Option<bool> {
        self.lookup(name).and_then(bool::from_payload)
    }

    fn get_color(&self, name: &str) -> Option<Color> {
        self.lookup(name).and_then(Color::from_payload)
    }

    fn get_curve(&self, name: &str) -> Option<&Curve> {
        match self.lookup(name)? {
            Payload::Curve(curve) => Some(curve),
            _ => None,
        }
    }

    fn get_vector2(&self, name: &str) -> Option<Vec2> {
        self.lookup(name).and_then(Vec2::from_payload)
    }

    fn get_vector3(&self, name: &str) -> Option<Vec3> {
        self.lookup(name).and_then(Vec3::from_payload)
    }

    fn get_vector4(&self, name: &str) -> Option<Vec4> {
        self.lookup(name).and_then(Vec4::from_payload)
    }

    fn get_string(&self, name: &str) -> Option<&str> {
        match self.lookup(name)? {
            Payload::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn get_object_ref(&self, name: &str) -> Option<ObjectRef> {
        self.lookup(name).and_then(ObjectRef::from_payload)
    }
}

/// In-memory parameter table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    values: HashMap<String, Payload>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) a parameter
    pub fn set(&mut self, name: impl Into<String>, value: impl DynamicValue) {
        self.values.insert(name.into(), value.into_payload());
    }

    /// Builder-style [`ParameterTable::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl DynamicValue) -> Self {
        self.set(name, value);
        self
    }

    /// Add to a scalar parameter, creating it at 0 if missing.
    /// Returns the new value, or `None` if the parameter holds a non-scalar.
    pub fn add_scalar(&mut self, name: &str, delta: f32) -> Option<f32> {
        let current = match self.values.get(name) {
            Some(payload) => f32::from_payload(payload)?,
            None => 0.0,
        };
        let next = current + delta;
        self.values.insert(name.to_string(), Payload::Float(next));
        Some(next)
    }

    pub fn remove(&mut self, name: &str) -> Option<Payload> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl ParameterSource for ParameterTable {
    fn lookup(&self, name: &str) -> Option<&Payload> {
        self.values.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let table = ParameterTable::new()
            .with("speed", 4.5f32)
            .with("count", 3i32)
            .with("armed", true)
            .with("tint", Color::rgb(1.0, 0.0, 0.0))
            .with("offset", Vec2::new(1.0, 2.0))
            .with("label", String::from("boss"))
            .with("clip", ObjectRef(9));

        assert_eq!(table.get_scalar("speed"), Some(4.5));
        assert_eq!(table.get_scalar("count"), Some(3.0));
        assert_eq!(table.get_int("count"), Some(3));
        assert_eq!(table.get_bool("armed"), Some(true));
        assert_eq!(table.get_color("tint"), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(table.get_vector2("offset"), Some(Vec2::new(1.0, 2.0)));
        assert_eq!(table.get_string("label"), Some("boss"));
        assert_eq!(table.get_object_ref("clip"), Some(ObjectRef(9)));
        assert_eq!(table.get::<f32>("speed"), Some(4.5));
    }

    #[test]
    fn test_missing_and_mistyped_lookups() {
        let table = ParameterTable::new().with("armed", true);
        assert_eq!(table.get_scalar("missing"), None);
        assert_eq!(table.get_scalar("armed"), None);
        assert!(table.get_curve("armed").is_none());
    }

    #[test]
    fn test_add_scalar() {
        let mut table = ParameterTable::new();
        assert_eq!(table.add_scalar("heat", 2.0), Some(2.0));
        assert_eq!(table.add_scalar("heat", 0.5), Some(2.5));
        table.set("flag", false);
        assert_eq!(table.add_scalar("flag", 1.0), None);
    }
}
