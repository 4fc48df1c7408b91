//! Keyframe curves and color gradients
//!
//! Curves remap a normalized input (interpolation selectors, easing of
//! progressive actions). Gradients are sampled by color parameters.

use serde::{Deserialize, Serialize};

use crate::param::value::{Color, lerp_f32};

/// How a value outside [0, period] is folded back into [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WrapMode {
    /// Clamp to [0, 1]
    #[default]
    Clamp,
    /// Repeat (fractional part)
    Loop,
    /// Bounce back and forth
    PingPong,
}

impl WrapMode {
    /// Fold a normalized value into [0, 1]
    pub fn apply(self, t: f32) -> f32 {
        if !t.is_finite() {
            return 0.0;
        }
        match self {
            WrapMode::Clamp => t.clamp(0.0, 1.0),
            WrapMode::Loop => t.rem_euclid(1.0),
            WrapMode::PingPong => {
                let folded = t.rem_euclid(2.0);
                if folded > 1.0 { 2.0 - folded } else { folded }
            }
        }
    }
}

/// A single curve keyframe (Hermite tangents)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
}

impl CurveKey {
    pub fn new(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
        }
    }

    /// Key with flat tangents
    pub fn flat(time: f32, value: f32) -> Self {
        Self::new(time, value, 0.0, 0.0)
    }
}

/// Piecewise cubic Hermite curve, clamped outside its first and last key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CurveKeys")]
pub struct Curve {
    keys: Vec<CurveKey>,
}

/// Serialized keys, sorted on load
#[derive(Deserialize)]
struct CurveKeys {
    keys: Vec<CurveKey>,
}

impl From<CurveKeys> for Curve {
    fn from(raw: CurveKeys) -> Self {
        Self::new(raw.keys)
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::linear()
    }
}

impl Curve {
    /// Build a curve; keys are sorted by time
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Identity on [0, 1]
    pub fn linear() -> Self {
        Self::new(vec![
            CurveKey::new(0.0, 0.0, 1.0, 1.0),
            CurveKey::new(1.0, 1.0, 1.0, 1.0),
        ])
    }

    pub fn constant(value: f32) -> Self {
        Self::new(vec![CurveKey::flat(0.0, value)])
    }

    /// Starts slow, ends at full slope
    pub fn ease_in() -> Self {
        Self::new(vec![
            CurveKey::new(0.0, 0.0, 0.0, 0.0),
            CurveKey::new(1.0, 1.0, 2.0, 2.0),
        ])
    }

    /// Starts at full slope, ends slow
    pub fn ease_out() -> Self {
        Self::new(vec![
            CurveKey::new(0.0, 0.0, 2.0, 2.0),
            CurveKey::new(1.0, 1.0, 0.0, 0.0),
        ])
    }

    /// Smoothstep-shaped S curve
    pub fn ease_in_out() -> Self {
        Self::new(vec![CurveKey::flat(0.0, 0.0), CurveKey::flat(1.0, 1.0)])
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Time span covered by the keys (0 for fewer than two keys)
    pub fn duration(&self) -> f32 {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => last.time - first.time,
            _ => 0.0,
        }
    }

    /// Evaluate the curve. Key values are returned exactly at key times.
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if t.is_nan() || t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // First key strictly after t; t is inside (first.time, last.time)
        let next = self.keys.partition_point(|k| k.time <= t);
        let k0 = &self.keys[next - 1];
        let k1 = &self.keys[next];
        let dt = k1.time - k0.time;
        if dt <= 0.0 {
            return k1.value;
        }

        let s = (t - k0.time) / dt;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * k0.value + h10 * dt * k0.out_tangent + h01 * k1.value + h11 * dt * k1.in_tangent
    }
}

/// Gradient color interpolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GradientMode {
    #[default]
    Blend,
    /// Hold each key's value until the next key
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub time: f32,
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaStop {
    pub time: f32,
    pub alpha: f32,
}

/// Ordered color and alpha stops, sampled independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GradientStops")]
pub struct Gradient {
    color_stops: Vec<ColorStop>,
    alpha_stops: Vec<AlphaStop>,
    pub mode: GradientMode,
}

/// Serialized stops, sorted on load
#[derive(Deserialize)]
struct GradientStops {
    color_stops: Vec<ColorStop>,
    alpha_stops: Vec<AlphaStop>,
    #[serde(default)]
    mode: GradientMode,
}

impl From<GradientStops> for Gradient {
    fn from(raw: GradientStops) -> Self {
        Self::new(raw.color_stops, raw.alpha_stops).with_mode(raw.mode)
    }
}

impl Default for Gradient {
    fn default() -> Self {
        Self::two_colors(Color::WHITE, Color::WHITE)
    }
}

impl Gradient {
    pub fn new(mut color_stops: Vec<ColorStop>, mut alpha_stops: Vec<AlphaStop>) -> Self {
        color_stops.sort_by(|a, b| a.time.total_cmp(&b.time));
        alpha_stops.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            color_stops,
            alpha_stops,
            mode: GradientMode::Blend,
        }
    }

    /// Gradient going from one color to another over [0, 1]
    pub fn two_colors(from: Color, to: Color) -> Self {
        Self::new(
            vec![
                ColorStop { time: 0.0, r: from.r, g: from.g, b: from.b },
                ColorStop { time: 1.0, r: to.r, g: to.g, b: to.b },
            ],
            vec![
                AlphaStop { time: 0.0, alpha: from.a },
                AlphaStop { time: 1.0, alpha: to.a },
            ],
        )
    }

    pub fn with_mode(mut self, mode: GradientMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn evaluate(&self, t: f32) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let rgb = sample_stops(&self.color_stops, t, self.mode, |s| s.time, |a, b, f| {
            [lerp_f32(a.r, b.r, f), lerp_f32(a.g, b.g, f), lerp_f32(a.b, b.b, f)]
        }, |s| [s.r, s.g, s.b])
        .unwrap_or([1.0, 1.0, 1.0]);
        let alpha = sample_stops(&self.alpha_stops, t, self.mode, |s| s.time, |a, b, f| {
            lerp_f32(a.alpha, b.alpha, f)
        }, |s| s.alpha)
        .unwrap_or(1.0);
        Color::rgba(rgb[0], rgb[1], rgb[2], alpha)
    }
}

fn sample_stops<S, V>(
    stops: &[S],
    t: f32,
    mode: GradientMode,
    time_of: impl Fn(&S) -> f32,
    blend: impl Fn(&S, &S, f32) -> V,
    value_of: impl Fn(&S) -> V,
) -> Option<V> {
    let first = stops.first()?;
    let last = stops.last()?;
    if t <= time_of(first) {
        return Some(value_of(first));
    }
    if t >= time_of(last) {
        return Some(value_of(last));
    }
    let next = stops.partition_point(|s| time_of(s) <= t);
    let a = &stops[next - 1];
    let b = &stops[next];
    match mode {
        GradientMode::Fixed => Some(value_of(a)),
        GradientMode::Blend => {
            let span = time_of(b) - time_of(a);
            if span <= 0.0 {
                return Some(value_of(b));
            }
            Some(blend(a, b, (t - time_of(a)) / span))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_curve_is_identity() {
        let curve = Curve::linear();
        for t in [0.0, 0.1, 0.25, 0.5, 0.75, 1.0] {
            assert!((curve.evaluate(t) - t).abs() < 1e-5, "t = {t}");
        }
        assert_eq!(curve.evaluate(0.0), 0.0);
        assert_eq!(curve.evaluate(1.0), 1.0);
    }

    #[test]
    fn test_curve_clamps_outside_keys() {
        let curve = Curve::linear();
        assert_eq!(curve.evaluate(-3.0), 0.0);
        assert_eq!(curve.evaluate(7.0), 1.0);
        assert_eq!(Curve::constant(0.4).evaluate(0.9), 0.4);
    }

    #[test]
    fn test_ease_in_out_is_smoothstep() {
        let curve = Curve::ease_in_out();
        let t: f32 = 0.25;
        let expected = t * t * (3.0 - 2.0 * t);
        assert!((curve.evaluate(t) - expected).abs() < 1e-5);
        assert!(Curve::ease_in().evaluate(0.25) < 0.25);
        assert!(Curve::ease_out().evaluate(0.25) > 0.25);
    }

    #[test]
    fn test_empty_curve_evaluates_to_zero() {
        assert_eq!(Curve::new(Vec::new()).evaluate(0.5), 0.0);
    }

    #[test]
    fn test_wrap_modes() {
        assert_eq!(WrapMode::Clamp.apply(1.5), 1.0);
        assert!((WrapMode::Loop.apply(1.25) - 0.25).abs() < 1e-6);
        assert!((WrapMode::PingPong.apply(1.25) - 0.75).abs() < 1e-6);
        assert!((WrapMode::PingPong.apply(0.25) - 0.25).abs() < 1e-6);
        assert_eq!(WrapMode::Loop.apply(f32::INFINITY), 0.0);
    }

    #[test]
    fn test_gradient_blend_and_fixed() {
        let gradient = Gradient::two_colors(Color::BLACK, Color::rgba(1.0, 0.0, 0.0, 0.0));
        let mid = gradient.evaluate(0.5);
        assert!((mid.r - 0.5).abs() < 1e-6);
        assert!((mid.a - 0.5).abs() < 1e-6);

        let fixed = gradient.with_mode(GradientMode::Fixed);
        assert_eq!(fixed.evaluate(0.5), Color::BLACK);
        assert_eq!(fixed.evaluate(1.0), Color::rgba(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_json_keys_are_sorted_on_load() {
        let curve: Curve = serde_json::from_str(
            r#"{ "keys": [ { "time": 1.0, "value": 1.0 }, { "time": 0.0, "value": 0.0 }, { "time": 0.5, "value": 0.2 } ] }"#,
        )
        .unwrap();
        let times: Vec<f32> = curve.keys().iter().map(|k| k.time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0]);
        assert_eq!(curve.evaluate(0.5), 0.2);
        assert!(curve.evaluate(0.75) > 0.2);

        let gradient: Gradient = serde_json::from_str(
            r#"{
                "color_stops": [ { "time": 1.0, "r": 1.0, "g": 1.0, "b": 1.0 }, { "time": 0.0, "r": 0.0, "g": 0.0, "b": 0.0 } ],
                "alpha_stops": [ { "time": 1.0, "alpha": 0.0 }, { "time": 0.0, "alpha": 1.0 } ],
                "mode": "Fixed"
            }"#,
        )
        .unwrap();
        assert_eq!(gradient.mode, GradientMode::Fixed);
        assert_eq!(gradient.evaluate(0.5), Color::BLACK);
        assert_eq!(gradient.evaluate(1.0), Color::rgba(1.0, 1.0, 1.0, 0.0));
    }
}
