//! Shot layout
//!
//! A shot starts as `count` spawns stacked on the origin, all facing 0°
//! (+Y). Layout steps then move, turn and re-target a selection of them.
//! Headings are in degrees, counter-clockwise positive, and normalized to
//! [0, 360) once the layout is done.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::param::ObjectRef;
use crate::{heading_to_direction, heading_to_right, normalize_degrees, rotate_around};

/// One projectile of a resolved shot
#[derive(Debug, Clone, PartialEq)]
pub struct BulletSpawn {
    /// Offset from the emitter, in shot space
    pub position: Vec2,
    /// Heading, degrees
    pub rotation: f32,
    pub bullet: ObjectRef,
    /// Position normalized to the shot's bounding box
    pub position_in_shot: Vec2,
    /// Order of the spawn in the shot
    pub index: u32,
}

/// Subset of spawns the following steps apply to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// Spawns `start..end`
    Range { start: u32, end: u32 },
    /// Every `step`-th spawn starting at `offset`
    EveryNth { step: u32, offset: u32 },
    Indices(Vec<u32>),
}

impl Selection {
    /// Selected spawn indices below `count`, ascending and unique
    pub fn indices(&self, count: usize) -> Vec<usize> {
        let mut out: Vec<usize> = match self {
            Selection::Range { start, end } => {
                let end = (*end as usize).min(count);
                (*start as usize..end).collect()
            }
            Selection::EveryNth { step, offset } => {
                let step = (*step).max(1) as usize;
                (*offset as usize..count).step_by(step).collect()
            }
            Selection::Indices(list) => list
                .iter()
                .map(|&i| i as usize)
                .filter(|&i| i < count)
                .collect(),
        };
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Center of a rotation or scale
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Pivot {
    /// The shot's origin
    #[default]
    Origin,
    /// The last point set by [`LayoutStep::SetPivot`]
    Running,
    Point(Vec2),
}

/// A resolved layout operation
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutStep {
    Select(Selection),
    SelectAll,
    /// Fan the selection over a total angle
    SpreadAngle(f32),
    /// Fan the selection with a fixed angle between neighbours
    SpacingAngle(f32),
    SpreadHorizontal(f32),
    SpreadVertical(f32),
    SpacingHorizontal(f32),
    SpacingVertical(f32),
    TranslateGlobal(Vec2),
    /// Move along each spawn's own right (x) and forward (y) axes
    TranslateLocal(Vec2),
    SetPivot(Vec2),
    Rotate { degrees: f32, pivot: Pivot },
    Scale { scale: Vec2, pivot: Pivot },
    LookAt { target: Vec2 },
    LookAway { target: Vec2 },
    ResetCoordinates { position: bool, rotation: bool },
    OverrideBullet(ObjectRef),
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Angle,
    X,
    Y,
}

struct Layout {
    spawns: Vec<BulletSpawn>,
    selection: Vec<usize>,
    pivot: Vec2,
}

impl Layout {
    fn new(count: usize, bullet: ObjectRef) -> Self {
        let spawns = (0..count)
            .map(|i| BulletSpawn {
                position: Vec2::ZERO,
                rotation: 0.0,
                bullet,
                position_in_shot: Vec2::splat(0.5),
                index: i as u32,
            })
            .collect();
        Self {
            spawns,
            selection: (0..count).collect(),
            pivot: Vec2::ZERO,
        }
    }

    fn pivot_point(&self, pivot: Pivot) -> Vec2 {
        match pivot {
            Pivot::Origin => Vec2::ZERO,
            Pivot::Running => self.pivot,
            Pivot::Point(p) => p,
        }
    }

    fn read(&self, i: usize, axis: Axis) -> f32 {
        let spawn = &self.spawns[i];
        match axis {
            Axis::Angle => spawn.rotation,
            Axis::X => spawn.position.x,
            Axis::Y => spawn.position.y,
        }
    }

    fn write(&mut self, i: usize, axis: Axis, value: f32) {
        let spawn = &mut self.spawns[i];
        match axis {
            Axis::Angle => spawn.rotation = value,
            Axis::X => spawn.position.x = value,
            Axis::Y => spawn.position.y = value,
        }
    }

    /// Lay the selection out `step` apart along an axis, centered on the
    /// midpoint of its current extent. Spawn order is kept; only values move.
    fn distribute(&mut self, axis: Axis, step: f32) {
        if self.selection.is_empty() {
            return;
        }
        let mut order = self.selection.clone();
        order.sort_by(|&a, &b| {
            self.read(a, axis)
                .total_cmp(&self.read(b, axis))
                .then(a.cmp(&b))
        });

        let min = order.iter().map(|&i| self.read(i, axis)).fold(f32::INFINITY, f32::min);
        let max = order.iter().map(|&i| self.read(i, axis)).fold(f32::NEG_INFINITY, f32::max);
        let center = (min + max) * 0.5;
        let first = center - step * (order.len() - 1) as f32 * 0.5;

        for (k, i) in order.into_iter().enumerate() {
            self.write(i, axis, first + step * k as f32);
        }
    }

    /// Step between neighbours for a spread of `total`. A full turn or more
    /// wraps, so the last spawn does not land on the first.
    fn spread_step(&self, total: f32, axis: Axis) -> f32 {
        let n = self.selection.len();
        if n < 2 {
            return 0.0;
        }
        match axis {
            Axis::Angle if total.abs() >= 360.0 => total / n as f32,
            _ => total / (n - 1) as f32,
        }
    }

    fn apply(&mut self, step: &LayoutStep) {
        match step {
            LayoutStep::Select(selection) => {
                self.selection = selection.indices(self.spawns.len());
            }
            LayoutStep::SelectAll => {
                self.selection = (0..self.spawns.len()).collect();
            }
            LayoutStep::SpreadAngle(total) => {
                let step = self.spread_step(*total, Axis::Angle);
                self.distribute(Axis::Angle, step);
            }
            LayoutStep::SpacingAngle(step) => self.distribute(Axis::Angle, *step),
            LayoutStep::SpreadHorizontal(total) => {
                let step = self.spread_step(*total, Axis::X);
                self.distribute(Axis::X, step);
            }
            LayoutStep::SpreadVertical(total) => {
                let step = self.spread_step(*total, Axis::Y);
                self.distribute(Axis::Y, step);
            }
            LayoutStep::SpacingHorizontal(step) => self.distribute(Axis::X, *step),
            LayoutStep::SpacingVertical(step) => self.distribute(Axis::Y, *step),
            LayoutStep::TranslateGlobal(offset) => {
                for &i in &self.selection {
                    self.spawns[i].position += *offset;
                }
            }
            LayoutStep::TranslateLocal(offset) => {
                for &i in &self.selection {
                    let spawn = &mut self.spawns[i];
                    spawn.position += heading_to_right(spawn.rotation) * offset.x
                        + heading_to_direction(spawn.rotation) * offset.y;
                }
            }
            LayoutStep::SetPivot(point) => self.pivot = *point,
            LayoutStep::Rotate { degrees, pivot } => {
                let center = self.pivot_point(*pivot);
                for &i in &self.selection {
                    let spawn = &mut self.spawns[i];
                    spawn.position = rotate_around(spawn.position, center, *degrees);
                    spawn.rotation += degrees;
                }
            }
            LayoutStep::Scale { scale, pivot } => {
                let center = self.pivot_point(*pivot);
                for &i in &self.selection {
                    let spawn = &mut self.spawns[i];
                    spawn.position = center + (spawn.position - center) * *scale;
                    spawn.rotation = mirror_heading(spawn.rotation, *scale);
                }
            }
            LayoutStep::LookAt { target } => {
                for &i in &self.selection {
                    let spawn = &mut self.spawns[i];
                    if let Some(heading) = heading_towards(spawn.position, *target) {
                        spawn.rotation = heading;
                    }
                }
            }
            LayoutStep::LookAway { target } => {
                for &i in &self.selection {
                    let spawn = &mut self.spawns[i];
                    if let Some(heading) = heading_towards(spawn.position, *target) {
                        spawn.rotation = heading + 180.0;
                    }
                }
            }
            LayoutStep::ResetCoordinates { position, rotation } => {
                for &i in &self.selection {
                    let spawn = &mut self.spawns[i];
                    if *position {
                        spawn.position = Vec2::ZERO;
                    }
                    if *rotation {
                        spawn.rotation = 0.0;
                    }
                }
            }
            LayoutStep::OverrideBullet(bullet) => {
                for &i in &self.selection {
                    self.spawns[i].bullet = *bullet;
                }
            }
        }
    }

    fn finish(mut self) -> Vec<BulletSpawn> {
        let (min, max) = self.spawns.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), s| (min.min(s.position), max.max(s.position)),
        );
        let size = max - min;
        for spawn in &mut self.spawns {
            spawn.rotation = normalize_degrees(spawn.rotation);
            let x = if size.x > f32::EPSILON {
                (spawn.position.x - min.x) / size.x
            } else {
                0.5
            };
            let y = if size.y > f32::EPSILON {
                (spawn.position.y - min.y) / size.y
            } else {
                0.5
            };
            spawn.position_in_shot = Vec2::new(x, y);
        }
        self.spawns
    }
}

/// Heading after a scale: negative factors mirror the spawn
fn mirror_heading(heading: f32, scale: Vec2) -> f32 {
    match (scale.x < 0.0, scale.y < 0.0) {
        (false, false) => heading,
        (true, false) => -heading,
        (false, true) => 180.0 - heading,
        (true, true) => heading + 180.0,
    }
}

/// Heading from `from` to `target`, `None` when they coincide.
///
/// The unsigned angle to the forward axis comes from the law of cosines;
/// the sign of the cross product picks the side.
fn heading_towards(from: Vec2, target: Vec2) -> Option<f32> {
    let to_target = target - from;
    let distance = to_target.length();
    if distance <= f32::EPSILON {
        return None;
    }
    let forward = Vec2::Y;
    let cos = (forward.dot(to_target) / distance).clamp(-1.0, 1.0);
    let angle = cos.acos().to_degrees();
    let cross = forward.perp_dot(to_target);
    Some(if cross < 0.0 { -angle } else { angle })
}

/// Lay out `count` spawns of `bullet`
pub fn apply_layout(count: usize, bullet: ObjectRef, steps: &[LayoutStep]) -> Vec<BulletSpawn> {
    let mut layout = Layout::new(count, bullet);
    for step in steps {
        layout.apply(step);
    }
    layout.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f32 = 1e-4;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPS
    }

    fn rotations(spawns: &[BulletSpawn]) -> Vec<f32> {
        spawns.iter().map(|s| s.rotation).collect()
    }

    #[test]
    fn test_default_layout() {
        let spawns = apply_layout(3, ObjectRef(4), &[]);
        assert_eq!(spawns.len(), 3);
        for (i, s) in spawns.iter().enumerate() {
            assert_eq!(s.position, Vec2::ZERO);
            assert_eq!(s.rotation, 0.0);
            assert_eq!(s.bullet, ObjectRef(4));
            assert_eq!(s.index, i as u32);
            assert_eq!(s.position_in_shot, Vec2::splat(0.5));
        }
        assert!(apply_layout(0, ObjectRef::NONE, &[LayoutStep::SpreadAngle(90.0)]).is_empty());
    }

    #[test]
    fn test_spread_angle_fans_around_forward() {
        let spawns = apply_layout(3, ObjectRef::NONE, &[LayoutStep::SpreadAngle(90.0)]);
        let r = rotations(&spawns);
        assert!(approx(r[0], 315.0));
        assert!(approx(r[1], 0.0));
        assert!(approx(r[2], 45.0));
    }

    #[test]
    fn test_full_circle_spread_does_not_overlap() {
        let spawns = apply_layout(4, ObjectRef::NONE, &[LayoutStep::SpreadAngle(360.0)]);
        let mut r = rotations(&spawns);
        r.sort_by(f32::total_cmp);
        assert!(approx(r[0], 0.0) || approx(r[0], 45.0));
        for pair in r.windows(2) {
            assert!(approx(pair[1] - pair[0], 90.0));
        }
    }

    #[test]
    fn test_spacing_horizontal_recenters() {
        let spawns = apply_layout(
            3,
            ObjectRef::NONE,
            &[
                LayoutStep::TranslateGlobal(Vec2::new(10.0, 0.0)),
                LayoutStep::SpacingHorizontal(2.0),
            ],
        );
        let xs: Vec<f32> = spawns.iter().map(|s| s.position.x).collect();
        assert_eq!(xs, vec![8.0, 10.0, 12.0]);
        assert!(approx(spawns[0].position_in_shot.x, 0.0));
        assert!(approx(spawns[1].position_in_shot.x, 0.5));
        assert!(approx(spawns[2].position_in_shot.x, 1.0));
        // Degenerate vertical extent
        assert_eq!(spawns[0].position_in_shot.y, 0.5);
    }

    #[test]
    fn test_spread_keeps_relative_order_of_existing_values() {
        let spawns = apply_layout(
            3,
            ObjectRef::NONE,
            &[
                LayoutStep::Select(Selection::Indices(vec![0])),
                LayoutStep::TranslateGlobal(Vec2::new(5.0, 0.0)),
                LayoutStep::SelectAll,
                LayoutStep::SpreadHorizontal(4.0),
            ],
        );
        // Spawn 0 was rightmost, so it stays rightmost
        assert!(approx(spawns[0].position.x, 4.5));
        assert!(approx(spawns[1].position.x, 0.5));
        assert!(approx(spawns[2].position.x, 2.5));
    }

    #[test]
    fn test_selection_limits_steps() {
        let spawns = apply_layout(
            4,
            ObjectRef(1),
            &[
                LayoutStep::Select(Selection::EveryNth { step: 2, offset: 1 }),
                LayoutStep::OverrideBullet(ObjectRef(9)),
                LayoutStep::TranslateGlobal(Vec2::Y),
            ],
        );
        let bullets: Vec<u32> = spawns.iter().map(|s| s.bullet.0).collect();
        assert_eq!(bullets, vec![1, 9, 1, 9]);
        assert_eq!(spawns[0].position, Vec2::ZERO);
        assert_eq!(spawns[3].position, Vec2::Y);
    }

    #[test]
    fn test_selection_indices() {
        assert_eq!(Selection::Range { start: 1, end: 9 }.indices(4), vec![1, 2, 3]);
        assert_eq!(Selection::Indices(vec![3, 1, 3, 7]).indices(4), vec![1, 3]);
        assert_eq!(Selection::EveryNth { step: 0, offset: 2 }.indices(4), vec![2, 3]);
    }

    #[test]
    fn test_translate_local_follows_heading() {
        let spawns = apply_layout(
            1,
            ObjectRef::NONE,
            &[
                LayoutStep::Rotate { degrees: 90.0, pivot: Pivot::Origin },
                LayoutStep::TranslateLocal(Vec2::new(0.0, 2.0)),
            ],
        );
        // Forward at 90° is -X
        assert!(approx(spawns[0].position.x, -2.0));
        assert!(approx(spawns[0].position.y, 0.0));
        assert!(approx(spawns[0].rotation, 90.0));
    }

    #[test]
    fn test_rotate_around_running_pivot() {
        let spawns = apply_layout(
            1,
            ObjectRef::NONE,
            &[
                LayoutStep::SetPivot(Vec2::new(1.0, 0.0)),
                LayoutStep::Rotate { degrees: 180.0, pivot: Pivot::Running },
            ],
        );
        assert!(approx(spawns[0].position.x, 2.0));
        assert!(approx(spawns[0].position.y, 0.0));
        assert!(approx(spawns[0].rotation, 180.0));
    }

    #[test]
    fn test_scale_flips_mirror_heading() {
        assert_eq!(mirror_heading(30.0, Vec2::new(-1.0, 1.0)), -30.0);
        assert_eq!(mirror_heading(30.0, Vec2::new(1.0, -1.0)), 150.0);
        assert_eq!(mirror_heading(30.0, Vec2::new(-2.0, -1.0)), 210.0);
        assert_eq!(mirror_heading(30.0, Vec2::new(2.0, 0.5)), 30.0);

        let spawns = apply_layout(
            1,
            ObjectRef::NONE,
            &[
                LayoutStep::TranslateGlobal(Vec2::new(1.0, 1.0)),
                LayoutStep::Rotate { degrees: 30.0, pivot: Pivot::Point(Vec2::new(1.0, 1.0)) },
                LayoutStep::Scale { scale: Vec2::new(-2.0, 1.0), pivot: Pivot::Origin },
            ],
        );
        assert!(approx(spawns[0].position.x, -2.0));
        assert!(approx(spawns[0].rotation, 330.0));
    }

    #[test]
    fn test_look_at_and_away() {
        let spawns = apply_layout(
            2,
            ObjectRef::NONE,
            &[
                LayoutStep::Select(Selection::Indices(vec![0])),
                LayoutStep::LookAt { target: Vec2::new(-1.0, 0.0) },
                LayoutStep::Select(Selection::Indices(vec![1])),
                LayoutStep::LookAway { target: Vec2::new(1.0, 0.0) },
            ],
        );
        assert!(approx(spawns[0].rotation, 90.0));
        assert!(approx(spawns[1].rotation, 90.0));

        assert!(approx(heading_towards(Vec2::ZERO, Vec2::new(1.0, 0.0)).unwrap(), -90.0));
        assert!(approx(heading_towards(Vec2::ZERO, Vec2::new(0.0, -3.0)).unwrap(), 180.0));
        assert!(heading_towards(Vec2::ONE, Vec2::ONE).is_none());
    }

    #[test]
    fn test_reset_coordinates() {
        let spawns = apply_layout(
            1,
            ObjectRef::NONE,
            &[
                LayoutStep::TranslateGlobal(Vec2::new(3.0, 4.0)),
                LayoutStep::Rotate { degrees: 45.0, pivot: Pivot::Origin },
                LayoutStep::ResetCoordinates { position: true, rotation: false },
            ],
        );
        assert_eq!(spawns[0].position, Vec2::ZERO);
        assert!(approx(spawns[0].rotation, 45.0));
    }

    proptest! {
        #[test]
        fn laid_out_shots_stay_normalized(
            count in 1usize..40,
            spread in -720.0f32..720.0,
            spacing in -50.0f32..50.0,
            turn in -1000.0f32..1000.0,
            target in (-10.0f32..10.0, -10.0f32..10.0),
        ) {
            let spawns = apply_layout(
                count,
                ObjectRef(1),
                &[
                    LayoutStep::SpreadAngle(spread),
                    LayoutStep::SpacingHorizontal(spacing),
                    LayoutStep::Rotate { degrees: turn, pivot: Pivot::Origin },
                    LayoutStep::Scale { scale: Vec2::new(-1.0, 1.0), pivot: Pivot::Running },
                    LayoutStep::LookAt { target: Vec2::new(target.0, target.1) },
                ],
            );
            prop_assert_eq!(spawns.len(), count);
            for (i, s) in spawns.iter().enumerate() {
                prop_assert_eq!(s.index, i as u32);
                prop_assert!((0.0..360.0).contains(&s.rotation));
                prop_assert!((0.0..=1.0).contains(&s.position_in_shot.x));
                prop_assert!((0.0..=1.0).contains(&s.position_in_shot.y));
            }
        }
    }
}
