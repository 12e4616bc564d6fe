//! # Motion Models
//!
//! Traversal-time cost models for the three supported motion variants:
//!
//! - `Shortest` - Straight-line motion, cost is distance over linear speed.
//! - `PointTurn` - Rotate in place, drive straight, optionally rotate again
//!   to the target heading.
//! - `Unicycle` - A circular arc tangent to the start heading, with the
//!   traversal time limited by whichever of the linear and angular rates is
//!   binding.
//!
//! All variants share one contract: `cost_from_to` returns the traversal
//! time and the heading the vehicle arrives with, `path_exists` checks the
//! motion primitive for collisions, and `intermediate_pts` samples it.
//! Costs may come out non-finite; callers treat those edges as infeasible.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use util::maths::wrap_to_pi;

use super::pose::Pose;
use crate::map::{NavMap, DEFAULT_MAX_Y_DELTA_M};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Spatial resolution at which motion primitives are sampled for collision
/// checks. Units: meters
pub const PATH_CHECK_RESOLUTION_M: f64 = 0.05;

/// Bearing error below which an arc degenerates into a straight segment.
/// Units: radians
const STRAIGHT_ARC_EPSILON_RAD: f64 = 1e-6;

/// Distance below which two poses are coincident for cost purposes.
/// Units: meters
const COINCIDENT_EPSILON_M: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The motion variant used for edge costs and feasibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RrtType {
    Shortest,
    PointTurn,
    Unicycle,
}

/// Geometry of the motion primitive joining two poses.
enum Primitive {
    Straight {
        /// Direction of travel. Units: radians
        heading_rad: f64,

        /// Segment length. Units: meters
        length_m: f64,
    },
    Arc {
        /// Centre of the turning circle in the plane.
        centre_m: Vector2<f64>,

        /// Unsigned turning radius. Units: meters
        radius_m: f64,

        /// Angle of the start pose as seen from the centre. Units: radians
        phi0_rad: f64,

        /// Signed angle swept along the arc. Units: radians
        sweep_rad: f64,

        /// Arc length. Units: meters
        length_m: f64,

        /// Heading at the start of the arc. Units: radians
        heading0_rad: f64,
    },
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A motion variant together with the vehicle's velocity limits.
#[derive(Debug, Clone, Copy)]
pub struct MotionModel {
    rrt_type: RrtType,

    /// Maximum linear velocity. Units: meters/second
    max_linear_velocity_ms: f64,

    /// Maximum angular velocity. Units: radians/second
    max_angular_velocity_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotionModel {
    pub fn new(
        rrt_type: RrtType,
        max_linear_velocity_ms: f64,
        max_angular_velocity_rads: f64,
    ) -> Self {
        Self {
            rrt_type,
            max_linear_velocity_ms,
            max_angular_velocity_rads,
        }
    }

    pub fn rrt_type(&self) -> RrtType {
        self.rrt_type
    }

    /// Key under which the best cost is recorded in checkpoints.
    pub fn cost_key(&self) -> &'static str {
        "best_path_time"
    }

    /// Traversal time from pose `a` to pose `b` and the heading at `b`.
    ///
    /// With `consider_end_heading` the point-turn variant adds the final
    /// rotation onto `b`'s stored heading; the other variants arrive with
    /// their natural heading regardless. Units: (seconds, radians)
    pub fn cost_from_to(&self, a: &Pose, b: &Pose, consider_end_heading: bool) -> (f64, f64) {
        let chord = Vector2::new(b.x - a.x, b.y - a.y);
        let dist_m = chord.norm();

        match self.rrt_type {
            RrtType::Shortest => {
                if dist_m < COINCIDENT_EPSILON_M {
                    return (0.0, a.heading);
                }

                let heading = chord.y.atan2(chord.x);
                (dist_m / self.max_linear_velocity_ms, heading)
            }
            RrtType::PointTurn => {
                if dist_m < COINCIDENT_EPSILON_M {
                    let turn_s = if consider_end_heading {
                        wrap_to_pi(b.heading - a.heading).abs() / self.max_angular_velocity_rads
                    } else {
                        0.0
                    };
                    return (turn_s, a.heading);
                }

                let facing = chord.y.atan2(chord.x);

                let initial_turn_rad = wrap_to_pi(facing - a.heading);
                let mut time_s = initial_turn_rad.abs() / self.max_angular_velocity_rads
                    + dist_m / self.max_linear_velocity_ms;

                if consider_end_heading {
                    let final_turn_rad = wrap_to_pi(b.heading - facing);
                    time_s += final_turn_rad.abs() / self.max_angular_velocity_rads;
                }

                (time_s, facing)
            }
            RrtType::Unicycle => {
                if dist_m < COINCIDENT_EPSILON_M {
                    return (0.0, a.heading);
                }

                let alpha_rad = wrap_to_pi(a.bearing_to(b) - a.heading);

                // Arc length joining the poses; for small bearing errors the
                // arc degenerates into the chord
                let arc_m = if alpha_rad.abs() < STRAIGHT_ARC_EPSILON_RAD {
                    dist_m
                } else {
                    dist_m * alpha_rad / alpha_rad.sin()
                };

                // Whichever velocity limit binds determines the time
                let time_s = (arc_m / self.max_linear_velocity_ms)
                    .max(2.0 * alpha_rad.abs() / self.max_angular_velocity_rads);

                (time_s, wrap_to_pi(a.heading + 2.0 * alpha_rad))
            }
        }
    }

    /// Test whether the motion primitive from `a` to `b` stays on navigable
    /// ground throughout.
    pub fn path_exists(&self, map: &dyn NavMap, a: &Pose, b: &Pose) -> bool {
        if !a.is_finite() || !b.is_finite() {
            return false;
        }

        if !map.is_navigable(b, DEFAULT_MAX_Y_DELTA_M) {
            return false;
        }

        let primitive = self.primitive(a, b);

        // Walk the primitive sample by sample, bailing out at the first
        // blocked one. Degenerate arcs can be far longer than the map, so
        // the samples are never materialised up front.
        let num_steps = (primitive.length_m() / PATH_CHECK_RESOLUTION_M).floor() as usize;
        for step in 1..num_steps {
            let t = step as f64 / num_steps as f64;
            if !map.is_navigable(&primitive.pose_at(a, b, t), DEFAULT_MAX_Y_DELTA_M) {
                return false;
            }
        }

        true
    }

    /// Sample the motion primitive from `a` to `b` at the given resolution.
    ///
    /// The returned poses are the interior of the primitive; `a` and `b`
    /// themselves are not included.
    pub fn intermediate_pts(&self, a: &Pose, b: &Pose, resolution_m: f64) -> Vec<Pose> {
        let primitive = self.primitive(a, b);

        let num_steps = (primitive.length_m() / resolution_m).floor() as usize;
        (1..num_steps)
            .map(|step| primitive.pose_at(a, b, step as f64 / num_steps as f64))
            .collect()
    }

    /// The geometric primitive joining `a` to `b` under this variant.
    fn primitive(&self, a: &Pose, b: &Pose) -> Primitive {
        let dist_m = a.dist_2d(b);
        let bearing_rad = a.bearing_to(b);

        match self.rrt_type {
            RrtType::Shortest | RrtType::PointTurn => Primitive::Straight {
                heading_rad: bearing_rad,
                length_m: dist_m,
            },
            RrtType::Unicycle => {
                let alpha_rad = wrap_to_pi(bearing_rad - a.heading);
                if alpha_rad.abs() < STRAIGHT_ARC_EPSILON_RAD {
                    return Primitive::Straight {
                        heading_rad: bearing_rad,
                        length_m: dist_m,
                    };
                }

                // Signed turning radius; the centre sits perpendicular to
                // the start heading
                let radius_m = dist_m / (2.0 * alpha_rad.sin());
                let centre_m = Vector2::new(
                    a.x - radius_m * a.heading.sin(),
                    a.y + radius_m * a.heading.cos(),
                );

                Primitive::Arc {
                    centre_m,
                    radius_m: radius_m.abs(),
                    phi0_rad: (a.y - centre_m.y).atan2(a.x - centre_m.x),
                    sweep_rad: 2.0 * alpha_rad,
                    length_m: dist_m * alpha_rad / alpha_rad.sin(),
                    heading0_rad: a.heading,
                }
            }
        }
    }
}

impl Primitive {
    /// Length of the primitive in the plane. Units: meters
    fn length_m(&self) -> f64 {
        match self {
            Primitive::Straight { length_m, .. } => *length_m,
            Primitive::Arc { length_m, .. } => *length_m,
        }
    }

    /// Pose at parameter `t` in [0, 1] along the primitive from `a` to `b`.
    fn pose_at(&self, a: &Pose, b: &Pose, t: f64) -> Pose {
        match self {
            Primitive::Straight { heading_rad, .. } => Pose::with_heading(
                [
                    a.x + t * (b.x - a.x),
                    a.z + t * (b.z - a.z),
                    a.y + t * (b.y - a.y),
                ],
                *heading_rad,
            ),
            Primitive::Arc {
                centre_m,
                radius_m,
                phi0_rad,
                sweep_rad,
                heading0_rad,
                ..
            } => {
                let phi_rad = phi0_rad + sweep_rad * t;
                Pose::with_heading(
                    [
                        centre_m.x + radius_m * phi_rad.cos(),
                        a.z + t * (b.z - a.z),
                        centre_m.y + radius_m * phi_rad.sin(),
                    ],
                    wrap_to_pi(heading0_rad + sweep_rad * t),
                )
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::RasterMap;
    use image::{GrayImage, Luma};
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_shortest_cost() {
        let motion = MotionModel::new(RrtType::Shortest, 2.0, 1.0);

        let a = Pose::new([0.0, 0.0, 0.0]);
        let b = Pose::new([3.0, 0.0, 4.0]);

        let (time_s, heading) = motion.cost_from_to(&a, &b, false);
        assert!((time_s - 2.5).abs() < 1e-9);
        assert!((heading - (4.0f64).atan2(3.0)).abs() < 1e-9);

        // End heading has no effect on the shortest variant
        let (with_end, _) = motion.cost_from_to(&a, &b, true);
        assert!((with_end - time_s).abs() < 1e-12);
    }

    #[test]
    fn test_point_turn_cost() {
        let motion = MotionModel::new(RrtType::PointTurn, 1.0, FRAC_PI_2);

        // Facing along +x, target is straight up with a final heading of pi
        let a = Pose::with_heading([0.0, 0.0, 0.0], 0.0);
        let b = Pose::with_heading([0.0, 0.0, 1.0], PI);

        // Rotate pi/2, drive 1 m
        let (time_s, heading) = motion.cost_from_to(&a, &b, false);
        assert!((time_s - 2.0).abs() < 1e-5);
        assert!((heading - FRAC_PI_2).abs() < 1e-5);

        // Plus another pi/2 to match the target heading
        let (time_s, _) = motion.cost_from_to(&a, &b, true);
        assert!((time_s - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_unicycle_cost() {
        // Quarter-circle arc: from the origin facing +x to (1, 1), arriving
        // facing +y. Arc radius 1, length pi/2.
        let motion = MotionModel::new(RrtType::Unicycle, 1.0, 100.0);

        let a = Pose::with_heading([0.0, 0.0, 0.0], 0.0);
        let b = Pose::new([1.0, 0.0, 1.0]);

        let (time_s, heading) = motion.cost_from_to(&a, &b, false);
        assert!((time_s - FRAC_PI_2).abs() < 1e-5);
        assert!((heading - FRAC_PI_2).abs() < 1e-5);

        // With a tight angular limit the rotation dominates: 2|alpha|/omega
        let slow_turn = MotionModel::new(RrtType::Unicycle, 1.0, 0.5);
        let (time_s, _) = slow_turn.cost_from_to(&a, &b, false);
        assert!((time_s - 2.0 * FRAC_PI_4 / 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_unicycle_straight_degenerate() {
        let motion = MotionModel::new(RrtType::Unicycle, 2.0, 1.0);

        let a = Pose::with_heading([0.0, 0.0, 0.0], 0.0);
        let b = Pose::new([4.0, 0.0, 0.0]);

        let (time_s, heading) = motion.cost_from_to(&a, &b, false);
        assert!((time_s - 2.0).abs() < 1e-9);
        assert!(heading.abs() < 1e-9);
    }

    #[test]
    fn test_straight_samples_evenly_spaced() {
        let motion = MotionModel::new(RrtType::Shortest, 1.0, 1.0);

        let a = Pose::new([0.0, 0.0, 0.0]);
        let b = Pose::new([1.0, 0.0, 0.0]);

        let pts = motion.intermediate_pts(&a, &b, 0.05);
        assert_eq!(pts.len(), 19);
        for (i, p) in pts.iter().enumerate() {
            assert!((p.x - 0.05 * (i + 1) as f64).abs() < 1e-9);
            assert!(p.y.abs() < 1e-9);
        }
    }

    #[test]
    fn test_arc_samples_lie_on_arc() {
        let motion = MotionModel::new(RrtType::Unicycle, 1.0, 100.0);

        let a = Pose::with_heading([0.0, 0.0, 0.0], 0.0);
        let b = Pose::new([1.0, 0.0, 1.0]);

        // The quarter circle is centred on (0, 1) with radius 1
        let pts = motion.intermediate_pts(&a, &b, 0.05);
        assert!(!pts.is_empty());
        for p in pts {
            let r = Vector2::new(p.x, p.y - 1.0).norm();
            assert!((r - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_path_exists_straight() {
        // 20x20 px free map at 0.1 m/px with a wall along x = 1.0..1.1
        let mut img = GrayImage::from_pixel(20, 20, Luma([255u8]));
        for y in 0..20 {
            img.put_pixel(10, y, Luma([0u8]));
        }
        let map = RasterMap::from_luma(&img, 0.1, 0.0).unwrap();

        let motion = MotionModel::new(RrtType::Shortest, 1.0, 1.0);

        // Crossing the wall fails
        let a = Pose::new([0.5, 0.0, 0.5]);
        let b = Pose::new([1.5, 0.0, 0.5]);
        assert!(!motion.path_exists(&map, &a, &b));

        // Staying on one side succeeds
        let c = Pose::new([0.5, 0.0, 1.5]);
        assert!(motion.path_exists(&map, &a, &c));

        // A NaN endpoint is never feasible
        let nan = Pose::new([f64::NAN, 0.0, f64::NAN]);
        assert!(!motion.path_exists(&map, &a, &nan));
    }

    #[test]
    fn test_path_exists_arc() {
        // Free map with an obstacle at the apex of the quarter-circle arc
        // from (0.2, 0.6) to (0.6, 1.0), which passes near (0.48, 0.72)
        let mut img = GrayImage::from_pixel(20, 20, Luma([255u8]));
        let free_map = RasterMap::from_luma(&img, 0.1, 0.0).unwrap();

        let motion = MotionModel::new(RrtType::Unicycle, 1.0, 100.0);
        let a = Pose::with_heading([0.2, 0.0, 0.6], 0.0);
        let b = Pose::new([0.6, 0.0, 1.0]);

        assert!(motion.path_exists(&free_map, &a, &b));

        img.put_pixel(4, 7, Luma([0u8]));
        let blocked_map = RasterMap::from_luma(&img, 0.1, 0.0).unwrap();
        assert!(!motion.path_exists(&blocked_map, &a, &b));
    }

    #[test]
    fn test_reversed_bearing_arc_rejected_quickly() {
        // A target almost directly behind the heading produces an enormous
        // near-straight arc which leaves the map; the check must terminate
        let img = GrayImage::from_pixel(20, 20, Luma([255u8]));
        let map = RasterMap::from_luma(&img, 0.1, 0.0).unwrap();

        let motion = MotionModel::new(RrtType::Unicycle, 1.0, 100.0);
        let a = Pose::with_heading([1.0, 0.0, 1.0], 0.0);
        let b = Pose::with_heading([0.2, 0.0, 1.0], 0.0);

        assert!(!motion.path_exists(&map, &a, &b));
    }
}
