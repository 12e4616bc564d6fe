//! # Pose
//!
//! A planar pose: a 3D position plus a heading in the plane. Poses are the
//! identity of tree nodes, so equality has to be exact and hashable. To get
//! that with floating point coordinates, every component is quantized to the
//! canonical text precision on construction. Two poses are then equal iff
//! their text keys are equal, and a pose survives a round trip through its
//! key unchanged.
//!
//! The world convention is `[x, z, y]` with `z` vertical; the planner works
//! in the `(x, y)` plane.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use std::hash::{Hash, Hasher};

use util::maths::wrap_to_pi;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of decimal places kept in pose coordinates and text keys.
const KEY_DECIMAL_PLACES: usize = 5;

/// Scale factor corresponding to [`KEY_DECIMAL_PLACES`].
const KEY_SCALE: f64 = 1e5;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An immutable planar pose.
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    /// Position along x. Units: meters
    pub x: f64,

    /// Position along y. Units: meters
    pub y: f64,

    /// Height above the ground plane. Units: meters
    pub z: f64,

    /// Heading in the plane, in (-pi, pi]. Units: radians
    pub heading: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible errors raised while parsing a pose key.
#[derive(Debug, thiserror::Error)]
pub enum PoseKeyError {
    #[error("Expected 4 '_'-separated fields in the pose key, found {0}")]
    WrongFieldCount(usize),

    #[error("Couldn't parse a pose key field: {0}")]
    BadField(#[from] std::num::ParseFloatError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pose {
    /// Create a pose with zero heading from an `[x, z, y]` position.
    pub fn new(pos_xzy: [f64; 3]) -> Self {
        Self::with_heading(pos_xzy, 0.0)
    }

    /// Create a pose from an `[x, z, y]` position and a heading.
    ///
    /// The heading is wrapped into (-pi, pi] before storage.
    pub fn with_heading(pos_xzy: [f64; 3], heading_rad: f64) -> Self {
        Self {
            x: quantize(pos_xzy[0]),
            z: quantize(pos_xzy[1]),
            y: quantize(pos_xzy[2]),
            heading: quantize(wrap_to_pi(heading_rad)),
        }
    }

    /// The position of this pose in world convention, `[x, z, y]`.
    pub fn as_pos(&self) -> [f64; 3] {
        [self.x, self.z, self.y]
    }

    /// True if all components are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.heading.is_finite()
    }

    /// Euclidean distance to the other pose in the plane.
    pub fn dist_2d(&self, other: &Pose) -> f64 {
        Vector2::new(other.x - self.x, other.y - self.y).norm()
    }

    /// Direction from this pose to the other pose, in radians.
    pub fn bearing_to(&self, other: &Pose) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Canonical text key of this pose, `"{x}_{y}_{z}_{heading}"`.
    ///
    /// Keys define pose equality and are the on-disk identity of tree nodes.
    pub fn key(&self) -> String {
        format!(
            "{:.prec$}_{:.prec$}_{:.prec$}_{:.prec$}",
            self.x,
            self.y,
            self.z,
            self.heading,
            prec = KEY_DECIMAL_PLACES
        )
    }

    /// Parse a pose from its canonical text key.
    pub fn from_key(key: &str) -> Result<Self, PoseKeyError> {
        let fields: Vec<&str> = key.split('_').collect();
        if fields.len() != 4 {
            return Err(PoseKeyError::WrongFieldCount(fields.len()));
        }

        let x: f64 = fields[0].parse()?;
        let y: f64 = fields[1].parse()?;
        let z: f64 = fields[2].parse()?;
        let heading: f64 = fields[3].parse()?;

        Ok(Self::with_heading([x, z, y], heading))
    }
}

impl PartialEq for Pose {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.z.to_bits() == other.z.to_bits()
            && self.heading.to_bits() == other.heading.to_bits()
    }
}

impl Eq for Pose {}

impl Hash for Pose {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
        self.z.to_bits().hash(state);
        self.heading.to_bits().hash(state);
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Quantize a coordinate to the canonical key precision.
///
/// NaN passes through so snap sentinels remain detectable. Negative zero is
/// normalised to positive zero, keeping keys unambiguous.
fn quantize(value: f64) -> f64 {
    (value * KEY_SCALE).round() / KEY_SCALE + 0.0
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
