//! # Map
//!
//! Environment adapters for the planner. The planner itself is independent of
//! how the world is represented; everything it needs is expressed by the
//! [`NavMap`] trait. Two concrete adapters are provided:
//!
//! - [`RasterMap`] - A PNG-backed occupancy map, where free pixels are light
//!   and obstacles are inflated by the vehicle radius.
//! - [`MeshMap`] - An adapter over a host-provided 3D navmesh pathfinder,
//!   expressed through the [`MeshBackend`] trait.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod mesh;
pub mod raster;

pub use mesh::{MeshBackend, MeshMap};
pub use raster::RasterMap;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use ndarray::Array2;
use rand::RngCore;

use crate::plan::pose::Pose;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default vertical tolerance for navigability queries.
///
/// Units: meters
pub const DEFAULT_MAX_Y_DELTA_M: f64 = 0.5;

/// Vertical separation within which two points count as being on the same
/// floor of the environment.
///
/// Units: meters
pub const SAME_FLOOR_Z_TOLERANCE_M: f64 = 0.8;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Byte labels used in raster info maps and potential-field windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellLabel {
    Free = 0,
    Obstacle = 1,
    Node = 2,
    Goal = 3,
}

/// Possible errors raised while constructing a map adapter.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Couldn't read the map image: {0}")]
    ImageLoadFailed(#[from] image::ImageError),

    #[error("Map image is empty")]
    EmptyImage,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The set of environment capabilities the planner depends on.
///
/// Positions handed across this boundary use the world convention `[x, z, y]`
/// with `z` vertical, matching [`Pose::as_pos`].
pub trait NavMap {
    /// Test whether the given pose lies on navigable ground.
    fn is_navigable(&self, pose: &Pose, max_y_delta_m: f64) -> bool;

    /// Draw a uniformly distributed random pose over the navigable space.
    fn sample_random_navigable(&self, rng: &mut dyn RngCore) -> Pose;

    /// Project the given position onto the navigable surface.
    ///
    /// Returns an all-NaN position when no surface exists below the point;
    /// callers must tolerate this.
    fn snap(&self, pos_xzy: [f64; 3]) -> [f64; 3];

    /// Waypoints of the environment's own shortest path between the poses.
    ///
    /// May be empty when the environment cannot provide a baseline path.
    fn shortest_path_waypoints(&self, start: &Pose, goal: &Pose) -> Vec<Pose>;

    /// Minimum `(x, y)` over the navigable surface on the start's floor.
    fn bounds(&self, start: &Pose) -> (f64, f64);

    /// Square occupancy window of [`CellLabel`] bytes centred on `centre_m`.
    ///
    /// Only raster maps provide windows; the default returns `None`.
    fn local_window(&self, _centre_m: (f64, f64), _size_cells: usize) -> Option<Array2<u8>> {
        None
    }

    /// Record a tree node in the info map. No-op for continuous maps.
    fn mark_node(&mut self, _pos_m: (f64, f64)) {}

    /// Record the goal in the info map. No-op for continuous maps.
    fn mark_goal(&mut self, _pos_m: (f64, f64)) {}

    /// Cell size of the underlying raster, `None` for continuous maps.
    ///
    /// Units: meters
    fn cell_size(&self) -> Option<f64> {
        None
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CellLabel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
