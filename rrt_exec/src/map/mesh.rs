//! # Mesh Map
//!
//! An adapter over a host-provided 3D navmesh pathfinder. The pathfinder
//! itself lives outside this crate (typically wrapping a simulator); the
//! [`MeshBackend`] trait captures the calls the adapter makes into it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use rand::RngCore;

use super::{NavMap, SAME_FLOOR_Z_TOLERANCE_M};
use crate::plan::pose::Pose;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The navmesh pathfinder capabilities consumed by [`MeshMap`].
///
/// Positions use the world convention `[x, z, y]` with `z` vertical. Hosts
/// wrapping a pathfinder which cannot satisfy a call should return the NaN
/// sentinel (for `snap_point`) or an empty vector.
pub trait MeshBackend {
    /// Test whether the vehicle can stand at the given position.
    fn is_navigable(&self, pos_xzy: [f64; 3], max_y_delta_m: f64) -> bool;

    /// Draw a uniformly distributed random position on the mesh.
    fn random_navigable_point(&self, rng: &mut dyn RngCore) -> [f64; 3];

    /// Project the given position onto the mesh. All-NaN when no surface
    /// exists below the point.
    fn snap_point(&self, pos_xzy: [f64; 3]) -> [f64; 3];

    /// All vertices of the navigation mesh.
    fn mesh_vertices(&self) -> Vec<[f64; 3]>;

    /// Waypoints of the backend's own shortest path between the positions,
    /// empty when no path exists.
    fn find_path(&self, start_xzy: [f64; 3], end_xzy: [f64; 3]) -> Vec<[f64; 3]>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Navmesh-backed environment adapter.
#[derive(Debug, Clone)]
pub struct MeshMap<B> {
    backend: B,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<B: MeshBackend> MeshMap<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: MeshBackend> NavMap for MeshMap<B> {
    fn is_navigable(&self, pose: &Pose, max_y_delta_m: f64) -> bool {
        self.backend.is_navigable(pose.as_pos(), max_y_delta_m)
    }

    fn sample_random_navigable(&self, rng: &mut dyn RngCore) -> Pose {
        Pose::new(self.backend.random_navigable_point(rng))
    }

    fn snap(&self, pos_xzy: [f64; 3]) -> [f64; 3] {
        self.backend.snap_point(pos_xzy)
    }

    fn shortest_path_waypoints(&self, start: &Pose, goal: &Pose) -> Vec<Pose> {
        self.backend
            .find_path(start.as_pos(), goal.as_pos())
            .into_iter()
            .map(Pose::new)
            .collect()
    }

    fn bounds(&self, start: &Pose) -> (f64, f64) {
        let mut x_min = f64::INFINITY;
        let mut y_min = f64::INFINITY;

        // Only vertices on the start's floor contribute to the bounds
        for vertex in self.backend.mesh_vertices() {
            let pose = Pose::new(vertex);
            if (pose.z - start.z).abs() < SAME_FLOOR_Z_TOLERANCE_M {
                x_min = x_min.min(pose.x);
                y_min = y_min.min(pose.y);
            }
        }

        if !x_min.is_finite() || !y_min.is_finite() {
            warn!("No mesh vertices found on the start's floor, using zero bounds");
            return (0.0, 0.0);
        }

        (x_min, y_min)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
