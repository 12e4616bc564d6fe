//! # Planner
//!
//! The planning module. [`RrtPlanner`] grows an RRT* tree rooted at the
//! start pose over the navigable space of a [`crate::map::NavMap`],
//! tracking the best node from which the goal can be reached. The supporting
//! pieces are:
//!
//! - [`pose`] - Pose representation with exact, key-based identity.
//! - [`tree`] - Arena-backed parent tree over poses.
//! - [`grid_hash`] - Fixed-cell spatial index for neighbourhood queries.
//! - [`motion`] - Traversal-time cost models for the motion variants.
//! - [`apf`] - Potential-field refinement of raw samples.
//! - [`checkpoint`] - Durable JSON snapshots of the tree.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod apf;
pub mod checkpoint;
pub mod grid_hash;
pub mod motion;
pub mod params;
pub mod pose;
pub mod rrt;
pub mod tree;

pub use motion::{MotionModel, RrtType};
pub use params::RrtParams;
pub use pose::Pose;
pub use rrt::RrtPlanner;
pub use tree::{NodeId, Tree};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io;

use crate::map::MapError;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible errors raised by the planner.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error(
        "near_threshold_m ({near_threshold_m}) must be greater than or equal to \
         max_distance_m ({max_distance_m})"
    )]
    InvalidNeighbourhood {
        near_threshold_m: f64,
        max_distance_m: f64,
    },

    #[error("checkpoint_iterations must be greater than zero")]
    InvalidCheckpointInterval,

    #[error("Couldn't create the checkpoint directory: {0}")]
    CheckpointDirCreateFailed(io::Error),

    #[error("Couldn't write the checkpoint file: {0}")]
    CheckpointWriteFailed(io::Error),

    #[error("Couldn't serialize the tree checkpoint: {0}")]
    CheckpointSerializeFailed(serde_json::Error),

    #[error("Couldn't read the checkpoint file: {0}")]
    CheckpointReadFailed(io::Error),

    #[error("Couldn't parse the checkpoint file: {0}")]
    CheckpointParseFailed(serde_json::Error),

    #[error(transparent)]
    Map(#[from] MapError),
}
