//! # RRT* Planner Library
//!
//! This library implements a sampling-based motion planner for ground
//! vehicles. It grows an RRT* tree over a 2D navigable environment, with the
//! cost of an edge being the kinematic traversal time between the two poses
//! rather than their euclidean separation. Sampling is biased towards the
//! goal by a local artificial potential field, which pulls candidate samples
//! towards the goal and pushes them away from obstacles and existing tree
//! nodes.
//!
//! The library is split into two modules:
//! - [`map`] - Environment adapters providing navigability queries, either
//!   raster (PNG) based or backed by a host-provided 3D navmesh.
//! - [`plan`] - The planner itself: pose and tree representations, the
//!   spatial index, motion-variant cost models, the potential-field sampler,
//!   the RRT* loop and the tree checkpointer.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod map;
pub mod plan;
