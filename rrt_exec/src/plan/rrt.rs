//! # RRT* Planner
//!
//! Grows an RRT* tree rooted at the start pose over the navigable space of a
//! [`NavMap`]. Each iteration inserts one node:
//!
//! 1. A candidate is drawn, either uniformly over the navigable space or as
//!    a polar offset around the incumbent path, and truncated so the new
//!    edge respects the maximum step length.
//! 2. On raster maps, half of all candidates are refined by the potential
//!    field, which drops them into the lowest-potential cell of a local
//!    window around the nearest tree node.
//! 3. The lowest-cost collision-free parent is chosen among the neighbours
//!    within the near threshold, and neighbours are rewired through the new
//!    node when that lowers their cost from the start.
//!
//! The node minimising cost-from-start plus cost-to-goal among those within
//! the near threshold of the goal is tracked as the best goal node; the best
//! path is its parent chain plus the goal itself.
//!
//! Sampling is driven by a generator reseeded from the iteration counter, so
//! a run recovered from a checkpoint continues exactly as the original run
//! would have.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::Value;
use std::f64::consts::PI;

use crate::map::{NavMap, DEFAULT_MAX_Y_DELTA_M, SAME_FLOOR_Z_TOLERANCE_M};

use super::{
    apf,
    checkpoint::{Checkpointer, TreeCheckpoint},
    grid_hash::GridHash,
    motion::MotionModel,
    params::RrtParams,
    pose::Pose,
    tree::{NodeId, Tree},
    PlanError,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Probability that an iteration samples uniformly rather than around the
/// incumbent path.
const UNIFORM_SAMPLE_PROBABILITY: f64 = 0.2;

/// Probability that a raster candidate is refined by the potential field.
const APF_REFINE_PROBABILITY: f64 = 0.5;

/// Radius of the polar offset drawn around incumbent-path seeds.
///
/// Units: meters
const PATH_BIAS_RADIUS_M: f64 = 1.5;

/// Candidate attempts per iteration before the iteration is abandoned.
const MAX_SAMPLE_ATTEMPTS: usize = 1000;

/// Iterations between refreshes of the best goal node.
const GOAL_REFRESH_ITERATIONS: u64 = 50;

/// Multiplier on the near threshold giving the potential-field window size.
const APF_WINDOW_SCALE: f64 = 1.2;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sampling-based motion planner over a navigable environment.
pub struct RrtPlanner<M> {
    params: RrtParams,
    motion: MotionModel,
    map: M,

    tree: Tree,
    grid: GridHash,

    start: Pose,
    goal: Pose,

    /// Baseline waypoints from the environment, empty for raster maps.
    waypoints: Vec<Pose>,

    best_goal_node: Option<NodeId>,

    checkpointer: Option<Checkpointer>,

    /// Lower bounds of the navigable space on the start's floor.
    bounds_min_m: (f64, f64),

    /// Side length of the potential-field window, zero on continuous maps.
    local_window_cells: usize,

    /// The next iteration to execute; greater than zero after a resume.
    next_iteration: u64,

    path_found: bool,

    seed: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<M: NavMap> RrtPlanner<M> {
    /// Create a planner rooted at the start pose.
    ///
    /// If the parameters name an output directory holding checkpoints for
    /// the same start and goal, the latest one is recovered and the run will
    /// continue from the iteration after it.
    pub fn new(
        params: RrtParams,
        mut map: M,
        start_pos_xzy: [f64; 3],
        start_heading_rad: f64,
        goal_pos_xzy: [f64; 3],
        seed: u64,
    ) -> Result<Self, PlanError> {
        params.validate()?;

        let motion = MotionModel::new(
            params.rrt_type,
            params.max_linear_velocity_ms,
            params.max_angular_velocity_rads(),
        );

        let start = Pose::with_heading(start_pos_xzy, start_heading_rad);
        let goal = Pose::new(goal_pos_xzy);

        let bounds_min_m = map.bounds(&start);

        let tree = Tree::new(start);
        let mut grid = GridHash::new(params.near_threshold_m, bounds_min_m);
        grid.insert(&start, tree.root());

        map.mark_goal((goal.x, goal.y));
        let waypoints = map.shortest_path_waypoints(&start, &goal);

        let local_window_cells = map
            .cell_size()
            .map(|cell_m| (APF_WINDOW_SCALE * params.near_threshold_m / cell_m).ceil() as usize)
            .unwrap_or(0);

        let checkpointer = match params.out_dir.as_ref() {
            Some(dir) => Some(Checkpointer::new(dir)?),
            None => None,
        };

        let mut planner = Self {
            params,
            motion,
            map,
            tree,
            grid,
            start,
            goal,
            waypoints,
            best_goal_node: None,
            checkpointer,
            bounds_min_m,
            local_window_cells,
            next_iteration: 0,
            path_found: false,
            seed,
        };

        planner.try_resume();

        Ok(planner)
    }

    /// Run the planner up to the given absolute iteration budget.
    ///
    /// Iterations already completed, in this instance or in a run recovered
    /// from a checkpoint, are skipped. Returns the best path found, empty
    /// when the goal was never reached.
    pub fn run(&mut self, iterations: u64) -> Result<Vec<Pose>, PlanError> {
        info!(
            "Generating tree: {} iterations, {:?} motion, {} nodes to start",
            iterations,
            self.motion.rrt_type(),
            self.tree.len()
        );

        for iteration in 0..=iterations {
            if iteration < self.next_iteration {
                continue;
            }

            let mut rng = self.iteration_rng(iteration);

            match self.grow_once(&mut rng) {
                Some(new_id) => {
                    self.note_goal_reached(new_id, iteration);

                    if iteration % GOAL_REFRESH_ITERATIONS == 0
                        || iteration % self.params.checkpoint_iterations == 0
                    {
                        self.refresh_best_goal_node();
                    }

                    if iteration > 0
                        && iteration % self.params.checkpoint_iterations == 0
                        && self.checkpointer.is_some()
                    {
                        let checkpoint = self.checkpoint();
                        if let Some(ck) = self.checkpointer.as_ref() {
                            ck.save(iteration, &checkpoint)?;
                        }
                        info!(
                            "Best cost at iteration {}: {} s",
                            iteration, checkpoint.best_path_time
                        );
                    }
                }
                None => {
                    debug!(
                        "Iteration {} abandoned after {} attempts",
                        iteration, MAX_SAMPLE_ATTEMPTS
                    );
                }
            }

            self.next_iteration = iteration + 1;
        }

        Ok(self.best_path())
    }

    /// The best path from start to goal, empty when the goal was never
    /// reached.
    pub fn best_path(&self) -> Vec<Pose> {
        let best = match self.best_goal_node {
            Some(id) => id,
            None => return Vec::new(),
        };

        let mut path: Vec<Pose> = self
            .tree
            .path_from_root(best)
            .into_iter()
            .map(|id| self.tree.pose(id))
            .collect();
        path.push(self.goal);

        path
    }

    /// Snapshot the tree into a durable representation.
    pub fn checkpoint(&mut self) -> TreeCheckpoint {
        let motion = self.motion;

        let mut graph = serde_json::Map::new();
        for id in self.tree.node_ids() {
            let parent_key = match self.tree.parent(id) {
                Some(parent) => self.tree.pose(parent).key(),
                None => String::new(),
            };
            graph.insert(self.tree.pose(id).key(), Value::String(parent_key));
        }

        let (best_goal_node, best_path_time) = match self.best_goal_node {
            Some(id) => {
                let pose = self.tree.pose(id);
                let cost_s = self.tree.cost_from_start(id, &motion)
                    + motion.cost_from_to(&pose, &self.goal, false).0;
                (pose.key(), cost_s)
            }
            None => (String::new(), -1.0),
        };

        TreeCheckpoint {
            start: self.start.key(),
            goal: self.goal.key(),
            best_goal_node,
            best_path_time,
            best_path_raw: self.best_path().iter().map(Pose::key).collect(),
            graph,
        }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn grid(&self) -> &GridHash {
        &self.grid
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn motion(&self) -> &MotionModel {
        &self.motion
    }

    pub fn params(&self) -> &RrtParams {
        &self.params
    }

    pub fn start(&self) -> Pose {
        self.start
    }

    pub fn goal(&self) -> Pose {
        self.goal
    }

    pub fn best_goal_node(&self) -> Option<NodeId> {
        self.best_goal_node
    }

    /// Total traversal time from the start to the given node. Units: seconds
    pub fn cost_from_start(&mut self, id: NodeId) -> f64 {
        let motion = self.motion;
        self.tree.cost_from_start(id, &motion)
    }

    // ---- SAMPLING ----

    /// Generator for one iteration. Reseeding per iteration makes resumed
    /// runs replay the remaining iterations exactly.
    fn iteration_rng(&self, iteration: u64) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ iteration.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Attempt to insert one new node, abandoning after a bounded number of
    /// candidate draws.
    fn grow_once(&mut self, rng: &mut StdRng) -> Option<NodeId> {
        for _ in 0..MAX_SAMPLE_ATTEMPTS {
            let sample_uniform = rng.gen::<f64>() < UNIFORM_SAMPLE_PROBABILITY;

            let (mut rand_pose, closest_id) = match self.draw_candidate(rng, sample_uniform) {
                Some(candidate) => candidate,
                None => continue,
            };

            if self.local_window_cells > 0 && rng.gen::<f64>() < APF_REFINE_PROBABILITY {
                rand_pose = self.refine_by_potential(rand_pose, closest_id);
            }

            if let Some(id) = self.connect(rand_pose) {
                return Some(id);
            }
        }

        None
    }

    /// Draw one candidate pose, together with its nearest tree node.
    ///
    /// Returns `None` when the draw is infeasible (off the start's floor,
    /// snapped into the void, or not navigable); such draws are simply
    /// retried by the caller.
    fn draw_candidate(&self, rng: &mut StdRng, sample_uniform: bool) -> Option<(Pose, NodeId)> {
        // Until a baseline path or a goal-reaching node exists there is
        // nothing to bias towards
        let no_bias_available = self.waypoints.is_empty() && self.best_goal_node.is_none();

        if sample_uniform || no_bias_available {
            let sample = self.map.sample_random_navigable(rng);
            if !sample.is_finite() {
                return None;
            }

            // The tree lives on the start's floor
            if (sample.z - self.start.z).abs() > SAME_FLOOR_Z_TOLERANCE_M {
                return None;
            }

            let closest_id = self.grid.nearest(&sample, &self.tree)?;
            let (truncated, changed) = self.steer(closest_id, sample);
            if changed && !self.map.is_navigable(&truncated, DEFAULT_MAX_Y_DELTA_M) {
                return None;
            }

            Some((truncated, closest_id))
        } else {
            // Seed the sample near the incumbent path: a baseline waypoint
            // before the goal has been reached, a node of the best path
            // afterwards
            let seed_pose = match self.best_goal_node {
                Some(best) => {
                    let path = self.tree.path_from_root(best);
                    self.tree.pose(path[rng.gen_range(0..path.len())])
                }
                None => self.waypoints[rng.gen_range(0..self.waypoints.len())],
            };

            let radius_m = PATH_BIAS_RADIUS_M * rng.gen::<f64>().sqrt();
            let theta_rad = rng.gen::<f64>() * 2.0 * PI;

            let snapped = self.map.snap([
                seed_pose.x + radius_m * theta_rad.cos(),
                seed_pose.z,
                seed_pose.y + radius_m * theta_rad.sin(),
            ]);

            let sample = Pose::new(snapped);
            if !sample.is_finite() || !self.map.is_navigable(&sample, DEFAULT_MAX_Y_DELTA_M) {
                return None;
            }

            // The nearest node is needed even when the sample isn't
            // truncated, as the potential-field window is centred on it
            let closest_id = self.grid.nearest(&sample, &self.tree)?;

            if self.best_goal_node.is_none() {
                let (truncated, changed) = self.steer(closest_id, sample);
                if changed && !self.map.is_navigable(&truncated, DEFAULT_MAX_Y_DELTA_M) {
                    return None;
                }
                Some((truncated, closest_id))
            } else {
                Some((sample, closest_id))
            }
        }
    }

    /// Truncate a candidate towards the given tree node so the edge length
    /// is at most the maximum step, re-projecting onto the surface when the
    /// candidate moved.
    ///
    /// Returns the (possibly unchanged) candidate and whether it moved.
    fn steer(&self, from_id: NodeId, candidate: Pose) -> (Pose, bool) {
        let from = self.tree.pose(from_id);

        let dist_m = from.dist_2d(&candidate);
        if dist_m <= self.params.max_distance_m {
            return (candidate, false);
        }

        let scale = self.params.max_distance_m / dist_m;
        let snapped = self.map.snap([
            from.x + (candidate.x - from.x) * scale,
            from.z,
            from.y + (candidate.y - from.y) * scale,
        ]);

        (Pose::new(snapped), true)
    }

    /// Replace the candidate with the lowest-potential position of a window
    /// centred on its nearest tree node.
    fn refine_by_potential(&self, candidate: Pose, closest_id: NodeId) -> Pose {
        let cell_m = match self.map.cell_size() {
            Some(c) => c,
            None => return candidate,
        };

        let closest = self.tree.pose(closest_id);
        let window = match self
            .map
            .local_window((closest.x, closest.y), self.local_window_cells)
        {
            Some(w) => w,
            None => return candidate,
        };

        let half_cells = (self.local_window_cells / 2) as f64;
        let origin_m = (
            closest.x - half_cells * cell_m,
            closest.y - half_cells * cell_m,
        );

        let (x_m, y_m) = apf::lowest_potential_position(
            &window,
            origin_m,
            cell_m,
            (closest.x, closest.y),
            (self.goal.x, self.goal.y),
            self.params.max_distance_m,
            &self.params.apf,
        );

        Pose::new([x_m, candidate.z, y_m])
    }

    // ---- TREE GROWTH ----

    /// Wire a candidate into the tree: choose the lowest-cost feasible
    /// parent, insert, and rewire the remaining neighbours through the new
    /// node where that lowers their cost.
    ///
    /// Returns `None` when the candidate has no feasible neighbourhood.
    fn connect(&mut self, candidate: Pose) -> Option<NodeId> {
        let motion = self.motion;

        // Neighbourhood: near-threshold ball around the candidate, excluding
        // its own position, connected by a feasible primitive
        let mut neighbours = Vec::new();
        for id in self.grid.near(&candidate) {
            let pose = self.tree.pose(id);
            if pose.dist_2d(&candidate) < self.params.near_threshold_m
                && (pose.x, pose.y) != (candidate.x, candidate.y)
                && motion.path_exists(&self.map, &pose, &candidate)
            {
                neighbours.push(id);
            }
        }

        if neighbours.is_empty() {
            return None;
        }

        // Lowest-cost parent; ties keep the first neighbour found
        let mut best: Option<(usize, f64, f64, f64)> = None;
        for (idx, &id) in neighbours.iter().enumerate() {
            let pose = self.tree.pose(id);
            let (edge_s, heading_rad) = motion.cost_from_to(&pose, &candidate, false);
            let total_s = self.tree.cost_from_start(id, &motion) + edge_s;

            if !total_s.is_finite() {
                continue;
            }

            if best.map(|(_, t, _, _)| total_s < t).unwrap_or(true) {
                best = Some((idx, total_s, edge_s, heading_rad));
            }
        }

        let (best_idx, _, best_edge_s, best_heading_rad) = best?;
        let parent_id = neighbours[best_idx];

        // The new node arrives with the heading of its best edge
        let new_pose = Pose::with_heading(
            [candidate.x, candidate.z, candidate.y],
            best_heading_rad,
        );

        if self.tree.contains(&new_pose) {
            return None;
        }

        let new_id = self.tree.insert(new_pose, parent_id, Some(best_edge_s))?;
        self.grid.insert(&new_pose, new_id);
        self.map.mark_node((new_pose.x, new_pose.y));

        // Rewire the remaining neighbours through the new node
        for (idx, &id) in neighbours.iter().enumerate() {
            if idx == best_idx || id == self.tree.root() {
                continue;
            }

            let pose = self.tree.pose(id);
            let (edge_s, _) = motion.cost_from_to(&new_pose, &pose, true);
            let rewired_s = self.tree.cost_from_start(new_id, &motion) + edge_s;

            if rewired_s.is_finite()
                && rewired_s < self.tree.cost_from_start(id, &motion)
                && motion.path_exists(&self.map, &new_pose, &pose)
            {
                self.tree.set_parent(id, new_id, edge_s);
            }
        }

        Some(new_id)
    }

    // ---- GOAL TRACKING ----

    /// Log the first time a node lands within reach of the goal.
    fn note_goal_reached(&mut self, id: NodeId, iteration: u64) {
        if self.path_found {
            return;
        }

        let pose = self.tree.pose(id);
        if pose.dist_2d(&self.goal) < self.params.near_threshold_m
            && self.motion.path_exists(&self.map, &pose, &self.goal)
        {
            self.path_found = true;
            info!("Path found at iteration {}", iteration);
        }
    }

    /// Re-derive the best goal node from the goal's neighbourhood.
    ///
    /// The incumbent is only replaced when the scan yields a candidate; cost
    /// ties keep the first node in enumeration order.
    fn refresh_best_goal_node(&mut self) {
        let motion = self.motion;

        let mut best: Option<(f64, NodeId)> = None;
        for id in self.grid.near(&self.goal) {
            let pose = self.tree.pose(id);

            if pose.dist_2d(&self.goal) >= self.params.near_threshold_m {
                continue;
            }
            if !motion.path_exists(&self.map, &pose, &self.goal) {
                continue;
            }

            let cost_s = self.tree.cost_from_start(id, &motion)
                + motion.cost_from_to(&pose, &self.goal, false).0;
            if !cost_s.is_finite() {
                continue;
            }

            if best.map(|(c, _)| cost_s < c).unwrap_or(true) {
                best = Some((cost_s, id));
            }
        }

        if let Some((_, id)) = best {
            self.best_goal_node = Some(id);
        }
    }

    // ---- CHECKPOINT RECOVERY ----

    /// Recover the latest checkpoint from the output directory, if any.
    fn try_resume(&mut self) {
        let recovered = match self.checkpointer.as_ref() {
            Some(ck) => ck.load_latest(),
            None => return,
        };

        if let Some((iteration, checkpoint)) = recovered {
            self.apply_checkpoint(iteration, &checkpoint);
        }
    }

    /// Rebuild the planner state from a checkpoint taken at the given
    /// iteration.
    ///
    /// A checkpoint for a different start or goal, or one whose graph is
    /// malformed, is logged and ignored; planning then restarts from
    /// scratch.
    pub fn apply_checkpoint(&mut self, iteration: u64, checkpoint: &TreeCheckpoint) {
        if checkpoint.start != self.start.key() || checkpoint.goal != self.goal.key() {
            warn!(
                "Checkpoint is for a different plan (start {}, goal {}), ignoring it",
                checkpoint.start, checkpoint.goal
            );
            return;
        }

        // Collect (child, parent) pose pairs in file order, which is the
        // order nodes were originally inserted
        let mut edges = Vec::with_capacity(checkpoint.graph.len());
        for (child_key, parent_value) in checkpoint.graph.iter() {
            let parent_key = match parent_value.as_str() {
                Some(k) => k,
                None => {
                    warn!("Checkpoint graph holds a non-string parent, ignoring the checkpoint");
                    return;
                }
            };

            if parent_key.is_empty() {
                // The root entry must be the start itself
                if child_key != &checkpoint.start {
                    warn!("Checkpoint graph has a stray root entry, ignoring the checkpoint");
                    return;
                }
                continue;
            }

            let child = match Pose::from_key(child_key) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Couldn't parse checkpoint pose key: {}", e);
                    return;
                }
            };
            let parent = match Pose::from_key(parent_key) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Couldn't parse checkpoint pose key: {}", e);
                    return;
                }
            };

            edges.push((child, parent));
        }

        let tree = match Tree::from_parent_map(self.start, &edges) {
            Some(t) => t,
            None => {
                warn!("Checkpoint graph is not a tree rooted at the start, ignoring it");
                return;
            }
        };

        // Rebuild the spatial index and the info map in insertion order
        let mut grid = GridHash::new(self.params.near_threshold_m, self.bounds_min_m);
        for id in tree.node_ids() {
            let pose = tree.pose(id);
            grid.insert(&pose, id);
            if id != tree.root() {
                self.map.mark_node((pose.x, pose.y));
            }
        }

        let best_goal_node = if checkpoint.best_goal_node.is_empty() {
            None
        } else {
            match Pose::from_key(&checkpoint.best_goal_node).ok().and_then(|p| tree.get(&p)) {
                Some(id) => Some(id),
                None => {
                    warn!("Checkpoint best goal node is not in the tree, dropping it");
                    None
                }
            }
        };

        info!(
            "Resumed from checkpoint at iteration {} with {} nodes",
            iteration,
            tree.len()
        );

        self.tree = tree;
        self.grid = grid;
        self.best_goal_node = best_goal_node;
        self.path_found = best_goal_node.is_some();
        self.next_iteration = iteration + 1;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::RasterMap;
    use crate::plan::apf::ApfParams;
    use crate::plan::motion::RrtType;
    use image::{GrayImage, Luma};
    use std::path::PathBuf;

    /// An all-free square raster of the given size in pixels.
    fn free_image(size: u32) -> GrayImage {
        GrayImage::from_pixel(size, size, Luma([255u8]))
    }

    /// A raster with a vertical wall at the given pixel column, free only in
    /// the given row gap.
    fn wall_image(size: u32, wall_col: u32, gap_rows: std::ops::Range<u32>) -> GrayImage {
        let mut img = free_image(size);
        for row in 0..size {
            if !gap_rows.contains(&row) {
                img.put_pixel(wall_col, row, Luma([0u8]));
            }
        }
        img
    }

    fn params(rrt_type: RrtType) -> RrtParams {
        RrtParams {
            max_linear_velocity_ms: 1.0,
            max_angular_velocity_degs: 90.0,
            agent_radius_m: 0.1,
            near_threshold_m: 1.5,
            max_distance_m: 1.0,
            rrt_type,
            meters_per_pixel: 0.1,
            out_dir: None,
            checkpoint_iterations: 500,
            apf: ApfParams::default(),
        }
    }

    fn raster_planner(
        img: &GrayImage,
        params: RrtParams,
        start_pos: [f64; 3],
        start_heading: f64,
        goal_pos: [f64; 3],
    ) -> RrtPlanner<RasterMap> {
        let map =
            RasterMap::from_luma(img, params.meters_per_pixel, params.agent_radius_m).unwrap();
        RrtPlanner::new(params, map, start_pos, start_heading, goal_pos, 0).unwrap()
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rrt_plan_{}_{}", name, std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    /// Check the structural invariants of the planner state.
    fn assert_invariants(planner: &mut RrtPlanner<RasterMap>) {
        let motion = *planner.motion();

        // Exactly one root, which is the start
        let mut roots = 0;
        for id in planner.tree().node_ids() {
            if planner.tree().parent(id).is_none() {
                roots += 1;
                assert_eq!(planner.tree().pose(id), planner.start());
            }
        }
        assert_eq!(roots, 1);

        let node_count = planner.tree().len();
        for id in planner.tree().node_ids() {
            // Every node reaches the root in finitely many steps
            let mut current = id;
            let mut steps = 0;
            while let Some(parent) = planner.tree().parent(current) {
                current = parent;
                steps += 1;
                assert!(steps <= node_count, "parent chain does not terminate");
            }
            assert_eq!(current, planner.tree().root());

            // Stored edge costs match the motion model
            if let (Some(parent), Some(stored_s)) = (
                planner.tree().parent(id),
                planner.tree().cost_from_parent(id),
            ) {
                let (expected_s, _) = motion.cost_from_to(
                    &planner.tree().pose(parent),
                    &planner.tree().pose(id),
                    true,
                );
                assert!(
                    (stored_s - expected_s).abs() < 1e-4,
                    "edge cost drifted: stored {} expected {}",
                    stored_s,
                    expected_s
                );
            }

            // Every node sits in the bucket of its coordinates
            let pose = planner.tree().pose(id);
            let cell = planner.grid().cell_index(&pose);
            assert!(planner.grid().bucket(cell).contains(&id));
        }

        // The best goal node is in reach of the goal
        if let Some(best) = planner.best_goal_node() {
            let pose = planner.tree().pose(best);
            assert!(pose.dist_2d(&planner.goal()) < planner.params().near_threshold_m);
            assert!(motion.path_exists(planner.map(), &pose, &planner.goal()));
        }
    }

    #[test]
    fn test_open_field_reaches_goal() {
        let img = free_image(200);
        let mut planner = raster_planner(
            &img,
            params(RrtType::Shortest),
            [1.0, 0.0, 1.0],
            0.0,
            [18.0, 0.0, 18.0],
        );

        let path = planner.run(2000).unwrap();
        assert!(!path.is_empty());

        // The best cost approaches the straight-line time of 24.04 s
        let checkpoint = planner.checkpoint();
        let straight_s = (17.0f64 * 17.0 + 17.0 * 17.0).sqrt();
        assert!(
            checkpoint.best_path_time < straight_s * 1.15,
            "best path time {} further than 15% from {}",
            checkpoint.best_path_time,
            straight_s
        );
        assert!(checkpoint.best_path_time >= straight_s - 1e-6);

        // The path starts at the start and ends at the goal
        assert_eq!(path[0], planner.start());
        assert_eq!(*path.last().unwrap(), planner.goal());

        assert_invariants(&mut planner);
    }

    #[test]
    fn test_wall_with_gap() {
        // Wall along x = 10.0..10.1 m with a 2 m gap centred on y = 10
        let img = wall_image(200, 100, 90..110);
        let mut planner = raster_planner(
            &img,
            params(RrtType::Shortest),
            [1.0, 0.0, 10.0],
            0.0,
            [19.0, 0.0, 10.0],
        );

        let path = planner.run(4000).unwrap();
        assert!(!path.is_empty());

        // Every edge of the path is collision free
        let motion = *planner.motion();
        for pair in path.windows(2) {
            assert!(motion.path_exists(planner.map(), &pair[0], &pair[1]));
        }

        // The path crosses the wall inside the gap
        let mut crossed = false;
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if (a.x - 10.05) * (b.x - 10.05) <= 0.0 && (a.x - b.x).abs() > 1e-12 {
                let t = (10.05 - a.x) / (b.x - a.x);
                let y_cross = a.y + t * (b.y - a.y);
                assert!(y_cross > 8.9 && y_cross < 11.1, "crossed at y = {}", y_cross);
                crossed = true;
            }
        }
        assert!(crossed);

        assert_invariants(&mut planner);
    }

    #[test]
    fn test_motion_variant_cost_ordering() {
        // Start facing away from the goal: the point turn pays rotations in
        // place, the unicycle pays arcs, the shortest variant pays nothing
        let img = free_image(200);

        let mut costs = Vec::new();
        for rrt_type in [RrtType::Shortest, RrtType::Unicycle, RrtType::PointTurn].iter() {
            let mut planner = raster_planner(
                &img,
                params(*rrt_type),
                [1.0, 0.0, 1.0],
                PI,
                [18.0, 0.0, 18.0],
            );
            planner.run(2000).unwrap();

            let checkpoint = planner.checkpoint();
            assert!(
                checkpoint.best_path_time > 0.0,
                "{:?} found no path",
                rrt_type
            );
            costs.push(checkpoint.best_path_time);
        }

        assert!(costs[0] < costs[1], "shortest {} !< unicycle {}", costs[0], costs[1]);
        assert!(costs[1] < costs[2], "unicycle {} !< point turn {}", costs[1], costs[2]);
    }

    #[test]
    fn test_checkpoint_resume_matches_fresh_run() {
        let img = free_image(100);
        let dir = test_dir("resume");

        let mut resumable_params = params(RrtType::Shortest);
        resumable_params.out_dir = Some(dir.clone());
        resumable_params.checkpoint_iterations = 300;

        // First run stops after writing the checkpoint at iteration 300
        let mut first = raster_planner(
            &img,
            resumable_params.clone(),
            [1.0, 0.0, 1.0],
            0.0,
            [8.0, 0.0, 8.0],
        );
        first.run(300).unwrap();

        // Second planner recovers the checkpoint and finishes the budget
        let mut resumed = raster_planner(
            &img,
            resumable_params,
            [1.0, 0.0, 1.0],
            0.0,
            [8.0, 0.0, 8.0],
        );
        assert!(resumed.tree().len() > 1, "checkpoint was not recovered");
        resumed.run(600).unwrap();

        // A fresh run over the full budget produces the identical tree
        let mut fresh = raster_planner(
            &img,
            params(RrtType::Shortest),
            [1.0, 0.0, 1.0],
            0.0,
            [8.0, 0.0, 8.0],
        );
        fresh.run(600).unwrap();

        let resumed_ck = resumed.checkpoint();
        let fresh_ck = fresh.checkpoint();

        assert_eq!(resumed_ck.start, fresh_ck.start);
        assert_eq!(resumed_ck.goal, fresh_ck.goal);
        assert_eq!(resumed_ck.best_goal_node, fresh_ck.best_goal_node);
        assert_eq!(resumed_ck.graph, fresh_ck.graph);

        // Node insertion order is reproduced too
        let resumed_keys: Vec<&String> = resumed_ck.graph.keys().collect();
        let fresh_keys: Vec<&String> = fresh_ck.graph.keys().collect();
        assert_eq!(resumed_keys, fresh_keys);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_neighbourhood_config_rejected() {
        let img = free_image(100);
        let map = RasterMap::from_luma(&img, 0.1, 0.1).unwrap();

        let mut bad = params(RrtType::Shortest);
        bad.near_threshold_m = 1.0;
        bad.max_distance_m = 1.5;

        let result = RrtPlanner::new(bad, map, [1.0, 0.0, 1.0], 0.0, [8.0, 0.0, 8.0], 0);
        assert!(matches!(
            result,
            Err(PlanError::InvalidNeighbourhood { .. })
        ));
    }

    #[test]
    fn test_equal_radii_admitted() {
        let img = free_image(100);

        let mut equal = params(RrtType::Shortest);
        equal.max_distance_m = equal.near_threshold_m;

        let mut planner = raster_planner(&img, equal, [1.0, 0.0, 1.0], 0.0, [8.0, 0.0, 8.0]);
        let path = planner.run(300).unwrap();
        assert!(!path.is_empty());
    }

    #[test]
    fn test_unreachable_goal() {
        // A full-height wall with no gap separates start and goal
        let img = wall_image(200, 100, 0..0);
        let mut planner = raster_planner(
            &img,
            params(RrtType::Shortest),
            [1.0, 0.0, 10.0],
            0.0,
            [19.0, 0.0, 10.0],
        );

        let path = planner.run(5000).unwrap();

        assert!(path.is_empty());
        assert!(planner.best_goal_node().is_none());
        assert_invariants(&mut planner);
    }

    #[test]
    fn test_costs_never_increase() {
        let img = free_image(100);
        let mut planner = raster_planner(
            &img,
            params(RrtType::Shortest),
            [1.0, 0.0, 1.0],
            0.0,
            [8.0, 0.0, 8.0],
        );

        planner.run(500).unwrap();

        let ids: Vec<NodeId> = planner.tree().node_ids().collect();
        let before: Vec<(NodeId, f64)> = ids
            .into_iter()
            .map(|id| (id, planner.cost_from_start(id)))
            .collect();

        // Continue the same run; rewiring may only lower costs
        planner.run(1000).unwrap();

        for (id, cost_before) in before {
            assert!(planner.cost_from_start(id) <= cost_before + 1e-9);
        }
    }

    #[test]
    fn test_steer_leaves_short_candidates_unchanged() {
        let img = free_image(100);
        let planner = raster_planner(
            &img,
            params(RrtType::Shortest),
            [1.0, 0.0, 1.0],
            0.0,
            [8.0, 0.0, 8.0],
        );

        let root = planner.tree().root();

        // The root itself is within the step limit of the root
        let (unchanged, moved) = planner.steer(root, planner.start());
        assert_eq!(unchanged, planner.start());
        assert!(!moved);

        // A distant candidate is pulled onto the step-limit circle
        let far = Pose::new([5.0, 0.0, 1.0]);
        let (truncated, moved) = planner.steer(root, far);
        assert!(moved);
        assert!((planner.start().dist_2d(&truncated) - 1.0).abs() < 1e-5);
    }
}
