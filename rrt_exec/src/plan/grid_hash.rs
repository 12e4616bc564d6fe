//! # Grid Hash
//!
//! A coarse spatial index over tree nodes. Nodes are bucketed into a fixed
//! grid whose cell size equals the planner's neighbourhood radius, which
//! makes the neighbourhood query a fixed 4-cell lookup and the
//! nearest-node query an expanding ring search.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use ordered_float::OrderedFloat;
use std::collections::HashMap;

use super::pose::Pose;
use super::tree::{NodeId, Tree};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Fixed-cell spatial index over tree nodes.
#[derive(Debug, Clone)]
pub struct GridHash {
    /// Size of each grid cell. Units: meters
    cell_size_m: f64,

    /// Minimum x over the navigable space. Units: meters
    x_min_m: f64,

    /// Minimum y over the navigable space. Units: meters
    y_min_m: f64,

    buckets: HashMap<(i64, i64), Vec<NodeId>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GridHash {
    /// Create an empty index with the given cell size and lower bounds.
    pub fn new(cell_size_m: f64, bounds_min_m: (f64, f64)) -> Self {
        Self {
            cell_size_m,
            x_min_m: bounds_min_m.0,
            y_min_m: bounds_min_m.1,
            buckets: HashMap::new(),
        }
    }

    /// The grid cell containing the given pose.
    pub fn cell_index(&self, pose: &Pose) -> (i64, i64) {
        (
            ((pose.x - self.x_min_m) / self.cell_size_m).floor() as i64,
            ((pose.y - self.y_min_m) / self.cell_size_m).floor() as i64,
        )
    }

    /// The ids bucketed in the given cell.
    pub fn bucket(&self, cell: (i64, i64)) -> &[NodeId] {
        self.buckets.get(&cell).map(|b| b.as_slice()).unwrap_or(&[])
    }

    /// Add a node to the bucket of its pose.
    pub fn insert(&mut self, pose: &Pose, id: NodeId) {
        let cell = self.cell_index(pose);
        self.buckets.entry(cell).or_insert_with(Vec::new).push(id);
    }

    /// Nodes in the 2x2 block of cells around the pose.
    ///
    /// The block extends towards whichever cell boundary the pose is closer
    /// to, so together the four cells cover the pose's neighbourhood. No
    /// distance filter is applied here.
    pub fn near(&self, pose: &Pose) -> Vec<NodeId> {
        let (i, j) = self.cell_index(pose);

        let left = (pose.x - self.x_min_m).rem_euclid(self.cell_size_m) < self.cell_size_m / 2.0;
        let down = (pose.y - self.y_min_m).rem_euclid(self.cell_size_m) < self.cell_size_m / 2.0;

        let di = if left { -1 } else { 1 };
        let dj = if down { -1 } else { 1 };

        let mut ids = Vec::new();
        for cell in [(i, j), (i + di, j), (i + di, j + dj), (i, j + dj)].iter() {
            ids.extend_from_slice(self.bucket(*cell));
        }

        ids
    }

    /// The node nearest to the pose in the 2D plane.
    ///
    /// Searches square rings of cells of increasing radius. Once a ring
    /// yields candidates one further ring is scanned before taking the
    /// minimum, since a diagonal neighbour cell may hold a closer node than
    /// the first one found.
    ///
    /// Returns `None` only when the index is empty; the planner always holds
    /// at least the root.
    pub fn nearest(&self, pose: &Pose, tree: &Tree) -> Option<NodeId> {
        if self.buckets.is_empty() {
            return None;
        }

        let (i, j) = self.cell_index(pose);

        let mut candidates: Vec<NodeId> = Vec::new();
        let mut first_hit_ring: Option<i64> = None;
        let mut ring = 0;

        loop {
            for cell in ring_cells(i, j, ring) {
                candidates.extend_from_slice(self.bucket(cell));
            }

            if first_hit_ring.is_none() && !candidates.is_empty() {
                first_hit_ring = Some(ring);
            }

            if let Some(hit) = first_hit_ring {
                if ring > hit {
                    break;
                }
            }

            ring += 1;
        }

        candidates
            .into_iter()
            .min_by_key(|id| OrderedFloat(tree.pose(*id).dist_2d(pose)))
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The cells forming the square ring of the given radius around `(i, j)`.
fn ring_cells(i: i64, j: i64, radius: i64) -> Vec<(i64, i64)> {
    if radius == 0 {
        return vec![(i, j)];
    }

    let mut cells = Vec::with_capacity(8 * radius as usize);

    // Sides
    for c in (-radius + 1)..radius {
        cells.push((i + radius, j + c));
        cells.push((i - radius, j + c));
        cells.push((i + c, j + radius));
        cells.push((i + c, j - radius));
    }

    // Corners
    cells.push((i + radius, j + radius));
    cells.push((i + radius, j - radius));
    cells.push((i - radius, j + radius));
    cells.push((i - radius, j - radius));

    cells
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// Build a tree and matching grid from a list of (x, y) positions, with
    /// the first position as the root.
    fn build(cell_size_m: f64, positions: &[(f64, f64)]) -> (Tree, GridHash) {
        let root = Pose::new([positions[0].0, 0.0, positions[0].1]);
        let mut tree = Tree::new(root);
        let mut grid = GridHash::new(cell_size_m, (0.0, 0.0));
        grid.insert(&root, tree.root());

        for &(x, y) in positions[1..].iter() {
            let pose = Pose::new([x, 0.0, y]);
            let id = tree.insert(pose, tree.root(), Some(0.0)).unwrap();
            grid.insert(&pose, id);
        }

        (tree, grid)
    }

    #[test]
    fn test_bucket_residency() {
        let (tree, grid) = build(1.5, &[(0.2, 0.2), (1.6, 0.1), (4.6, 4.7)]);

        for id in tree.node_ids() {
            let cell = grid.cell_index(&tree.pose(id));
            assert!(grid.bucket(cell).contains(&id));
        }

        assert_eq!(grid.cell_index(&Pose::new([1.6, 0.0, 0.1])), (1, 0));
        assert_eq!(grid.cell_index(&Pose::new([4.6, 0.0, 4.7])), (3, 3));
    }

    #[test]
    fn test_near_follows_boundary_bias() {
        let (tree, grid) = build(1.0, &[(0.5, 0.5), (1.5, 0.5)]);
        let root = tree.root();
        let other = tree.node_ids().nth(1).unwrap();

        // (0.2, 0.2) is closer to the low boundaries, so the block extends
        // left and down and misses cell (1, 0)
        let ids = grid.near(&Pose::new([0.2, 0.0, 0.2]));
        assert!(ids.contains(&root));
        assert!(!ids.contains(&other));

        // (0.9, 0.9) extends right and up instead
        let ids = grid.near(&Pose::new([0.9, 0.0, 0.9]));
        assert!(ids.contains(&root));
        assert!(ids.contains(&other));
    }

    #[test]
    fn test_nearest_single_node() {
        let (tree, grid) = build(1.5, &[(0.5, 0.5)]);

        // From anywhere, the only node is the nearest
        let nearest = grid.nearest(&Pose::new([40.0, 0.0, -20.0]), &tree);
        assert_eq!(nearest, Some(tree.root()));
    }

    #[test]
    fn test_nearest_scans_one_extra_ring() {
        // Query cell (1, 0). The ring-1 cell (0, 0) holds a node 1.8 m away,
        // while ring 2 holds one only 1.15 m away.
        let (tree, grid) = build(1.0, &[(0.1, 0.5), (3.05, 0.5)]);
        let far_in_ring = tree.node_ids().nth(1).unwrap();

        let nearest = grid.nearest(&Pose::new([1.9, 0.0, 0.5]), &tree);
        assert_eq!(nearest, Some(far_in_ring));
    }

    #[test]
    fn test_nearest_expands_past_empty_rings() {
        let (tree, grid) = build(1.0, &[(10.5, 10.5)]);

        let nearest = grid.nearest(&Pose::new([0.1, 0.0, 0.1]), &tree);
        assert_eq!(nearest, Some(tree.root()));
    }
}
