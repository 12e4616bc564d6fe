//! # Tree
//!
//! Arena-backed parent tree over poses. Each pose is stored exactly once and
//! is referred to by its [`NodeId`]; the pose key only reappears at the
//! serialization boundary. The arena keeps nodes in insertion order, which is
//! also the order they were added to the spatial index, so a reloaded tree
//! behaves identically to the one that was saved.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use super::motion::MotionModel;
use super::pose::Pose;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct TreeNode {
    pose: Pose,

    /// `None` only for the root.
    parent: Option<NodeId>,

    /// Traversal time from the parent, `None` when not yet known (nodes
    /// restored from a checkpoint). Units: seconds
    cost_from_parent_s: Option<f64>,
}

/// A tree of poses rooted at the planning start.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    ids: HashMap<Pose, NodeId>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Tree {
    /// Create a new tree containing only the given root pose.
    pub fn new(root: Pose) -> Self {
        let mut ids = HashMap::new();
        ids.insert(root, NodeId(0));

        Self {
            nodes: vec![TreeNode {
                pose: root,
                parent: None,
                cost_from_parent_s: Some(0.0),
            }],
            ids,
        }
    }

    /// Rebuild a tree from `(child, parent)` pose pairs, in the order the
    /// children were originally inserted.
    ///
    /// Returns `None` if the pairs contain duplicate children, unknown
    /// parents, or parent links which do not lead back to the root.
    pub fn from_parent_map(root: Pose, edges: &[(Pose, Pose)]) -> Option<Self> {
        let mut tree = Self::new(root);

        // Allocate all nodes first, preserving the given order. Parents are
        // resolved in a second pass since a rewired child may be listed
        // before the node it now hangs from.
        for (child, _) in edges.iter() {
            if tree.ids.contains_key(child) {
                return None;
            }

            let id = NodeId(tree.nodes.len());
            tree.nodes.push(TreeNode {
                pose: *child,
                parent: None,
                cost_from_parent_s: None,
            });
            tree.ids.insert(*child, id);
        }

        for (child, parent) in edges.iter() {
            let child_id = *tree.ids.get(child)?;
            let parent_id = *tree.ids.get(parent)?;
            tree.nodes[child_id.0].parent = Some(parent_id);
        }

        // Every node must reach the root in finitely many steps
        for id in 0..tree.nodes.len() {
            let mut current = NodeId(id);
            let mut steps = 0;
            while let Some(parent) = tree.nodes[current.0].parent {
                current = parent;
                steps += 1;
                if steps > tree.nodes.len() {
                    return None;
                }
            }
            if current != NodeId(0) {
                return None;
            }
        }

        Some(tree)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn pose(&self, id: NodeId) -> Pose {
        self.nodes[id.0].pose
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// The stored edge cost from the node's parent, if known.
    pub fn cost_from_parent(&self, id: NodeId) -> Option<f64> {
        self.nodes[id.0].cost_from_parent_s
    }

    /// Look up the node holding the given pose.
    pub fn get(&self, pose: &Pose) -> Option<NodeId> {
        self.ids.get(pose).copied()
    }

    pub fn contains(&self, pose: &Pose) -> bool {
        self.ids.contains_key(pose)
    }

    /// Insert a new node under the given parent.
    ///
    /// Returns `None` if a node with the same pose already exists.
    pub fn insert(
        &mut self,
        pose: Pose,
        parent: NodeId,
        cost_from_parent_s: Option<f64>,
    ) -> Option<NodeId> {
        if self.ids.contains_key(&pose) {
            return None;
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            pose,
            parent: Some(parent),
            cost_from_parent_s,
        });
        self.ids.insert(pose, id);

        Some(id)
    }

    /// Reassign a node's parent, replacing the stored edge cost.
    pub fn set_parent(&mut self, id: NodeId, new_parent: NodeId, cost_from_parent_s: f64) {
        self.nodes[id.0].parent = Some(new_parent);
        self.nodes[id.0].cost_from_parent_s = Some(cost_from_parent_s);
    }

    /// Node ids along the path from the root to the given node, inclusive.
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// Total traversal time from the root to the given node.
    ///
    /// Edge costs missing after a checkpoint reload are recomputed with the
    /// given motion model and memoized. Units: seconds
    pub fn cost_from_start(&mut self, id: NodeId, motion: &MotionModel) -> f64 {
        let path = self.path_from_root(id);

        let mut cost_s = 0.0;
        for pair in path.windows(2) {
            let (parent, child) = (pair[0], pair[1]);

            let edge_s = match self.nodes[child.0].cost_from_parent_s {
                Some(c) => c,
                None => {
                    let (c, _) = motion.cost_from_to(
                        &self.nodes[parent.0].pose,
                        &self.nodes[child.0].pose,
                        true,
                    );
                    self.nodes[child.0].cost_from_parent_s = Some(c);
                    c
                }
            };

            cost_s += edge_s;
        }

        cost_s
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
