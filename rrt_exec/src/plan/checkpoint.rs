//! # Checkpointer
//!
//! Serializes the tree into durable JSON documents and recovers the latest
//! one on startup. Checkpoint files are named `{iteration}_{basename}.json`;
//! the integer prefix orders them chronologically and tells a resumed run
//! which iteration to continue from.
//!
//! The `graph` object maps each pose key to its parent's key, with the root
//! mapping to the empty string. Entry order is the order nodes were inserted
//! into the tree, and is preserved across a write/read cycle so a reloaded
//! planner reproduces the original run exactly.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::PlanError;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Subdirectory of the output directory holding the tree snapshots.
const JSON_DIR_NAME: &str = "tree_jsons";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A durable snapshot of the planner's tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeCheckpoint {
    /// Pose key of the planning start.
    pub start: String,

    /// Pose key of the goal.
    pub goal: String,

    /// Pose key of the best goal-reaching node, empty when none exists.
    pub best_goal_node: String,

    /// Cost through the best goal node, -1 when none exists.
    ///
    /// Units: seconds
    pub best_path_time: f64,

    /// Pose keys of the best path from start to goal, empty when no path
    /// has been found.
    pub best_path_raw: Vec<String>,

    /// Child pose key to parent pose key, root maps to the empty string.
    pub graph: Map<String, Value>,
}

/// Writes and recovers [`TreeCheckpoint`]s under an output directory.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    json_dir: PathBuf,
    basename: String,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Checkpointer {
    /// Create a checkpointer rooted at the given output directory.
    ///
    /// The snapshot subdirectory is created immediately; failure to do so is
    /// fatal for the planner construction.
    pub fn new(out_dir: &Path) -> Result<Self, PlanError> {
        let json_dir = out_dir.join(JSON_DIR_NAME);
        fs::create_dir_all(&json_dir).map_err(PlanError::CheckpointDirCreateFailed)?;

        let basename = out_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("tree"));

        Ok(Self { json_dir, basename })
    }

    /// Write a checkpoint for the given iteration, returning its path.
    pub fn save(&self, iteration: u64, checkpoint: &TreeCheckpoint) -> Result<PathBuf, PlanError> {
        let path = self
            .json_dir
            .join(format!("{}_{}.json", iteration, self.basename));

        let json = serde_json::to_string(checkpoint).map_err(PlanError::CheckpointSerializeFailed)?;
        fs::write(&path, json).map_err(PlanError::CheckpointWriteFailed)?;

        Ok(path)
    }

    /// Load a checkpoint from the given path.
    pub fn load(path: &Path) -> Result<TreeCheckpoint, PlanError> {
        let json = fs::read_to_string(path).map_err(PlanError::CheckpointReadFailed)?;
        serde_json::from_str(&json).map_err(PlanError::CheckpointParseFailed)
    }

    /// Recover the checkpoint with the highest iteration prefix.
    ///
    /// Returns `None` when no checkpoint exists. An unparseable latest
    /// checkpoint is logged and treated as absent, so planning restarts from
    /// scratch rather than aborting.
    pub fn load_latest(&self) -> Option<(u64, TreeCheckpoint)> {
        let entries = fs::read_dir(&self.json_dir).ok()?;

        let mut latest: Option<(u64, PathBuf)> = None;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let iteration = match path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.split('_').next())
                .and_then(|prefix| prefix.parse::<u64>().ok())
            {
                Some(i) => i,
                None => continue,
            };

            if latest.as_ref().map(|(i, _)| iteration > *i).unwrap_or(true) {
                latest = Some((iteration, path));
            }
        }

        let (iteration, path) = latest?;
        match Self::load(&path) {
            Ok(checkpoint) => Some((iteration, checkpoint)),
            Err(e) => {
                warn!(
                    "Couldn't recover checkpoint {:?}, starting from scratch: {}",
                    path, e
                );
                None
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

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rrt_ck_{}_{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        dir
    }

    fn checkpoint_with_cost(cost: f64) -> TreeCheckpoint {
        let mut graph = Map::new();
        graph.insert("0.00000_0.00000_0.00000_0.00000".into(), Value::String(String::new()));
        graph.insert(
            "1.00000_0.00000_0.00000_0.00000".into(),
            Value::String("0.00000_0.00000_0.00000_0.00000".into()),
        );

        TreeCheckpoint {
            start: "0.00000_0.00000_0.00000_0.00000".into(),
            goal: "5.00000_5.00000_0.00000_0.00000".into(),
            best_goal_node: String::new(),
            best_path_time: cost,
            best_path_raw: Vec::new(),
            graph,
        }
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let dir = test_dir("round_trip");
        let ck = Checkpointer::new(&dir).unwrap();

        let checkpoint = checkpoint_with_cost(-1.0);
        let path = ck.save(100, &checkpoint).unwrap();
        let restored = Checkpointer::load(&path).unwrap();

        assert_eq!(checkpoint, restored);

        // Entry order survives the round trip
        let keys: Vec<&String> = restored.graph.keys().collect();
        assert_eq!(keys[0], "0.00000_0.00000_0.00000_0.00000");
        assert_eq!(keys[1], "1.00000_0.00000_0.00000_0.00000");

        // Writing the restored checkpoint again produces identical bytes
        let rewritten = ck.save(101, &restored).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            fs::read_to_string(&rewritten).unwrap()
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_latest_is_numeric_not_lexical() {
        let dir = test_dir("latest");
        let ck = Checkpointer::new(&dir).unwrap();

        ck.save(999, &checkpoint_with_cost(1.0)).unwrap();
        ck.save(1000, &checkpoint_with_cost(2.0)).unwrap();

        let (iteration, checkpoint) = ck.load_latest().unwrap();
        assert_eq!(iteration, 1000);
        assert!((checkpoint.best_path_time - 2.0).abs() < 1e-12);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_latest_treated_as_absent() {
        let dir = test_dir("corrupt");
        let ck = Checkpointer::new(&dir).unwrap();

        ck.save(10, &checkpoint_with_cost(1.0)).unwrap();
        fs::write(dir.join(JSON_DIR_NAME).join("20_corrupt.json"), "{not json").unwrap();

        assert!(ck.load_latest().is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_no_checkpoints() {
        let dir = test_dir("none");
        let ck = Checkpointer::new(&dir).unwrap();

        assert!(ck.load_latest().is_none());

        fs::remove_dir_all(&dir).ok();
    }
}
