//! # Planner Executable
//!
//! Runs the planner over a PNG occupancy map. The single argument is the
//! path to a TOML configuration file naming the map image, the start and
//! goal, the iteration budget, and the planner parameters. Checkpoints land
//! in the configured output directory, and a run pointed at a directory
//! holding earlier checkpoints resumes from the latest one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{env, path::PathBuf};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{debug, info};
use serde::Deserialize;

use rrt_lib::{
    map::RasterMap,
    plan::{RrtParams, RrtPlanner},
};
use util::{
    logger::{logger_init, LevelFilter},
    params,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Top-level configuration of a planning run.
#[derive(Debug, Deserialize)]
struct PlanConfig {
    /// Path to the PNG occupancy image to plan over.
    map_image: PathBuf,

    /// Start position in world convention `[x, z, y]`. Units: meters
    start_pos_m: [f64; 3],

    /// Start heading. Units: radians
    start_heading_rad: f64,

    /// Goal position in world convention `[x, z, y]`. Units: meters
    goal_pos_m: [f64; 3],

    /// Total iteration budget.
    iterations: u64,

    /// Seed for the planner's random source.
    seed: u64,

    /// Planner parameters.
    rrt: RrtParams,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // Initialise session and logging
    let session = Session::new("rrt_exec", "sessions").wrap_err("Failed to create the session")?;
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("RRT* Planner\n");
    info!("Session directory: {:?}\n", session.session_root);

    // Load the run configuration from the single CLI argument
    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let config: PlanConfig = if args.len() == 2 {
        params::load(&args[1]).wrap_err("Failed to load the plan configuration")?
    } else {
        return Err(eyre!("Expected path to the plan configuration as only argument"));
    };

    info!("Planning on {:?}", config.map_image);
    info!("    start: {:?} heading {} rad", config.start_pos_m, config.start_heading_rad);
    info!("    goal:  {:?}", config.goal_pos_m);
    info!("    {} iterations, seed {}\n", config.iterations, config.seed);

    // Build the map adapter and the planner
    let map = RasterMap::from_file(
        &config.map_image,
        config.rrt.meters_per_pixel,
        config.rrt.agent_radius_m,
    )
    .wrap_err("Failed to load the map image")?;

    let mut planner = RrtPlanner::new(
        config.rrt,
        map,
        config.start_pos_m,
        config.start_heading_rad,
        config.goal_pos_m,
        config.seed,
    )
    .wrap_err("Failed to initialise the planner")?;

    // Run the full budget
    let best_path = planner.run(config.iterations).wrap_err("Planning failed")?;

    if best_path.is_empty() {
        info!("No path to the goal was found");
    } else {
        let checkpoint = planner.checkpoint();
        info!(
            "Best path: {} poses, {} s traversal time",
            best_path.len(),
            checkpoint.best_path_time
        );
        for pose in best_path.iter() {
            debug!("    {}", pose.key());
        }
    }

    Ok(())
}
