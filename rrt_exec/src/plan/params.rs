//! Parameters structure for the planner

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::path::PathBuf;

use super::apf::ApfParams;
use super::motion::RrtType;
use super::PlanError;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters for the planner.
#[derive(Debug, Clone, Deserialize)]
pub struct RrtParams {
    // ---- VEHICLE ----
    /// Maximum linear velocity of the vehicle.
    ///
    /// Units: meters/second
    pub max_linear_velocity_ms: f64,

    /// Maximum angular velocity of the vehicle.
    ///
    /// Units: degrees/second. Stored in degrees at the configuration
    /// boundary, converted to radians for all internal use.
    pub max_angular_velocity_degs: f64,

    /// Radius by which obstacles are inflated on raster maps.
    ///
    /// Units: meters
    pub agent_radius_m: f64,

    // ---- TREE GROWTH ----
    /// Neighbourhood radius for parent selection and rewiring. Also the cell
    /// size of the spatial index. Must be at least `max_distance_m`.
    ///
    /// Units: meters
    pub near_threshold_m: f64,

    /// Maximum length of a single tree edge.
    ///
    /// Units: meters
    pub max_distance_m: f64,

    /// Motion variant used for edge costs and feasibility.
    pub rrt_type: RrtType,

    // ---- MAPS & OUTPUT ----
    /// Scale of raster maps.
    ///
    /// Units: meters/pixel
    pub meters_per_pixel: f64,

    /// Directory checkpoints are written to. No checkpoints are written or
    /// reloaded when unset.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,

    /// Number of iterations between checkpoint writes.
    #[serde(default = "default_checkpoint_iterations")]
    pub checkpoint_iterations: u64,

    /// Potential-field sampling parameters.
    #[serde(default)]
    pub apf: ApfParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RrtParams {
    /// Check the parameter set is internally consistent.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.near_threshold_m < self.max_distance_m {
            return Err(PlanError::InvalidNeighbourhood {
                near_threshold_m: self.near_threshold_m,
                max_distance_m: self.max_distance_m,
            });
        }

        if self.checkpoint_iterations == 0 {
            return Err(PlanError::InvalidCheckpointInterval);
        }

        Ok(())
    }

    /// The angular velocity limit in radians/second.
    pub fn max_angular_velocity_rads(&self) -> f64 {
        self.max_angular_velocity_degs.to_radians()
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_checkpoint_iterations() -> u64 {
    500
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> RrtParams {
        RrtParams {
            max_linear_velocity_ms: 1.0,
            max_angular_velocity_degs: 90.0,
            agent_radius_m: 0.1,
            near_threshold_m: 1.5,
            max_distance_m: 1.0,
            rrt_type: RrtType::Shortest,
            meters_per_pixel: 0.1,
            out_dir: None,
            checkpoint_iterations: 500,
            apf: ApfParams::default(),
        }
    }

    #[test]
    fn test_validate() {
        assert!(params().validate().is_ok());

        // Equality of the two radii is admitted
        let mut equal = params();
        equal.max_distance_m = equal.near_threshold_m;
        assert!(equal.validate().is_ok());

        let mut bad = params();
        bad.near_threshold_m = 1.0;
        bad.max_distance_m = 1.5;
        assert!(matches!(
            bad.validate(),
            Err(PlanError::InvalidNeighbourhood { .. })
        ));
    }

    #[test]
    fn test_angular_velocity_conversion() {
        let p = params();
        assert!((p.max_angular_velocity_rads() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_from_toml() {
        let toml_str = r#"
            max_linear_velocity_ms = 0.5
            max_angular_velocity_degs = 30.0
            agent_radius_m = 0.2
            near_threshold_m = 2.0
            max_distance_m = 1.5
            rrt_type = "unicycle"
            meters_per_pixel = 0.05
        "#;

        let p: RrtParams = toml::from_str(toml_str).unwrap();
        assert_eq!(p.rrt_type, RrtType::Unicycle);
        assert_eq!(p.checkpoint_iterations, 500);
        assert!(p.out_dir.is_none());
        assert!((p.apf.eta - 0.5).abs() < 1e-12);
    }
}
