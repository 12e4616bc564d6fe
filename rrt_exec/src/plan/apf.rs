//! # Potential Field Sampler
//!
//! Refines a raw random sample by dropping it into the lowest-potential cell
//! of a local occupancy window. The potential combines:
//!
//! - Repulsion from obstacle cells, active within a cutoff distance.
//! - Repulsion from existing tree nodes, which keeps samples from clustering
//!   on the incumbent path.
//! - Attraction towards the goal, quadratic nearby and conic further out.
//!
//! Cells the vehicle cannot reach in a single step are masked out. The
//! sampler is deterministic: ties break to the first cell in row-major
//! order.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use ndarray::Array2;
use serde::Deserialize;

use crate::map::CellLabel;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Squared-distance value standing in for "no source cell anywhere".
const DT_INFINITY: f64 = 1e20;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Gains and cutoffs of the potential field.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApfParams {
    /// Gain of the obstacle repulsion term.
    pub eta: f64,

    /// Gain of the goal attraction term.
    pub xi: f64,

    /// Distance beyond which obstacles exert no repulsion. Units: meters
    pub rho0_m: f64,

    /// Distance to the goal at which attraction switches from quadratic to
    /// conic. Units: meters
    pub sigma0_m: f64,

    /// Gain of the tree-node repulsion term.
    pub eta_node: f64,

    /// Distance beyond which tree nodes exert no repulsion. Units: meters
    pub rho0_node_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ApfParams {
    fn default() -> Self {
        Self {
            eta: 0.5,
            xi: 1.0,
            rho0_m: 1.0,
            sigma0_m: 1.0,
            eta_node: 1.0,
            rho0_node_m: 0.5,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// World position of the lowest-potential cell in the given window.
///
/// `origin_m` is the world position of cell `(0, 0)`; cell `(i, j)` sits at
/// `origin + (j, i) * cell_size`. Cells further than `max_distance_m` from
/// `centre_m` are unreachable in one step and are masked out; if that masks
/// the whole window the centre is returned unchanged.
pub fn lowest_potential_position(
    window: &Array2<u8>,
    origin_m: (f64, f64),
    cell_size_m: f64,
    centre_m: (f64, f64),
    goal_m: (f64, f64),
    max_distance_m: f64,
    params: &ApfParams,
) -> (f64, f64) {
    let obstacle_mask = window.mapv(|label| label == CellLabel::Obstacle.as_u8());
    let node_mask = window.mapv(|label| label == CellLabel::Node.as_u8());

    let rho_obs_m = distance_transform_cells(&obstacle_mask).mapv(|d| d * cell_size_m);
    let rho_node_m = distance_transform_cells(&node_mask).mapv(|d| d * cell_size_m);

    let mut best: Option<((usize, usize), f64)> = None;

    for ((i, j), _) in window.indexed_iter() {
        let pos = Vector2::new(
            origin_m.0 + j as f64 * cell_size_m,
            origin_m.1 + i as f64 * cell_size_m,
        );

        // Mask cells unreachable in a single step
        let dist_to_centre_m = (pos - Vector2::new(centre_m.0, centre_m.1)).norm();
        if dist_to_centre_m > max_distance_m {
            continue;
        }

        let mut potential = 0.0;

        // Obstacle repulsion. At an obstacle cell itself the distance is
        // zero, the potential diverges, and the cell can never win.
        let rho_m = rho_obs_m[[i, j]];
        if rho_m <= params.rho0_m {
            potential += 0.5 * params.eta * (1.0 / rho_m - 1.0 / params.rho0_m).powi(2);
        }

        // Node repulsion
        let rho_m = rho_node_m[[i, j]];
        if rho_m <= params.rho0_node_m {
            potential += 0.5 * params.eta_node * (1.0 / rho_m - 1.0 / params.rho0_node_m).powi(2);
        }

        // Goal attraction, conic beyond sigma0 so distant windows aren't
        // dominated by a quadratic term
        let sigma_m = (pos - Vector2::new(goal_m.0, goal_m.1)).norm();
        potential += if sigma_m <= params.sigma0_m {
            0.5 * params.xi * sigma_m.powi(2)
        } else {
            params.xi * params.sigma0_m * (sigma_m - 0.5 * params.sigma0_m)
        };

        if !potential.is_finite() {
            continue;
        }

        // Strict comparison keeps the first minimum in row-major order
        if best.map(|(_, u)| potential < u).unwrap_or(true) {
            best = Some(((i, j), potential));
        }
    }

    match best {
        Some(((i, j), _)) => (
            origin_m.0 + j as f64 * cell_size_m,
            origin_m.1 + i as f64 * cell_size_m,
        ),
        None => centre_m,
    }
}

/// Exact euclidean distance transform: for each cell, the distance in cells
/// to the nearest `true` cell of the mask.
///
/// Two-pass lower-envelope algorithm over squared distances, one pass along
/// each axis.
pub fn distance_transform_cells(mask: &Array2<bool>) -> Array2<f64> {
    let (rows, cols) = mask.dim();

    let mut sq = Array2::from_elem((rows, cols), 0.0f64);
    for ((i, j), &occupied) in mask.indexed_iter() {
        sq[[i, j]] = if occupied { 0.0 } else { DT_INFINITY };
    }

    // Columns first, then rows
    let mut scratch_f = vec![0.0f64; rows.max(cols)];
    let mut scratch_d = vec![0.0f64; rows.max(cols)];

    for j in 0..cols {
        for i in 0..rows {
            scratch_f[i] = sq[[i, j]];
        }
        dt_1d(&scratch_f[..rows], &mut scratch_d[..rows]);
        for i in 0..rows {
            sq[[i, j]] = scratch_d[i];
        }
    }

    for i in 0..rows {
        for j in 0..cols {
            scratch_f[j] = sq[[i, j]];
        }
        dt_1d(&scratch_f[..cols], &mut scratch_d[..cols]);
        for j in 0..cols {
            sq[[i, j]] = scratch_d[j];
        }
    }

    sq.mapv(f64::sqrt)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// 1D squared-distance transform of a sampled function, by lower envelope of
/// parabolas.
fn dt_1d(f: &[f64], d: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }

    // v[k] is the site of the k-th parabola in the envelope, z[k] the start
    // of the range where it is lowest
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];

    let mut k = 0;
    z[0] = -DT_INFINITY;
    z[1] = DT_INFINITY;

    let intersect = |f: &[f64], p: usize, q: usize| -> f64 {
        ((f[q] + (q * q) as f64) - (f[p] + (p * p) as f64)) / (2.0 * (q as f64 - p as f64))
    };

    for q in 1..n {
        let mut s = intersect(f, v[k], q);
        while s <= z[k] {
            k -= 1;
            s = intersect(f, v[k], q);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = DT_INFINITY;
    }

    k = 0;
    for q in 0..n {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let dq = q as f64 - v[k] as f64;
        d[q] = dq * dq + f[v[k]];
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
