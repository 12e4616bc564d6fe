//! # Raster Map
//!
//! A PNG-backed occupancy map. Pixels with intensity of at least
//! [`FREE_INTENSITY_THRESHOLD`] are navigable; everything else is an
//! obstacle. Obstacles are inflated by a box filter sized from the vehicle
//! radius, so the planner can treat the vehicle as a point.
//!
//! Alongside the navigability raster an info map is kept, labelling each cell
//! as free, obstacle, tree node or goal. The info map feeds the local windows
//! used by the potential-field sampler.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use image::GrayImage;
use ndarray::Array2;
use rand::{Rng, RngCore};
use std::path::Path;

use super::{CellLabel, MapError, NavMap};
use crate::plan::pose::Pose;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Minimum pixel intensity of a navigable cell.
pub const FREE_INTENSITY_THRESHOLD: u8 = 240;

/// Value of a navigable cell in the navigability raster.
const NAVIGABLE: u8 = 255;

/// Maximum rejection-sampling draws before giving up on finding a navigable
/// sample. The caller revalidates the returned pose, so running out of draws
/// produces an invalid sample rather than an error.
const MAX_SAMPLE_DRAWS: usize = 10_000;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// PNG-backed occupancy map with inflated obstacles.
#[derive(Debug, Clone)]
pub struct RasterMap {
    /// Navigability raster, `NAVIGABLE` where the vehicle centre may be.
    /// Indexed `[row, column]`, i.e. `[y pixel, x pixel]`.
    nav: Array2<u8>,

    /// Info map of [`CellLabel`] bytes, aligned with `nav`.
    info: Array2<u8>,

    /// Scale of the raster. Units: meters/pixel
    meters_per_pixel: f64,

    /// Extent of the map along x. Units: meters
    map_width_m: f64,

    /// Extent of the map along y. Units: meters
    map_height_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RasterMap {
    /// Load a raster map from the PNG at the given path.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        meters_per_pixel: f64,
        agent_radius_m: f64,
    ) -> Result<Self, MapError> {
        let img = image::open(path)?.to_luma8();
        Self::from_luma(&img, meters_per_pixel, agent_radius_m)
    }

    /// Build a raster map from an in-memory grayscale image.
    pub fn from_luma(
        img: &GrayImage,
        meters_per_pixel: f64,
        agent_radius_m: f64,
    ) -> Result<Self, MapError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(MapError::EmptyImage);
        }

        let (height, width) = (height as usize, width as usize);

        // Threshold the image into an obstacle indicator
        let mut obstacle = Array2::from_elem((height, width), false);
        for (x, y, pixel) in img.enumerate_pixels() {
            if pixel.0[0] < FREE_INTENSITY_THRESHOLD {
                obstacle[[y as usize, x as usize]] = true;
            }
        }

        // Integral image of obstacle counts, so each cell's inflation window
        // can be evaluated in constant time
        let mut integral = Array2::from_elem((height + 1, width + 1), 0u32);
        for i in 0..height {
            for j in 0..width {
                integral[[i + 1, j + 1]] = obstacle[[i, j]] as u32 + integral[[i, j + 1]]
                    + integral[[i + 1, j]]
                    - integral[[i, j]];
            }
        }

        // A cell is navigable only if no obstacle pixel falls within the
        // centred box filter window
        let kernel = (agent_radius_m / meters_per_pixel).round() as usize;
        let mut nav = Array2::from_elem((height, width), 0u8);
        for i in 0..height {
            for j in 0..width {
                let lo_i = i.saturating_sub(kernel / 2);
                let lo_j = j.saturating_sub(kernel / 2);
                let hi_i = (i + kernel.saturating_sub(1) - kernel / 2).min(height - 1);
                let hi_j = (j + kernel.saturating_sub(1) - kernel / 2).min(width - 1);

                let count = integral[[hi_i + 1, hi_j + 1]] + integral[[lo_i, lo_j]]
                    - integral[[lo_i, hi_j + 1]]
                    - integral[[hi_i + 1, lo_j]];

                if count == 0 {
                    nav[[i, j]] = NAVIGABLE;
                }
            }
        }

        let info = nav.mapv(|v| {
            if v == NAVIGABLE {
                CellLabel::Free.as_u8()
            } else {
                CellLabel::Obstacle.as_u8()
            }
        });

        Ok(Self {
            nav,
            info,
            meters_per_pixel,
            map_width_m: width as f64 * meters_per_pixel,
            map_height_m: height as f64 * meters_per_pixel,
        })
    }

    /// Convert a planar position into `(row, column)` pixel indices.
    ///
    /// Returns `None` for non-finite or out-of-map positions.
    fn to_pixel(&self, pos_m: (f64, f64)) -> Option<(usize, usize)> {
        if !pos_m.0.is_finite() || !pos_m.1.is_finite() {
            return None;
        }
        if pos_m.0 < 0.0 || pos_m.1 < 0.0 {
            return None;
        }

        let col = (pos_m.0 / self.meters_per_pixel).floor() as usize;
        let row = (pos_m.1 / self.meters_per_pixel).floor() as usize;

        let (height, width) = self.nav.dim();
        if row >= height || col >= width {
            return None;
        }

        Some((row, col))
    }
}

impl NavMap for RasterMap {
    fn is_navigable(&self, pose: &Pose, _max_y_delta_m: f64) -> bool {
        match self.to_pixel((pose.x, pose.y)) {
            Some((row, col)) => self.nav[[row, col]] == NAVIGABLE,
            None => false,
        }
    }

    fn sample_random_navigable(&self, rng: &mut dyn RngCore) -> Pose {
        let mut pose = Pose::new([0.0, 0.0, 0.0]);

        for _ in 0..MAX_SAMPLE_DRAWS {
            let x_m = rng.gen::<f64>() * self.map_width_m;
            let y_m = rng.gen::<f64>() * self.map_height_m;

            pose = Pose::new([x_m, 0.0, y_m]);
            if self.is_navigable(&pose, super::DEFAULT_MAX_Y_DELTA_M) {
                return pose;
            }
        }

        pose
    }

    fn snap(&self, pos_xzy: [f64; 3]) -> [f64; 3] {
        // Raster maps are flat, no projection is needed
        pos_xzy
    }

    fn shortest_path_waypoints(&self, _start: &Pose, _goal: &Pose) -> Vec<Pose> {
        // No baseline path can be derived from a raster map
        Vec::new()
    }

    fn bounds(&self, _start: &Pose) -> (f64, f64) {
        (0.0, 0.0)
    }

    fn local_window(&self, centre_m: (f64, f64), size_cells: usize) -> Option<Array2<u8>> {
        if size_cells == 0 {
            return None;
        }

        // Out-of-map cells are labelled as obstacles
        let mut window =
            Array2::from_elem((size_cells, size_cells), CellLabel::Obstacle.as_u8());

        let half = (size_cells / 2) as i64;
        let centre_row = (centre_m.1 / self.meters_per_pixel).floor() as i64;
        let centre_col = (centre_m.0 / self.meters_per_pixel).floor() as i64;

        let (height, width) = self.info.dim();
        for i in 0..size_cells {
            for j in 0..size_cells {
                let map_i = centre_row - half + i as i64;
                let map_j = centre_col - half + j as i64;

                if map_i >= 0 && (map_i as usize) < height && map_j >= 0 && (map_j as usize) < width
                {
                    window[[i, j]] = self.info[[map_i as usize, map_j as usize]];
                }
            }
        }

        Some(window)
    }

    fn mark_node(&mut self, pos_m: (f64, f64)) {
        if let Some((row, col)) = self.to_pixel(pos_m) {
            self.info[[row, col]] = CellLabel::Node.as_u8();
        }
    }

    fn mark_goal(&mut self, pos_m: (f64, f64)) {
        if let Some((row, col)) = self.to_pixel(pos_m) {
            self.info[[row, col]] = CellLabel::Goal.as_u8();
        }
    }

    fn cell_size(&self) -> Option<f64> {
        Some(self.meters_per_pixel)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
