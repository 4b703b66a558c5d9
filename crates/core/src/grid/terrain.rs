//! Terrain elevation grid with derived slope and curvature
//!
//! Slope follows the simple finite-difference definition used for rainfall
//! downscaling: the elevation gradient is taken with central differences in
//! the interior and one-sided differences on the edges, and
//! `slope = atan(|∇z|)` in degrees. Curvature is the 5-point Laplacian of
//! elevation with replicated edges (positive in hollows, negative on ridges).
//!
//! Both derived grids are computed once when the terrain is built and are
//! treated as immutable for the rest of the session.

use super::field::FieldData;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Elevation grid plus derived slope and curvature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainGrid {
    /// Elevation in meters
    elevation: FieldData,
    /// Slope in degrees, 0-90
    slope: FieldData,
    /// Laplacian of elevation (1/m)
    curvature: FieldData,
    /// Cell size in meters
    cell_size: f32,
}

impl TerrainGrid {
    /// Build terrain from an elevation grid.
    ///
    /// # Arguments
    ///
    /// * `elevation` - Elevation in meters, row-major
    /// * `cell_size` - Cell size in meters (must be positive and finite)
    pub fn from_elevation(elevation: FieldData, cell_size: f32) -> Result<Self> {
        if elevation.is_empty() {
            return Err(Error::EmptyGrid("elevation"));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::invalid_parameter(
                "cell_size",
                cell_size,
                "must be positive and finite",
            ));
        }
        if elevation.data.iter().any(|v| !v.is_finite()) {
            return Err(Error::invalid_parameter(
                "elevation",
                "non-finite",
                "elevation values must be finite",
            ));
        }

        let slope = compute_slope(&elevation, cell_size);
        let curvature = compute_curvature(&elevation, cell_size);

        Ok(Self {
            elevation,
            slope,
            curvature,
            cell_size,
        })
    }

    /// Flat terrain at a uniform elevation.
    pub fn flat(width: usize, height: usize, cell_size: f32, elevation: f32) -> Result<Self> {
        Self::from_elevation(FieldData::with_value(width, height, elevation), cell_size)
    }

    /// Planar hillside rising along +x at a constant slope angle.
    pub fn inclined_plane(
        width: usize,
        height: usize,
        cell_size: f32,
        slope_deg: f32,
    ) -> Result<Self> {
        let rise_per_cell = slope_deg.to_radians().tan() * cell_size;
        let elevation = FieldData::from_fn(width, height, |x, _| x as f32 * rise_per_cell);
        Self::from_elevation(elevation, cell_size)
    }

    /// Terrain with a single Gaussian hill in the middle of the grid.
    pub fn single_hill(
        width: usize,
        height: usize,
        cell_size: f32,
        base_elevation: f32,
        hill_height: f32,
        hill_radius: f32,
    ) -> Result<Self> {
        let center_x = width as f32 * cell_size / 2.0;
        let center_y = height as f32 * cell_size / 2.0;
        let elevation = FieldData::from_fn(width, height, |ix, iy| {
            let dx = ix as f32 * cell_size - center_x;
            let dy = iy as f32 * cell_size - center_y;
            let dist_sq = dx * dx + dy * dy;
            base_elevation + hill_height * (-dist_sq / (hill_radius * hill_radius)).exp()
        });
        Self::from_elevation(elevation, cell_size)
    }

    /// Elevation grid (meters)
    #[must_use]
    pub fn elevation(&self) -> &FieldData {
        &self.elevation
    }

    /// Slope grid (degrees)
    #[must_use]
    pub fn slope(&self) -> &FieldData {
        &self.slope
    }

    /// Curvature grid (1/m)
    #[must_use]
    pub fn curvature(&self) -> &FieldData {
        &self.curvature
    }

    /// Cell size in meters
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Grid dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        self.elevation.dimensions()
    }

    /// Number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.elevation.len()
    }

    /// Always false for a constructed terrain
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elevation.is_empty()
    }

    /// Static susceptibility mask: `true` where slope is at least `min_slope_deg`.
    #[must_use]
    pub fn susceptibility_mask(&self, min_slope_deg: f32) -> Vec<bool> {
        self.slope.data.iter().map(|&s| s >= min_slope_deg).collect()
    }
}

/// Partial derivatives of a row-major grid along x and y.
///
/// Interior cells use central differences, edge cells one-sided differences.
/// A dimension with a single cell has a zero derivative along it.
fn gradient(field: &FieldData, spacing: f32) -> (Vec<f32>, Vec<f32>) {
    let (w, h) = field.dimensions();
    let z = field.as_slice();
    let mut dzdx = vec![0.0; w * h];
    let mut dzdy = vec![0.0; w * h];

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if w > 1 {
                dzdx[idx] = if x == 0 {
                    (z[idx + 1] - z[idx]) / spacing
                } else if x == w - 1 {
                    (z[idx] - z[idx - 1]) / spacing
                } else {
                    (z[idx + 1] - z[idx - 1]) / (2.0 * spacing)
                };
            }
            if h > 1 {
                dzdy[idx] = if y == 0 {
                    (z[idx + w] - z[idx]) / spacing
                } else if y == h - 1 {
                    (z[idx] - z[idx - w]) / spacing
                } else {
                    (z[idx + w] - z[idx - w]) / (2.0 * spacing)
                };
            }
        }
    }

    (dzdx, dzdy)
}

/// Slope in degrees from an elevation grid.
///
/// # Arguments
///
/// * `dem` - Elevation in meters
/// * `cell_size` - Cell size in meters
#[must_use]
pub fn compute_slope(dem: &FieldData, cell_size: f32) -> FieldData {
    let (dzdx, dzdy) = gradient(dem, cell_size);
    let data = dzdx
        .iter()
        .zip(&dzdy)
        .map(|(gx, gy)| (gx * gx + gy * gy).sqrt().atan().to_degrees())
        .collect();
    FieldData {
        data,
        width: dem.width,
        height: dem.height,
    }
}

/// 5-point Laplacian of elevation with replicated edges.
#[must_use]
pub fn compute_curvature(dem: &FieldData, cell_size: f32) -> FieldData {
    let (w, h) = dem.dimensions();
    let inv_h2 = 1.0 / (cell_size * cell_size);
    FieldData::from_fn(w, h, |x, y| {
        let center = dem.get(x, y);
        let left = dem.get(x.saturating_sub(1), y);
        let right = dem.get((x + 1).min(w - 1), y);
        let up = dem.get(x, y.saturating_sub(1));
        let down = dem.get(x, (y + 1).min(h - 1));
        (left + right + up + down - 4.0 * center) * inv_h2
    })
}
