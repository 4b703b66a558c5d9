//! Per-cell coordinates for point-to-grid interpolation

use super::field::FieldData;
use crate::core_types::Vec2;
use crate::error::{Error, Result};

/// Coordinates of every cell centre, in the same units as sensor locations.
///
/// For a metric lattice `x` is easting and `y` northing in meters. For
/// geographic grids `x` is longitude and `y` latitude in degrees.
#[derive(Debug, Clone)]
pub struct GridCoords {
    x: Vec<f32>,
    y: Vec<f32>,
    width: usize,
    height: usize,
}

impl GridCoords {
    /// Regular metric lattice with `x = col * cell_size`, `y = row * cell_size`.
    #[must_use]
    pub fn regular(width: usize, height: usize, cell_size: f32) -> Self {
        Self::with_origin(width, height, Vec2::zeros(), cell_size)
    }

    /// Regular lattice offset by `origin`.
    #[must_use]
    pub fn with_origin(width: usize, height: usize, origin: Vec2, spacing: f32) -> Self {
        let mut x = Vec::with_capacity(width * height);
        let mut y = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                x.push(origin.x + col as f32 * spacing);
                y.push(origin.y + row as f32 * spacing);
            }
        }
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Geographic grid from latitude and longitude fields of equal shape.
    pub fn from_lat_lon(lat: &FieldData, lon: &FieldData) -> Result<Self> {
        lon.ensure_shape("lon", lat.width, lat.height)?;
        if lat.data.iter().chain(&lon.data).any(|v| !v.is_finite()) {
            return Err(Error::invalid_parameter(
                "lat/lon",
                "non-finite",
                "coordinates must be finite",
            ));
        }
        Ok(Self {
            x: lon.data.clone(),
            y: lat.data.clone(),
            width: lat.width,
            height: lat.height,
        })
    }

    /// Location of the cell at flat index `idx`.
    #[must_use]
    pub fn position(&self, idx: usize) -> Vec2 {
        Vec2::new(self.x[idx], self.y[idx])
    }

    /// Location of the cell at `(col, row)`.
    #[must_use]
    pub fn at(&self, col: usize, row: usize) -> Vec2 {
        self.position(row * self.width + col)
    }

    /// Flat index of the cell whose centre is closest to `point`.
    ///
    /// Returns `None` for an empty grid.
    #[must_use]
    pub fn nearest_cell(&self, point: Vec2) -> Option<usize> {
        (0..self.x.len())
            .map(|i| {
                let dx = self.x[i] - point.x;
                let dy = self.y[i] - point.y;
                (i, dx * dx + dy * dy)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Grid dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Check if the grid has no cells
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_lattice() {
        let coords = GridCoords::regular(4, 3, 100.0);
        assert_eq!(coords.len(), 12);
        assert_eq!(coords.at(0, 0), Vec2::new(0.0, 0.0));
        assert_eq!(coords.at(3, 2), Vec2::new(300.0, 200.0));
    }

    #[test]
    fn test_nearest_cell() {
        let coords = GridCoords::regular(5, 5, 10.0);
        assert_eq!(coords.nearest_cell(Vec2::new(21.0, 39.0)), Some(3 * 5 + 2));
    }

    #[test]
    fn test_lat_lon_shape_mismatch() {
        let lat = FieldData::new(3, 3);
        let lon = FieldData::new(3, 2);
        assert!(GridCoords::from_lat_lon(&lat, &lon).is_err());
    }
}
