//! Row-major 2D field storage
//!
//! Every per-cell quantity in the pipeline (elevation, slope, rainfall,
//! saturation, factor of safety, risk) is stored as a `FieldData`: a flat
//! `Vec<f32>` in row-major order plus its dimensions. Reductions accumulate
//! in `f64` so that sums over a few hundred thousand cells stay accurate.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Field data container
///
/// Stores 2D field data as a flat `Vec<f32>` in row-major order.
/// Each field represents a continuous property across the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    /// Field values in row-major order (y * width + x)
    pub data: Vec<f32>,
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
}

impl FieldData {
    /// Create a new field with given dimensions, initialized to zero
    ///
    /// # Arguments
    ///
    /// * `width` - Grid width in cells
    /// * `height` - Grid height in cells
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0.0; width * height],
            width,
            height,
        }
    }

    /// Create a new field with given dimensions, initialized to a value
    ///
    /// # Arguments
    ///
    /// * `width` - Grid width in cells
    /// * `height` - Grid height in cells
    /// * `value` - Initial value for all cells
    #[must_use]
    pub fn with_value(width: usize, height: usize, value: f32) -> Self {
        Self {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Wrap an existing row-major buffer.
    ///
    /// Fails if the buffer length does not match `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::invalid_parameter(
                "data",
                data.len(),
                format!("expected {} values for a {width}x{height} grid", width * height),
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a field by evaluating `f(x, y)` at every cell.
    #[must_use]
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Get reference to field data
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Get mutable reference to field data
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Number of cells
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the field has no cells
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grid dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Get value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x]
    }

    /// Set value at grid position
    ///
    /// # Panics
    ///
    /// Panics if coordinates are out of bounds
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        assert!(
            x < self.width && y < self.height,
            "Coordinates out of bounds"
        );
        self.data[y * self.width + x] = value;
    }

    /// Fill entire field with a value
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Fail with `ShapeMismatch` unless this field is `width` x `height`.
    pub fn ensure_shape(&self, field: &'static str, width: usize, height: usize) -> Result<()> {
        if self.width == width && self.height == height && self.data.len() == width * height {
            Ok(())
        } else {
            Err(Error::ShapeMismatch {
                field,
                expected_width: width,
                expected_height: height,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Fail with `InvalidParameter` on the first value that is non-finite
    /// or outside `[min, max]`.
    pub fn ensure_range(&self, field: &'static str, min: f32, max: f32) -> Result<()> {
        match self
            .data
            .iter()
            .copied()
            .find(|v| !v.is_finite() || *v < min || *v > max)
        {
            Some(v) => Err(Error::invalid_parameter(
                field,
                v,
                format!("must be within [{min}, {max}]"),
            )),
            None => Ok(()),
        }
    }

    /// Sum of all cells
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| f64::from(v)).sum()
    }

    /// Arithmetic mean, 0 for an empty field
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.sum() / self.data.len() as f64
    }

    /// Population standard deviation, 0 for an empty field
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .data
            .iter()
            .map(|&v| {
                let d = f64::from(v) - mean;
                d * d
            })
            .sum::<f64>()
            / self.data.len() as f64;
        var.sqrt()
    }

    /// Largest value, `None` for an empty field
    #[must_use]
    pub fn max(&self) -> Option<f32> {
        self.data.iter().copied().reduce(f32::max)
    }

    /// Smallest value, `None` for an empty field
    #[must_use]
    pub fn min(&self) -> Option<f32> {
        self.data.iter().copied().reduce(f32::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_creation() {
        let field = FieldData::new(10, 20);
        assert_eq!(field.width, 10);
        assert_eq!(field.height, 20);
        assert_eq!(field.data.len(), 200);
        assert!(field.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_field_get_set() {
        let mut field = FieldData::new(10, 10);
        field.set(3, 4, 123.45);
        assert_eq!(field.get(3, 4), 123.45);

        // Verify row-major indexing
        let index = 4 * 10 + 3;
        assert_eq!(field.data[index], 123.45);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        assert!(FieldData::from_vec(3, 3, vec![0.0; 8]).is_err());
        assert!(FieldData::from_vec(3, 3, vec![0.0; 9]).is_ok());
    }

    #[test]
    fn test_from_fn_is_row_major() {
        let field = FieldData::from_fn(3, 2, |x, y| (y * 10 + x) as f32);
        assert_eq!(field.data, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_ensure_range() {
        let mut field = FieldData::with_value(3, 3, 4.0);
        assert!(field.ensure_range("rain", 0.0, f32::MAX).is_ok());
        field.set(1, 2, -0.5);
        assert!(field.ensure_range("rain", 0.0, f32::MAX).is_err());
        field.set(1, 2, f32::NAN);
        assert!(field.ensure_range("rain", 0.0, f32::MAX).is_err());
        field.set(1, 2, f32::INFINITY);
        assert!(field.ensure_range("rain", 0.0, f32::MAX).is_err());
    }

    #[test]
    fn test_statistics() {
        let field = FieldData::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(field.sum(), 10.0);
        assert_eq!(field.mean(), 2.5);
        assert!((field.std_dev() - 1.118_034).abs() < 1e-6);
        assert_eq!(field.max(), Some(4.0));
        assert_eq!(field.min(), Some(1.0));
        assert_eq!(FieldData::new(0, 0).max(), None);
    }

    #[test]
    fn test_ensure_shape() {
        let field = FieldData::new(4, 3);
        assert!(field.ensure_shape("f", 4, 3).is_ok());
        assert!(matches!(
            field.ensure_shape("f", 3, 4),
            Err(Error::ShapeMismatch { field: "f", .. })
        ));
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_field_bounds_check() {
        let field = FieldData::new(10, 10);
        let _ = field.get(10, 5);
    }
}
