//! Broadcastable per-cell parameters
//!
//! Physical parameters are often known only as a single regional value
//! (e.g. one cohesion for the whole district) but may also come as a full
//! per-cell grid. `CellParam` makes that choice explicit; callers resolve it
//! once into a buffer of the grid's shape before running per-cell passes.

use super::field::FieldData;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Either one value for every cell or a value per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellParam {
    /// Same value broadcast to all cells
    Uniform(f32),
    /// One value per cell, row-major
    PerCell(FieldData),
}

impl CellParam {
    /// Expand into a buffer of `width * height` values.
    ///
    /// Fails with `ShapeMismatch` if a per-cell field has other dimensions.
    pub fn resolve(&self, name: &'static str, width: usize, height: usize) -> Result<Vec<f32>> {
        match self {
            Self::Uniform(v) => Ok(vec![*v; width * height]),
            Self::PerCell(field) => {
                field.ensure_shape(name, width, height)?;
                Ok(field.data.clone())
            }
        }
    }

    /// Check that every value is finite and within `[min, max]`.
    pub fn ensure_range(&self, name: &'static str, min: f32, max: f32) -> Result<()> {
        match self {
            Self::Uniform(v) if !v.is_finite() || *v < min || *v > max => Err(
                Error::invalid_parameter(name, *v, format!("must be within [{min}, {max}]")),
            ),
            Self::Uniform(_) => Ok(()),
            Self::PerCell(field) => field.ensure_range(name, min, max),
        }
    }
}

impl From<f32> for CellParam {
    fn from(v: f32) -> Self {
        Self::Uniform(v)
    }
}

impl From<FieldData> for CellParam {
    fn from(field: FieldData) -> Self {
        Self::PerCell(field)
    }
}
