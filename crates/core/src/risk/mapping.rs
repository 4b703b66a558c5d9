//! Factor of safety to failure probability
//!
//! `risk = 1 / (1 + exp(steepness · (FoS − center)))`
//!
//! At `FoS == center` the risk is 0.5; larger steepness makes the transition
//! sharper.

use crate::core_types::Vec2;
use crate::error::{Error, Result};
use crate::grid::{FieldData, GridCoords};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Logistic FoS-to-risk curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCurve {
    pub steepness: f32,
    pub center: f32,
}

impl Default for RiskCurve {
    fn default() -> Self {
        Self {
            steepness: 10.0,
            center: 1.0,
        }
    }
}

impl RiskCurve {
    pub fn validate(&self) -> Result<()> {
        if !(self.steepness.is_finite() && self.steepness > 0.0) {
            return Err(Error::invalid_parameter(
                "risk.steepness",
                self.steepness,
                "must be positive",
            ));
        }
        if !self.center.is_finite() {
            return Err(Error::invalid_parameter(
                "risk.center",
                self.center,
                "must be finite",
            ));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn risk(&self, fos: f32) -> f32 {
        1.0 / (1.0 + (self.steepness * (fos - self.center)).exp())
    }

    /// Map a whole FoS grid.
    #[must_use]
    pub fn apply(&self, fos: &FieldData) -> FieldData {
        let (width, height) = fos.dimensions();
        let mut risk = FieldData::new(width, height);
        risk.as_mut_slice()
            .par_iter_mut()
            .zip(fos.as_slice().par_iter())
            .for_each(|(r, &f)| *r = self.risk(f));
        risk
    }
}

/// Map FoS to risk with an explicit curve.
pub fn fos_to_risk(fos: &FieldData, steepness: f32, center: f32) -> Result<FieldData> {
    let curve = RiskCurve { steepness, center };
    curve.validate()?;
    Ok(curve.apply(fos))
}

/// Grid-wide risk figures for a cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub max_risk: f32,
    pub mean_risk: f32,
    /// Cells at or above the primary threshold
    pub high_risk_cells: usize,
    /// Cells with FoS below 1
    pub critical_cells: usize,
    pub min_fos: f32,
}

impl RiskSummary {
    #[must_use]
    pub fn compute(fos: &FieldData, risk: &FieldData, primary_threshold: f32) -> Self {
        Self {
            max_risk: risk.max().unwrap_or(0.0),
            mean_risk: risk.mean() as f32,
            high_risk_cells: risk
                .as_slice()
                .iter()
                .filter(|&&r| r >= primary_threshold)
                .count(),
            critical_cells: fos.as_slice().iter().filter(|&&f| f < 1.0).count(),
            min_fos: fos.min().unwrap_or(0.0),
        }
    }
}

/// One of the highest-risk cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    /// `r{row}c{col}`
    pub id: String,
    pub row: usize,
    pub col: usize,
    pub location: Vec2,
    pub risk: f32,
}

/// The `k` highest-risk cells, highest first (ties by cell index).
pub fn top_hotspots(risk: &FieldData, coords: &GridCoords, k: usize) -> Result<Vec<Hotspot>> {
    let (width, height) = coords.dimensions();
    risk.ensure_shape("risk", width, height)?;

    let mut order: Vec<usize> = (0..risk.len()).collect();
    let values = risk.as_slice();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));

    Ok(order
        .into_iter()
        .take(k)
        .map(|idx| {
            let (row, col) = (idx / width, idx % width);
            Hotspot {
                id: format!("r{row}c{col}"),
                row,
                col,
                location: coords.position(idx),
                risk: values[idx],
            }
        })
        .collect())
}
