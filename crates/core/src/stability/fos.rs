//! Infinite-slope factor of safety with a simplified Green-Ampt front
//!
//! Units follow the kN-m-kPa system: cohesion in kPa, unit weight in kN/m³,
//! depth in m, stresses in kPa.
//!
//! For each cell:
//!
//! ```text
//! rise  = min(rain, Ksat) · duration / n_e
//! h_w   = clamp(s · z + rise, 0, z)
//! σ'    = max(γ z cos²α − γ_w h_w cos²α, 0)
//! τ     = max(γ z sinα cosα, 1e-5)
//! FoS   = clamp((c + σ' tanφ) / τ, 0, 10)
//! ```
//!
//! FoS below 1 means the driving shear exceeds the available strength.
//!
//! # References
//! - Skempton, A.W. & DeLory, F.A. (1957). "Stability of natural slopes in
//!   London Clay"
//! - Green, W.H. & Ampt, G.A. (1911). "Studies on soil physics"

use crate::error::{Error, Result};
use crate::grid::{CellParam, FieldData};
use crate::preprocess::{ResolvedSoil, SoilParameters};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Unit weight of water (kN/m³)
pub const GAMMA_W: f32 = 9.81;

/// mm/hr to m/s
pub const MMPH_TO_MPS: f32 = 2.777e-7;

/// Slope clamp (degrees)
pub const MIN_SLOPE_DEG: f32 = 0.1;
pub const MAX_SLOPE_DEG: f32 = 89.9;

/// Upper bound of the reported factor of safety
pub const MAX_FOS: f32 = 10.0;

/// Floor on the driving shear stress (kPa)
pub const MIN_DRIVING_STRESS: f32 = 1e-5;

/// Stability model settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Storm duration used for the infiltration step (hours)
    pub duration_hours: f32,
    /// Effective porosity n_e converting infiltrated depth to water-table rise
    pub effective_porosity: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            duration_hours: 6.0,
            effective_porosity: 0.3,
        }
    }
}

impl StabilityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.duration_hours.is_finite() && self.duration_hours >= 0.0) {
            return Err(Error::invalid_parameter(
                "stability.duration_hours",
                self.duration_hours,
                "must be non-negative",
            ));
        }
        if !(self.effective_porosity > 0.0 && self.effective_porosity <= 1.0) {
            return Err(Error::invalid_parameter(
                "stability.effective_porosity",
                self.effective_porosity,
                "must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Inputs of a single cell
#[derive(Debug, Clone, Copy)]
struct CellInput {
    slope_deg: f32,
    cohesion: f32,
    friction_deg: f32,
    unit_weight: f32,
    depth: f32,
    ksat: f32,
    saturation: f32,
    rain_mmph: f32,
}

#[inline]
fn cell_fos(cell: CellInput, duration_s: f32, porosity: f32) -> f32 {
    let alpha = cell
        .slope_deg
        .clamp(MIN_SLOPE_DEG, MAX_SLOPE_DEG)
        .to_radians();
    let (sin_a, cos_a) = alpha.sin_cos();
    let cos2 = cos_a * cos_a;
    let z = cell.depth;

    let infiltration_rate = (cell.rain_mmph * MMPH_TO_MPS).min(cell.ksat);
    let rise = infiltration_rate * duration_s / porosity;
    let h_w = (cell.saturation * z + rise).clamp(0.0, z);

    let sigma = cell.unit_weight * z * cos2;
    let u = GAMMA_W * h_w * cos2;
    let sigma_eff = (sigma - u).max(0.0);

    let tau = (cell.unit_weight * z * sin_a * cos_a).max(MIN_DRIVING_STRESS);
    let resisting = cell.cohesion + sigma_eff * cell.friction_deg.to_radians().tan();

    (resisting / tau).clamp(0.0, MAX_FOS)
}

/// Factor of safety solver for a fixed soil session
#[derive(Debug, Clone, Default)]
pub struct StabilityEngine {
    config: StabilityConfig,
}

impl StabilityEngine {
    pub fn new(config: StabilityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// FoS grid for already-resolved soil buffers.
    ///
    /// `saturation` and `rain_mmph` must match the soil grid shape.
    pub fn compute(
        &self,
        slope_deg: &FieldData,
        soil: &ResolvedSoil,
        saturation: &[f32],
        rain_mmph: &[f32],
    ) -> Result<FieldData> {
        let (width, height) = soil.dimensions();
        slope_deg.ensure_shape("slope", width, height)?;
        let n = width * height;
        for (name, len) in [("saturation", saturation.len()), ("rain", rain_mmph.len())] {
            if len != n {
                return Err(Error::ShapeMismatch {
                    field: name,
                    expected_width: width,
                    expected_height: height,
                    width: len,
                    height: 1,
                });
            }
        }

        let duration_s = self.config.duration_hours * 3600.0;
        let porosity = self.config.effective_porosity;

        let mut fos = FieldData::new(width, height);
        fos.as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, out)| {
                let cell = CellInput {
                    slope_deg: slope_deg.as_slice()[i],
                    cohesion: soil.cohesion[i],
                    friction_deg: soil.friction_angle[i],
                    unit_weight: soil.unit_weight[i],
                    depth: soil.depth[i],
                    ksat: soil.ksat[i],
                    saturation: saturation[i],
                    rain_mmph: rain_mmph[i],
                };
                *out = cell_fos(cell, duration_s, porosity);
            });
        Ok(fos)
    }
}

/// Compute the factor of safety over a slope grid.
///
/// Soil parameters, saturation and rain intensity may each be a scalar or a
/// per-cell grid of the slope's shape.
pub fn compute_fos(
    slope_deg: &FieldData,
    soil: &SoilParameters,
    saturation: &CellParam,
    rain_mmph: &CellParam,
    duration_hours: f32,
) -> Result<FieldData> {
    let (width, height) = slope_deg.dimensions();
    if slope_deg.is_empty() {
        return Err(Error::EmptyGrid("slope"));
    }
    let engine = StabilityEngine::new(StabilityConfig {
        duration_hours,
        ..StabilityConfig::default()
    })?;
    let resolved = soil.resolve(width, height)?;
    saturation.ensure_range("saturation", 0.0, 1.0)?;
    rain_mmph.ensure_range("rain", 0.0, f32::MAX)?;
    let saturation = saturation.resolve("saturation", width, height)?;
    let rain = rain_mmph.resolve("rain", width, height)?;
    engine.compute(slope_deg, &resolved, &saturation, &rain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dry_cell(slope_deg: f32) -> CellInput {
        CellInput {
            slope_deg,
            cohesion: 5.0,
            friction_deg: 30.0,
            unit_weight: 18.0,
            depth: 2.0,
            ksat: 1e-5,
            saturation: 0.0,
            rain_mmph: 0.0,
        }
    }

    #[test]
    fn test_dry_cohesionless_matches_closed_form() {
        // c = 0, dry: FoS = tanφ / tanα
        let cell = CellInput {
            cohesion: 0.0,
            ..dry_cell(40.0)
        };
        let expected = 30_f32.to_radians().tan() / 40_f32.to_radians().tan();
        assert_relative_eq!(cell_fos(cell, 0.0, 0.3), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_flat_is_capped() {
        assert_eq!(cell_fos(dry_cell(0.0), 21600.0, 0.3), MAX_FOS);
    }

    #[test]
    fn test_rain_lowers_fos() {
        let dry = cell_fos(dry_cell(35.0), 21600.0, 0.3);
        let wet = cell_fos(
            CellInput {
                rain_mmph: 50.0,
                ..dry_cell(35.0)
            },
            21600.0,
            0.3,
        );
        assert!(wet < dry, "rain should reduce FoS ({wet} vs {dry})");
    }

    #[test]
    fn test_infiltration_limited_by_ksat() {
        let slow = CellInput {
            ksat: 1e-8,
            rain_mmph: 100.0,
            ..dry_cell(35.0)
        };
        let slower_rain = CellInput {
            rain_mmph: 200.0,
            ..slow
        };
        // Once rain exceeds Ksat more rain changes nothing
        assert_eq!(cell_fos(slow, 21600.0, 0.3), cell_fos(slower_rain, 21600.0, 0.3));
    }

    #[test]
    fn test_compute_fos_accepts_scalars_and_grids() {
        let slope = FieldData::with_value(3, 2, 30.0);
        let soil = SoilParameters::uniform(5.0, 30.0, 18.0, 2.0, 1e-5);
        let a = compute_fos(
            &slope,
            &soil,
            &CellParam::Uniform(0.3),
            &CellParam::Uniform(10.0),
            6.0,
        )
        .unwrap();

        let mut grid_soil = soil.clone();
        grid_soil.cohesion = FieldData::with_value(3, 2, 5.0).into();
        let b = compute_fos(
            &slope,
            &grid_soil,
            &FieldData::with_value(3, 2, 0.3).into(),
            &CellParam::Uniform(10.0),
            6.0,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_compute_fos_shape_mismatch() {
        let slope = FieldData::with_value(3, 2, 30.0);
        let soil = SoilParameters::uniform(5.0, 30.0, 18.0, 2.0, 1e-5);
        let sat = FieldData::new(2, 2).into();
        assert!(compute_fos(&slope, &soil, &sat, &CellParam::Uniform(0.0), 6.0).is_err());
    }
}
