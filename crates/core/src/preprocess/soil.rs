//! Geotechnical soil parameters from texture and bulk density
//!
//! Derives the infinite-slope inputs (cohesion, friction angle, unit weight,
//! soil depth and saturated hydraulic conductivity) from per-cell texture
//! fractions, bulk density and slope. All relations are linear mixing rules
//! over normalised clay/silt/sand fractions:
//!
//! - Cohesion (kPa): clay-dominated, `20·clay + 5·silt + 1·sand`
//! - Friction angle (deg): sand-dominated, `20·clay + 28·silt + 35·sand`
//! - Ksat (m/s): `log10 Ksat = -7·clay - 6·silt - 4·sand`
//! - Unit weight (kN/m³): `0.1 × bulk density` (bulk stored as 135 for 1.35 g/cm³)
//! - Depth (m): `4·exp(-0.02·slope)` clamped to the configured range, so
//!   steeper slopes carry thinner soil
//!
//! The output is constant for a session.

use crate::error::{Error, Result};
use crate::grid::{CellParam, FieldData};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Cohesion contribution per unit fraction (kPa): clay, silt, sand
const COHESION_KPA: [f32; 3] = [20.0, 5.0, 1.0];

/// Friction angle contribution per unit fraction (deg): clay, silt, sand
const FRICTION_DEG: [f32; 3] = [20.0, 28.0, 35.0];

/// log10(Ksat) contribution per unit fraction: clay, silt, sand
const LOG10_KSAT: [f32; 3] = [-7.0, -6.0, -4.0];

/// Soil depth heuristic settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilConfig {
    /// Depth on flat ground before the slope decay (m)
    pub depth_scale: f32,
    /// Exponential thinning per degree of slope
    pub depth_decay_per_deg: f32,
    /// Minimum soil depth (m)
    pub min_depth: f32,
    /// Maximum soil depth (m)
    pub max_depth: f32,
    /// Bulk density to unit weight conversion (kN/m³ per bulk unit)
    pub unit_weight_factor: f32,
}

impl Default for SoilConfig {
    fn default() -> Self {
        Self {
            depth_scale: 4.0,
            depth_decay_per_deg: 0.02,
            min_depth: 1.0,
            max_depth: 5.0,
            unit_weight_factor: 0.1,
        }
    }
}

impl SoilConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_depth > 0.0 && self.min_depth <= self.max_depth) {
            return Err(Error::invalid_parameter(
                "soil.min_depth",
                self.min_depth,
                format!("must be positive and <= max_depth ({})", self.max_depth),
            ));
        }
        if !(self.depth_scale.is_finite() && self.depth_scale > 0.0) {
            return Err(Error::invalid_parameter(
                "soil.depth_scale",
                self.depth_scale,
                "must be positive",
            ));
        }
        if !(self.unit_weight_factor.is_finite() && self.unit_weight_factor > 0.0) {
            return Err(Error::invalid_parameter(
                "soil.unit_weight_factor",
                self.unit_weight_factor,
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Soil depth (m) for a slope in degrees.
    #[inline]
    #[must_use]
    pub fn depth_for_slope(&self, slope_deg: f32) -> f32 {
        (self.depth_scale * (-self.depth_decay_per_deg * slope_deg).exp())
            .clamp(self.min_depth, self.max_depth)
    }
}

/// Raw texture inputs per cell.
///
/// Fractions need not sum to one; they are normalised per cell.
#[derive(Debug, Clone)]
pub struct TextureFields {
    pub clay: FieldData,
    pub sand: FieldData,
    pub silt: FieldData,
    /// Bulk density (dataset units, 135 = 1.35 g/cm³)
    pub bulk_density: FieldData,
}

impl TextureFields {
    /// Same texture everywhere.
    #[must_use]
    pub fn uniform(
        width: usize,
        height: usize,
        clay: f32,
        sand: f32,
        silt: f32,
        bulk_density: f32,
    ) -> Self {
        Self {
            clay: FieldData::with_value(width, height, clay),
            sand: FieldData::with_value(width, height, sand),
            silt: FieldData::with_value(width, height, silt),
            bulk_density: FieldData::with_value(width, height, bulk_density),
        }
    }
}

/// Mechanical and hydraulic soil parameters.
///
/// Each field is either a regional scalar or a per-cell grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilParameters {
    /// Cohesion c (kPa)
    pub cohesion: CellParam,
    /// Internal friction angle φ (degrees)
    pub friction_angle: CellParam,
    /// Unit weight γ (kN/m³)
    pub unit_weight: CellParam,
    /// Soil depth z (m)
    pub depth: CellParam,
    /// Saturated hydraulic conductivity (m/s)
    pub ksat: CellParam,
}

impl SoilParameters {
    /// Regional parameters shared by every cell.
    #[must_use]
    pub fn uniform(
        cohesion: f32,
        friction_angle: f32,
        unit_weight: f32,
        depth: f32,
        ksat: f32,
    ) -> Self {
        Self {
            cohesion: cohesion.into(),
            friction_angle: friction_angle.into(),
            unit_weight: unit_weight.into(),
            depth: depth.into(),
            ksat: ksat.into(),
        }
    }

    /// Expand every parameter to the grid shape and check physical ranges.
    pub fn resolve(&self, width: usize, height: usize) -> Result<ResolvedSoil> {
        self.cohesion.ensure_range("cohesion", 0.0, f32::MAX)?;
        self.friction_angle.ensure_range("friction_angle", 0.0, 89.9)?;
        self.unit_weight.ensure_range("unit_weight", 0.0, f32::MAX)?;
        self.depth.ensure_range("depth", 0.0, f32::MAX)?;
        self.ksat.ensure_range("ksat", 0.0, f32::MAX)?;

        Ok(ResolvedSoil {
            cohesion: self.cohesion.resolve("cohesion", width, height)?,
            friction_angle: self.friction_angle.resolve("friction_angle", width, height)?,
            unit_weight: self.unit_weight.resolve("unit_weight", width, height)?,
            depth: self.depth.resolve("depth", width, height)?,
            ksat: self.ksat.resolve("ksat", width, height)?,
            width,
            height,
        })
    }
}

/// Soil parameters expanded to flat per-cell buffers.
#[derive(Debug, Clone)]
pub struct ResolvedSoil {
    pub cohesion: Vec<f32>,
    pub friction_angle: Vec<f32>,
    pub unit_weight: Vec<f32>,
    pub depth: Vec<f32>,
    pub ksat: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl ResolvedSoil {
    /// Grid dimensions as `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

/// Per-cell soil parameters for a single texture sample.
#[inline]
fn cell_parameters(
    clay: f32,
    sand: f32,
    silt: f32,
    bulk: f32,
    slope_deg: f32,
    config: &SoilConfig,
) -> Option<[f32; 5]> {
    let total = clay + sand + silt;
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    let fractions = [clay / total, silt / total, sand / total];
    let mix = |coeffs: [f32; 3]| -> f32 {
        coeffs
            .iter()
            .zip(fractions.iter())
            .map(|(c, f)| c * f)
            .sum()
    };

    Some([
        mix(COHESION_KPA),
        mix(FRICTION_DEG),
        bulk * config.unit_weight_factor,
        config.depth_for_slope(slope_deg),
        10f32.powf(mix(LOG10_KSAT)),
    ])
}

/// Estimate soil parameters for every cell.
///
/// # Arguments
///
/// * `texture` - Clay/sand/silt fractions and bulk density per cell
/// * `slope_deg` - Slope in degrees, same shape as the texture grids
/// * `config` - Depth heuristic settings
///
/// # Errors
///
/// `DegenerateTexture` if clay + sand + silt is zero (or non-finite) in any
/// cell; `ShapeMismatch` if the inputs disagree in shape.
pub fn estimate_soil_parameters(
    texture: &TextureFields,
    slope_deg: &FieldData,
    config: &SoilConfig,
) -> Result<SoilParameters> {
    config.validate()?;
    let (width, height) = slope_deg.dimensions();
    texture.clay.ensure_shape("clay", width, height)?;
    texture.sand.ensure_shape("sand", width, height)?;
    texture.silt.ensure_shape("silt", width, height)?;
    texture.bulk_density.ensure_shape("bulk_density", width, height)?;

    let cells: Vec<Option<[f32; 5]>> = (0..slope_deg.len())
        .into_par_iter()
        .map(|i| {
            cell_parameters(
                texture.clay.data[i],
                texture.sand.data[i],
                texture.silt.data[i],
                texture.bulk_density.data[i],
                slope_deg.data[i],
                config,
            )
        })
        .collect();

    let mut columns: [Vec<f32>; 5] = std::array::from_fn(|_| Vec::with_capacity(cells.len()));
    for (cell, params) in cells.into_iter().enumerate() {
        let params = params.ok_or(Error::DegenerateTexture { cell })?;
        for (column, value) in columns.iter_mut().zip(params) {
            column.push(value);
        }
    }
    let [cohesion, friction_angle, unit_weight, depth, ksat] =
        columns.map(|data| CellParam::PerCell(FieldData { data, width, height }));

    info!("Estimated soil parameters for {}x{} cells", width, height);

    Ok(SoilParameters {
        cohesion,
        friction_angle,
        unit_weight,
        depth,
        ksat,
    })
}
