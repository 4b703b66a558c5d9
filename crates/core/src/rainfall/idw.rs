//! Inverse-distance-weighted fusion of point sensors onto the grid
//!
//! Each cell receives the weighted average of all sensor values with weight
//! `1 / (d²)^(p/2)`. The squared distance is floored at `min_distance_sq`, so
//! a cell sitting exactly on a sensor takes (almost exactly) that sensor's
//! value instead of dividing by zero.
//!
//! An optional orographic correction scales the interpolated rain by the
//! cell's elevation relative to the mean sensor elevation, since gauges in
//! valleys under-report rain on the ridges above them.

use crate::core_types::SensorReading;
use crate::error::{Error, Result};
use crate::grid::{FieldData, GridCoords};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Elevation-dependent rain enhancement applied after IDW
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrographicCorrection {
    /// Fractional enhancement per meter above the mean sensor elevation
    pub factor_per_m: f32,
    pub min_multiplier: f32,
    pub max_multiplier: f32,
}

impl Default for OrographicCorrection {
    fn default() -> Self {
        Self {
            factor_per_m: 0.0002,
            min_multiplier: 0.5,
            max_multiplier: 2.5,
        }
    }
}

impl OrographicCorrection {
    #[must_use]
    pub fn multiplier(&self, elevation_diff: f32) -> f32 {
        (1.0 + self.factor_per_m * elevation_diff).clamp(self.min_multiplier, self.max_multiplier)
    }
}

/// IDW settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdwConfig {
    /// Distance exponent
    pub power: f32,
    /// Floor on squared distance (grid units²)
    pub min_distance_sq: f64,
    /// Disabled when `None`
    pub orographic: Option<OrographicCorrection>,
}

impl Default for IdwConfig {
    fn default() -> Self {
        Self {
            power: 2.0,
            min_distance_sq: 1e-10,
            orographic: None,
        }
    }
}

impl IdwConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(Error::invalid_parameter(
                "idw.power",
                self.power,
                "must be positive",
            ));
        }
        if !(self.min_distance_sq.is_finite() && self.min_distance_sq > 0.0) {
            return Err(Error::invalid_parameter(
                "idw.min_distance_sq",
                self.min_distance_sq,
                "must be positive",
            ));
        }
        if let Some(oro) = &self.orographic {
            if !(oro.min_multiplier > 0.0 && oro.min_multiplier <= oro.max_multiplier) {
                return Err(Error::invalid_parameter(
                    "idw.orographic.min_multiplier",
                    oro.min_multiplier,
                    format!("must be in (0, {}]", oro.max_multiplier),
                ));
            }
        }
        Ok(())
    }
}

/// IDW fuser bound to a configuration
#[derive(Debug, Clone, Default)]
pub struct IdwFuser {
    config: IdwConfig,
}

impl IdwFuser {
    pub fn new(config: IdwConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &IdwConfig {
        &self.config
    }

    /// Interpolate `readings` onto every cell of `coords`.
    ///
    /// With no readings the `background` grid is returned unchanged. When an
    /// orographic correction is configured, `elevation` must be supplied;
    /// without it the correction is skipped.
    pub fn fuse(
        &self,
        readings: &[SensorReading],
        coords: &GridCoords,
        background: &FieldData,
        elevation: Option<&FieldData>,
    ) -> Result<FieldData> {
        let (width, height) = coords.dimensions();
        background.ensure_shape("background", width, height)?;

        if readings.is_empty() {
            debug!("No valid sensors, using background grid");
            return Ok(background.clone());
        }
        for reading in readings {
            reading.validate()?;
        }

        let half_power = f64::from(self.config.power) / 2.0;
        let floor = self.config.min_distance_sq;
        let points: Vec<(f64, f64, f64)> = readings
            .iter()
            .map(|r| {
                (
                    f64::from(r.location.x),
                    f64::from(r.location.y),
                    f64::from(r.value),
                )
            })
            .collect();

        let mut fused = FieldData::new(width, height);
        fused
            .as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, out)| {
                let p = coords.position(idx);
                let (cx, cy) = (f64::from(p.x), f64::from(p.y));
                let mut weighted = 0.0_f64;
                let mut total = 0.0_f64;
                for &(sx, sy, value) in &points {
                    let d_sq = ((cx - sx).powi(2) + (cy - sy).powi(2)).max(floor);
                    let w = 1.0 / d_sq.powf(half_power);
                    weighted += w * value;
                    total += w;
                }
                *out = (weighted / total) as f32;
            });

        if let (Some(oro), Some(elev)) = (self.config.orographic, elevation) {
            apply_orographic_correction(&mut fused, readings, coords, elev, &oro)?;
        }

        Ok(fused)
    }
}

/// Scale `rain` in place by the orographic multiplier of each cell.
///
/// Sensor elevations are sampled at their nearest grid cell.
pub fn apply_orographic_correction(
    rain: &mut FieldData,
    readings: &[SensorReading],
    coords: &GridCoords,
    elevation: &FieldData,
    correction: &OrographicCorrection,
) -> Result<()> {
    let (width, height) = rain.dimensions();
    elevation.ensure_shape("elevation", width, height)?;

    let sensor_elevations: Vec<f64> = readings
        .iter()
        .filter_map(|r| coords.nearest_cell(r.location))
        .map(|idx| f64::from(elevation.as_slice()[idx]))
        .collect();
    if sensor_elevations.is_empty() {
        return Ok(());
    }
    let mean_sensor_elev =
        (sensor_elevations.iter().sum::<f64>() / sensor_elevations.len() as f64) as f32;

    rain.as_mut_slice()
        .par_iter_mut()
        .zip(elevation.as_slice().par_iter())
        .for_each(|(r, &z)| {
            *r *= correction.multiplier(z - mean_sensor_elev);
        });
    Ok(())
}

/// Fuse sensors onto the grid with the given power and the default distance floor.
pub fn fuse_idw(
    readings: &[SensorReading],
    coords: &GridCoords,
    power: f32,
    background: &FieldData,
) -> Result<FieldData> {
    IdwFuser::new(IdwConfig {
        power,
        ..IdwConfig::default()
    })?
    .fuse(readings, coords, background, None)
}
