//! Terrain-aware rainfall downscaling
//!
//! Converts a coarse rainfall product (satellite, NWP) onto the fine terrain
//! grid:
//!
//! 1. Bilinear resampling of the coarse grid to the fine shape, with corner
//!    cells aligned (`src = i · (n_in − 1) / (n_out − 1)`).
//! 2. Slope bias as an orographic proxy: the fine slope is standardised
//!    (z-score) and turned into a multiplier `1 + k · z`, clamped to
//!    `[0.5, 2.0]`.
//! 3. Mass balance: the result is rescaled so that
//!    `Σ fine · fine_area == Σ coarse · coarse_area`.
//! 4. Optionally, zero-mean Gaussian noise with σ = 10 % of the mean fine
//!    rain is added and the result clamped at zero, for ensemble runs.

use crate::error::{Error, Result};
use crate::grid::{compute_slope, FieldData, TerrainGrid};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Downscaling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownscaleConfig {
    /// Orographic slope-bias coefficient `k`
    pub slope_bias: f32,
    /// Lower clamp of the bias multiplier
    pub min_bias: f32,
    /// Upper clamp of the bias multiplier
    pub max_bias: f32,
    /// Added to the slope standard deviation before normalising
    pub slope_std_epsilon: f64,
    /// Added to the fine volume before computing the mass-balance ratio
    pub mass_balance_epsilon: f64,
    /// Noise standard deviation as a fraction of mean rain (stochastic mode)
    pub noise_fraction: f32,
}

impl Default for DownscaleConfig {
    fn default() -> Self {
        Self {
            slope_bias: 0.1,
            min_bias: 0.5,
            max_bias: 2.0,
            slope_std_epsilon: 1e-6,
            mass_balance_epsilon: 1e-6,
            noise_fraction: 0.1,
        }
    }
}

impl DownscaleConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_bias > 0.0 && self.min_bias <= self.max_bias) {
            return Err(Error::invalid_parameter(
                "downscale.min_bias",
                self.min_bias,
                format!("must be positive and <= max_bias ({})", self.max_bias),
            ));
        }
        if !self.slope_bias.is_finite() {
            return Err(Error::invalid_parameter(
                "downscale.slope_bias",
                self.slope_bias,
                "must be finite",
            ));
        }
        if !(self.noise_fraction.is_finite() && self.noise_fraction >= 0.0) {
            return Err(Error::invalid_parameter(
                "downscale.noise_fraction",
                self.noise_fraction,
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Deterministic or ensemble (noisy) downscaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownscaleMode {
    #[default]
    Deterministic,
    /// Adds Gaussian noise; a fixed seed makes the draw reproducible
    Stochastic { seed: Option<u64> },
}

/// Coarse-to-fine rainfall downscaler
#[derive(Debug, Clone, Default)]
pub struct RainfallDownscaler {
    config: DownscaleConfig,
}

impl RainfallDownscaler {
    pub fn new(config: DownscaleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &DownscaleConfig {
        &self.config
    }

    /// Downscale onto a prepared terrain, reusing its precomputed slope.
    pub fn downscale_onto(
        &self,
        coarse: &FieldData,
        terrain: &TerrainGrid,
        coarse_cell_size: f32,
        mode: DownscaleMode,
    ) -> Result<FieldData> {
        self.downscale_with_slope(
            coarse,
            terrain.slope(),
            coarse_cell_size,
            terrain.cell_size(),
            mode,
        )
    }

    /// Downscale onto the shape of a raw elevation grid.
    ///
    /// # Arguments
    ///
    /// * `coarse` - Coarse rainfall grid (mm or mm/hr)
    /// * `dem` - Fine elevation grid (m); defines the output shape
    /// * `coarse_cell_size` - Coarse cell size (m)
    /// * `fine_cell_size` - Fine cell size (m)
    /// * `mode` - Deterministic or stochastic
    pub fn downscale(
        &self,
        coarse: &FieldData,
        dem: &FieldData,
        coarse_cell_size: f32,
        fine_cell_size: f32,
        mode: DownscaleMode,
    ) -> Result<FieldData> {
        check_cell_size("fine_cell_size", fine_cell_size)?;
        if dem.is_empty() {
            return Err(Error::EmptyGrid("dem"));
        }
        let slope = compute_slope(dem, fine_cell_size);
        self.downscale_with_slope(coarse, &slope, coarse_cell_size, fine_cell_size, mode)
    }

    fn downscale_with_slope(
        &self,
        coarse: &FieldData,
        slope: &FieldData,
        coarse_cell_size: f32,
        fine_cell_size: f32,
        mode: DownscaleMode,
    ) -> Result<FieldData> {
        check_cell_size("coarse_cell_size", coarse_cell_size)?;
        check_cell_size("fine_cell_size", fine_cell_size)?;
        if coarse.is_empty() {
            return Err(Error::EmptyGrid("coarse rainfall"));
        }
        if slope.is_empty() {
            return Err(Error::EmptyGrid("fine terrain"));
        }
        coarse.ensure_range("coarse rainfall", 0.0, f32::MAX)?;

        // 1. Bilinear resample
        let mut fine = resample_bilinear(coarse, slope.width, slope.height);

        // 2-3. Slope bias
        let mean = slope.mean();
        let std = slope.std_dev() + self.config.slope_std_epsilon;
        let cfg = self.config;
        fine.data
            .par_iter_mut()
            .zip(slope.data.par_iter())
            .for_each(|(rain, &s)| {
                let z = ((f64::from(s) - mean) / std) as f32;
                let bias = (1.0 + cfg.slope_bias * z).clamp(cfg.min_bias, cfg.max_bias);
                *rain *= bias;
            });

        // 4. Mass balance
        let coarse_volume = coarse.sum() * f64::from(coarse_cell_size).powi(2);
        let fine_volume = fine.sum() * f64::from(fine_cell_size).powi(2);
        let correction = coarse_volume / (fine_volume + cfg.mass_balance_epsilon);
        fine.data
            .par_iter_mut()
            .for_each(|rain| *rain = (f64::from(*rain) * correction) as f32);

        debug!(
            "Downscaled {}x{} -> {}x{} rainfall, mass correction {:.4}",
            coarse.width, coarse.height, fine.width, fine.height, correction
        );

        // 5. Ensemble noise
        if let DownscaleMode::Stochastic { seed } = mode {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            add_rain_noise(&mut fine, cfg.noise_fraction, &mut rng);
        }

        Ok(fine)
    }
}

fn check_cell_size(name: &'static str, size: f32) -> Result<()> {
    if size.is_finite() && size > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_parameter(name, size, "must be positive and finite"))
    }
}

/// Add zero-mean Gaussian noise (σ = `fraction` × mean) and clamp at zero.
fn add_rain_noise(field: &mut FieldData, fraction: f32, rng: &mut StdRng) {
    let sigma = fraction * field.mean() as f32;
    // A dry field has nothing to perturb
    if sigma <= 0.0 {
        return;
    }
    let Ok(normal) = Normal::new(0.0_f32, sigma) else {
        return;
    };
    for rain in &mut field.data {
        *rain = (*rain + normal.sample(rng)).max(0.0);
    }
}

/// Resample a grid to a new shape with bilinear interpolation.
///
/// Corner cells of source and target are aligned; a single-cell dimension
/// is replicated.
#[must_use]
pub fn resample_bilinear(src: &FieldData, width: usize, height: usize) -> FieldData {
    let scale = |n_in: usize, n_out: usize| -> f32 {
        if n_out > 1 {
            (n_in - 1) as f32 / (n_out - 1) as f32
        } else {
            0.0
        }
    };
    let sx = scale(src.width, width);
    let sy = scale(src.height, height);

    let mut out = FieldData::new(width, height);
    out.data
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            let fy = y as f32 * sy;
            let y0 = (fy.floor() as usize).min(src.height - 1);
            let y1 = (y0 + 1).min(src.height - 1);
            let ty = fy - y0 as f32;
            for (x, cell) in row.iter_mut().enumerate() {
                let fx = x as f32 * sx;
                let x0 = (fx.floor() as usize).min(src.width - 1);
                let x1 = (x0 + 1).min(src.width - 1);
                let tx = fx - x0 as f32;

                let top = src.get(x0, y0) * (1.0 - tx) + src.get(x1, y0) * tx;
                let bottom = src.get(x0, y1) * (1.0 - tx) + src.get(x1, y1) * tx;
                *cell = top * (1.0 - ty) + bottom * ty;
            }
        });
    out
}

/// Downscale with the default configuration.
///
/// See [`RainfallDownscaler::downscale`].
pub fn downscale_rainfall(
    coarse: &FieldData,
    dem: &FieldData,
    coarse_cell_size: f32,
    fine_cell_size: f32,
    mode: DownscaleMode,
) -> Result<FieldData> {
    RainfallDownscaler::default().downscale(coarse, dem, coarse_cell_size, fine_cell_size, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bilinear_corners_aligned() {
        let src = FieldData::from_vec(2, 2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let out = resample_bilinear(&src, 3, 3);
        assert_eq!(out.get(0, 0), 0.0);
        assert_eq!(out.get(2, 0), 1.0);
        assert_eq!(out.get(0, 2), 2.0);
        assert_eq!(out.get(2, 2), 3.0);
        assert_relative_eq!(out.get(1, 1), 1.5);
    }

    #[test]
    fn test_bilinear_single_cell_is_constant() {
        let src = FieldData::with_value(1, 1, 7.0);
        let out = resample_bilinear(&src, 4, 5);
        assert!(out.data.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_flat_terrain_spreads_volume_evenly() {
        let coarse = FieldData::with_value(2, 2, 10.0);
        let dem = FieldData::with_value(20, 20, 100.0);
        let fine =
            downscale_rainfall(&coarse, &dem, 100.0, 10.0, DownscaleMode::Deterministic).unwrap();
        // 4 cells * 10mm * 100^2 spread over 400 cells of 10^2
        for &v in &fine.data {
            assert_relative_eq!(v, 10.0, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_steeper_cells_get_more_rain() {
        let coarse = FieldData::with_value(2, 2, 5.0);
        let terrain = TerrainGrid::single_hill(30, 30, 10.0, 0.0, 80.0, 60.0).unwrap();
        let fine = RainfallDownscaler::default()
            .downscale_onto(&coarse, &terrain, 150.0, DownscaleMode::Deterministic)
            .unwrap();
        let (steep, flat) = (terrain.slope().get(21, 15), terrain.slope().get(0, 0));
        assert!(steep > flat);
        assert!(fine.get(21, 15) > fine.get(0, 0));
    }

    #[test]
    fn test_dry_input_stays_dry() {
        let coarse = FieldData::new(3, 3);
        let dem = FieldData::with_value(9, 9, 0.0);
        let fine = downscale_rainfall(
            &coarse,
            &dem,
            30.0,
            10.0,
            DownscaleMode::Stochastic { seed: Some(1) },
        )
        .unwrap();
        assert!(fine.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_stochastic_seed_is_reproducible_and_non_negative() {
        let coarse = FieldData::from_vec(2, 2, vec![1.0, 2.0, 3.0, 40.0]).unwrap();
        let dem = FieldData::from_fn(16, 16, |x, y| (x * y) as f32);
        let mode = DownscaleMode::Stochastic { seed: Some(42) };
        let a = downscale_rainfall(&coarse, &dem, 80.0, 10.0, mode).unwrap();
        let b = downscale_rainfall(&coarse, &dem, 80.0, 10.0, mode).unwrap();
        assert_eq!(a, b);
        assert!(a.data.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_rejects_bad_cell_sizes() {
        let coarse = FieldData::with_value(2, 2, 1.0);
        let dem = FieldData::new(4, 4);
        let mode = DownscaleMode::Deterministic;
        assert!(downscale_rainfall(&coarse, &dem, 0.0, 10.0, mode).is_err());
        assert!(downscale_rainfall(&coarse, &dem, 10.0, -1.0, mode).is_err());
    }

    #[test]
    fn test_rejects_negative_or_non_finite_rain() {
        let dem = FieldData::from_fn(16, 16, |x, y| (x + y) as f32);
        let mode = DownscaleMode::Deterministic;
        let mut coarse = FieldData::with_value(2, 2, 3.0);
        assert!(downscale_rainfall(&coarse, &dem, 80.0, 10.0, mode).is_ok());
        coarse.set(1, 0, -2.0);
        assert!(downscale_rainfall(&coarse, &dem, 80.0, 10.0, mode).is_err());
        coarse.set(1, 0, f32::NAN);
        assert!(downscale_rainfall(&coarse, &dem, 80.0, 10.0, mode).is_err());
    }
}
