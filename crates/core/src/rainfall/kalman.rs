//! Per-cell scalar Kalman filter for rainfall
//!
//! Every cell carries an estimate `x` and a variance `P` that evolve
//! independently:
//!
//! ```text
//! P_pred = P + Q
//! K      = P_pred / (P_pred + R)
//! x     += K · (z − x)
//! P      = (1 − K) · P_pred
//! ```
//!
//! `Q` is fixed; `R` depends on where the measurement grid came from.
//! For constant `Q` and `R` the posterior variance converges to the positive
//! root of `P² + Q·P − Q·R = 0`.

use crate::core_types::SourceType;
use crate::error::{Error, Result};
use crate::grid::FieldData;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Kalman noise settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Variance of the prior before any measurement
    pub initial_variance: f32,
    /// Process noise Q added every step
    pub process_noise: f32,
    /// Measurement noise R for satellite products
    pub satellite_noise: f32,
    /// Measurement noise R for radar products
    pub radar_noise: f32,
    /// Measurement noise R for gauge-interpolated grids
    pub gauge_noise: f32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            initial_variance: 10.0,
            process_noise: 0.5,
            satellite_noise: 2.0,
            radar_noise: 2.0,
            gauge_noise: 0.5,
        }
    }
}

impl KalmanConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("kalman.initial_variance", self.initial_variance),
            ("kalman.process_noise", self.process_noise),
            ("kalman.satellite_noise", self.satellite_noise),
            ("kalman.radar_noise", self.radar_noise),
            ("kalman.gauge_noise", self.gauge_noise),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::invalid_parameter(name, value, "must be positive"));
            }
        }
        Ok(())
    }

    /// Measurement noise for a source type
    #[must_use]
    pub fn measurement_noise(&self, source: SourceType) -> f32 {
        match source {
            SourceType::Satellite => self.satellite_noise,
            SourceType::Radar => self.radar_noise,
            SourceType::Gauge => self.gauge_noise,
        }
    }

    /// Posterior variance reached after repeated updates from `source`.
    #[must_use]
    pub fn steady_state_variance(&self, source: SourceType) -> f32 {
        let q = f64::from(self.process_noise);
        let r = f64::from(self.measurement_noise(source));
        ((-q + (q * q + 4.0 * q * r).sqrt()) / 2.0) as f32
    }
}

/// Owned Kalman state for one grid
#[derive(Debug, Clone)]
pub struct KalmanFuser {
    estimate: FieldData,
    variance: FieldData,
    config: KalmanConfig,
}

impl KalmanFuser {
    /// Fresh filter with `x = 0` and `P = initial_variance` everywhere.
    pub fn new(width: usize, height: usize, config: KalmanConfig) -> Result<Self> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(Error::EmptyGrid("kalman state"));
        }
        Ok(Self {
            estimate: FieldData::new(width, height),
            variance: FieldData::with_value(width, height, config.initial_variance),
            config,
        })
    }

    /// Fold one measurement grid into the state and return the new estimate.
    pub fn update(&mut self, measurement: &FieldData, source: SourceType) -> Result<&FieldData> {
        let (width, height) = self.estimate.dimensions();
        measurement.ensure_shape("measurement", width, height)?;
        update_in_place(
            self.estimate.as_mut_slice(),
            self.variance.as_mut_slice(),
            measurement.as_slice(),
            self.config.process_noise,
            self.config.measurement_noise(source),
        );
        Ok(&self.estimate)
    }

    #[must_use]
    pub fn estimate(&self) -> &FieldData {
        &self.estimate
    }

    #[must_use]
    pub fn variance(&self) -> &FieldData {
        &self.variance
    }

    #[must_use]
    pub fn config(&self) -> &KalmanConfig {
        &self.config
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.estimate.fill(0.0);
        self.variance.fill(self.config.initial_variance);
    }
}

fn update_in_place(x: &mut [f32], p: &mut [f32], z: &[f32], q: f32, r: f32) {
    x.par_iter_mut()
        .zip(p.par_iter_mut())
        .zip(z.par_iter())
        .for_each(|((x, p), &z)| {
            let p_pred = *p + q;
            let k = p_pred / (p_pred + r);
            *x += k * (z - *x);
            *p = (1.0 - k) * p_pred;
        });
}

/// Single functional update step.
///
/// Returns `(new_state, new_covariance)`; the inputs are left untouched.
pub fn kalman_update(
    state: &FieldData,
    covariance: &FieldData,
    measurement: &FieldData,
    source: SourceType,
    config: &KalmanConfig,
) -> Result<(FieldData, FieldData)> {
    config.validate()?;
    let (width, height) = state.dimensions();
    covariance.ensure_shape("covariance", width, height)?;
    measurement.ensure_shape("measurement", width, height)?;

    let mut x = state.clone();
    let mut p = covariance.clone();
    update_in_place(
        x.as_mut_slice(),
        p.as_mut_slice(),
        measurement.as_slice(),
        config.process_noise,
        config.measurement_noise(source),
    );
    Ok((x, p))
}
