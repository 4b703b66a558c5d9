//! Antecedent soil saturation carried between cycles
//!
//! Each cycle the previous saturation decays (drainage and
//! evapotranspiration) and fresh rain recharges it:
//!
//! `s ← clamp(s · decay + rain_mm · recharge, floor, ceiling)`

use crate::error::{Error, Result};
use crate::grid::FieldData;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Saturation bookkeeping settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaturationConfig {
    /// Saturation at session start
    pub initial: f32,
    /// Fraction retained per cycle
    pub decay: f32,
    /// Saturation added per mm of rain
    pub recharge_per_mm: f32,
    /// Field capacity floor
    pub floor: f32,
    pub ceiling: f32,
}

impl Default for SaturationConfig {
    fn default() -> Self {
        Self {
            initial: 0.2,
            decay: 0.98,
            recharge_per_mm: 0.001,
            floor: 0.1,
            ceiling: 1.0,
        }
    }
}

impl SaturationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.floor)
            || !(0.0..=1.0).contains(&self.ceiling)
            || self.floor > self.ceiling
        {
            return Err(Error::invalid_parameter(
                "saturation.floor",
                self.floor,
                format!(
                    "floor and ceiling ({}) must satisfy 0 <= floor <= ceiling <= 1",
                    self.ceiling
                ),
            ));
        }
        if !(self.floor..=self.ceiling).contains(&self.initial) {
            return Err(Error::invalid_parameter(
                "saturation.initial",
                self.initial,
                "must lie between floor and ceiling",
            ));
        }
        if !(0.0..=1.0).contains(&self.decay) {
            return Err(Error::invalid_parameter(
                "saturation.decay",
                self.decay,
                "must be in [0, 1]",
            ));
        }
        if !(self.recharge_per_mm.is_finite() && self.recharge_per_mm >= 0.0) {
            return Err(Error::invalid_parameter(
                "saturation.recharge_per_mm",
                self.recharge_per_mm,
                "must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Per-cell saturation degree in `[floor, ceiling]`
#[derive(Debug, Clone)]
pub struct SaturationState {
    field: FieldData,
    config: SaturationConfig,
}

impl SaturationState {
    pub fn new(width: usize, height: usize, config: SaturationConfig) -> Result<Self> {
        config.validate()?;
        if width == 0 || height == 0 {
            return Err(Error::EmptyGrid("saturation"));
        }
        Ok(Self {
            field: FieldData::with_value(width, height, config.initial),
            config,
        })
    }

    /// Apply one cycle of decay and recharge from a rain-depth grid (mm).
    pub fn update(&mut self, rain_mm: &FieldData) -> Result<&FieldData> {
        let (width, height) = self.field.dimensions();
        rain_mm.ensure_shape("rain", width, height)?;
        let SaturationConfig {
            decay,
            recharge_per_mm,
            floor,
            ceiling,
            ..
        } = self.config;
        self.field
            .as_mut_slice()
            .par_iter_mut()
            .zip(rain_mm.as_slice().par_iter())
            .for_each(|(s, &rain)| {
                *s = (*s * decay + rain.max(0.0) * recharge_per_mm).clamp(floor, ceiling);
            });
        Ok(&self.field)
    }

    #[must_use]
    pub fn field(&self) -> &FieldData {
        &self.field
    }

    #[must_use]
    pub fn config(&self) -> &SaturationConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.field.fill(self.config.initial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recharge_and_decay() {
        let mut s = SaturationState::new(2, 1, SaturationConfig::default()).unwrap();
        let rain = FieldData::from_vec(2, 1, vec![0.0, 100.0]).unwrap();
        s.update(&rain).unwrap();
        assert_relative_eq!(s.field().get(0, 0), 0.196, epsilon = 1e-6);
        assert_relative_eq!(s.field().get(1, 0), 0.296, epsilon = 1e-6);
    }

    #[test]
    fn test_clamped_to_bounds() {
        let mut s = SaturationState::new(2, 1, SaturationConfig::default()).unwrap();
        let dry = FieldData::new(2, 1);
        for _ in 0..500 {
            s.update(&dry).unwrap();
        }
        assert_relative_eq!(s.field().get(0, 0), 0.1);

        let deluge = FieldData::with_value(2, 1, 5000.0);
        s.update(&deluge).unwrap();
        assert_relative_eq!(s.field().get(1, 0), 1.0);
    }

    #[test]
    fn test_invalid_initial() {
        let config = SaturationConfig {
            initial: 0.05,
            ..SaturationConfig::default()
        };
        assert!(SaturationState::new(1, 1, config).is_err());
    }
}
