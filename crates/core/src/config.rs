//! Session configuration
//!
//! One sub-config per component. Every section has defaults matching the
//! operational setup, so a JSON file only needs to list what differs.

use crate::error::{Error, Result};
use crate::preprocess::SoilConfig;
use crate::rainfall::{AnomalyFilterConfig, DownscaleConfig, HealthConfig, IdwConfig, KalmanConfig};
use crate::risk::{AlertConfig, RiskCurve};
use crate::stability::{SaturationConfig, StabilityConfig};
use serde::{Deserialize, Serialize};

/// Full early-warning configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EwsConfig {
    pub soil: SoilConfig,
    pub downscale: DownscaleConfig,
    pub anomaly: AnomalyFilterConfig,
    pub health: HealthConfig,
    pub idw: IdwConfig,
    pub kalman: KalmanConfig,
    pub saturation: SaturationConfig,
    pub stability: StabilityConfig,
    pub risk: RiskCurve,
    pub alert: AlertConfig,
    pub cycle: CycleConfig,
}

/// Cycle-level settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Time covered by one cycle (hours); converts rain rate to depth
    pub cycle_hours: f32,
    /// Hotspots listed in each report
    pub hotspot_count: usize,
    /// Cells flatter than this are never at risk (degrees); 0 assesses all
    pub min_slope_deg: f32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            cycle_hours: 1.0,
            hotspot_count: 5,
            min_slope_deg: 10.0,
        }
    }
}

impl CycleConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.cycle_hours.is_finite() && self.cycle_hours > 0.0) {
            return Err(Error::invalid_parameter(
                "cycle.cycle_hours",
                self.cycle_hours,
                "must be positive",
            ));
        }
        if !(0.0..90.0).contains(&self.min_slope_deg) {
            return Err(Error::invalid_parameter(
                "cycle.min_slope_deg",
                self.min_slope_deg,
                "must be in [0, 90)",
            ));
        }
        Ok(())
    }
}

impl EwsConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.soil.validate()?;
        self.downscale.validate()?;
        self.anomaly.validate()?;
        self.health.validate()?;
        self.idw.validate()?;
        self.kalman.validate()?;
        self.saturation.validate()?;
        self.stability.validate()?;
        self.risk.validate()?;
        self.alert.validate()?;
        self.cycle.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EwsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_section_reported() {
        let mut config = EwsConfig::default();
        config.alert.secondary_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidParameter {
                name: "alert.secondary_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EwsConfig =
            serde_json::from_str(r#"{"cycle": {"min_slope_deg": 0.0}}"#).unwrap();
        assert_eq!(config.cycle.min_slope_deg, 0.0);
        assert_eq!(config.cycle.hotspot_count, 5);
        assert!(config.validate().is_ok());

        let steep: EwsConfig =
            serde_json::from_str(r#"{"cycle": {"min_slope_deg": 90.0}}"#).unwrap();
        assert!(steep.validate().is_err());
    }
}
