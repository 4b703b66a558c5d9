//! Rain sensor readings and rainfall source types

use super::Vec2;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Live sensor feed keyed by sensor id, refreshed by the caller each cycle.
pub type SensorFeed = FxHashMap<String, SensorReading>;

/// A single rain-rate observation.
///
/// Readings are transient: they arrive each cycle, are filtered and fused
/// into the rainfall grid, and are then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Sensor identifier
    pub id: String,
    /// Location in grid coordinate units (x/y meters or lon/lat degrees)
    pub location: Vec2,
    /// Rain rate (mm/hr)
    pub value: f32,
    /// Observation time
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    /// Create a new reading
    pub fn new(
        id: impl Into<String>,
        location: Vec2,
        value: f32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            location,
            value,
            timestamp,
        }
    }

    /// Structural validation of the record itself.
    ///
    /// An empty id or a non-finite location makes the record unusable and is
    /// reported as `MalformedReading`. The rain value is not checked here;
    /// out-of-range values are sensor-quality anomalies handled by the
    /// anomaly filter.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::MalformedReading {
                id: self.id.clone(),
                reason: "empty sensor id".into(),
            });
        }
        if !(self.location.x.is_finite() && self.location.y.is_finite()) {
            return Err(Error::MalformedReading {
                id: self.id.clone(),
                reason: format!("non-finite location ({}, {})", self.location.x, self.location.y),
            });
        }
        Ok(())
    }
}

/// Origin of a rainfall measurement grid.
///
/// Determines the measurement noise used by the Kalman fuser: remote-sensing
/// products are noisier than interpolated, calibrated gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    Satellite,
    Radar,
    Gauge,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Satellite => "satellite",
            Self::Radar => "radar",
            Self::Gauge => "gauge",
        };
        f.write_str(name)
    }
}

/// Spatial-consistency status of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SensorStatus {
    #[default]
    Ok,
    Suspect,
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_id() {
        let r = SensorReading::new(" ", Vec2::new(0.0, 0.0), 5.0, Utc::now());
        assert!(matches!(r.validate(), Err(Error::MalformedReading { .. })));
    }

    #[test]
    fn test_validate_rejects_nan_location() {
        let r = SensorReading::new("S1", Vec2::new(f32::NAN, 0.0), 5.0, Utc::now());
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_out_of_range_value_is_not_malformed() {
        let r = SensorReading::new("S1", Vec2::new(0.0, 0.0), 9999.0, Utc::now());
        assert!(r.validate().is_ok());
    }
}
