//! Sensor anomaly filtering
//!
//! Two independent stages run before any reading is fused:
//!
//! 1. Hard physical bounds: rain rates outside `[min_valid, max_valid]`
//!    (or non-finite) are physically impossible and dropped.
//! 2. Robust outlier rejection with the modified Z-score
//!    `0.6745 · (x − median) / MAD` (Iglewicz & Hoaglin, 1993); readings with
//!    `|score| > 3.5` are dropped.
//!
//! The statistical stage only runs when enough sensors survive the bounds
//! check. With a handful of gauges a single high reading is as likely to be
//! a real cloudburst as a fault, so it is kept. A zero MAD (all readings
//! equal) skips the stage as well.
//!
//! Rejections are not errors: the filter reports them and the pipeline
//! carries on with whatever valid readings remain.

use crate::core_types::SensorReading;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Scale factor relating MAD to the standard deviation of a normal sample
pub const MAD_CONSISTENCY: f32 = 0.6745;

/// Anomaly filter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyFilterConfig {
    /// Lowest physically valid rain rate (mm/hr)
    pub min_valid: f32,
    /// Highest physically valid rain rate (mm/hr)
    pub max_valid: f32,
    /// Minimum number of in-bounds readings for the statistical stage
    pub min_sensors_for_outlier_check: usize,
    /// Modified Z-score rejection threshold
    pub modified_z_threshold: f32,
}

impl Default for AnomalyFilterConfig {
    fn default() -> Self {
        Self {
            min_valid: 0.0,
            max_valid: 500.0,
            min_sensors_for_outlier_check: 6,
            modified_z_threshold: 3.5,
        }
    }
}

impl AnomalyFilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_valid.is_finite() && self.max_valid.is_finite())
            || self.min_valid > self.max_valid
        {
            return Err(Error::invalid_parameter(
                "anomaly.min_valid",
                self.min_valid,
                format!("must be finite and <= max_valid ({})", self.max_valid),
            ));
        }
        if self.modified_z_threshold.is_nan() || self.modified_z_threshold <= 0.0 {
            return Err(Error::invalid_parameter(
                "anomaly.modified_z_threshold",
                self.modified_z_threshold,
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Why a reading was dropped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Outside the physical bounds (or non-finite)
    OutOfBounds,
    /// Modified Z-score beyond the threshold
    StatisticalOutlier { score: f32 },
}

/// A dropped reading
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reading: SensorReading,
    pub reason: RejectReason,
}

/// Outcome of a filter pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterReport {
    /// Readings that passed every stage, in input order
    pub accepted: Vec<SensorReading>,
    /// Readings that were dropped, in input order per stage
    pub rejected: Vec<Rejection>,
}

/// Median of a non-empty slice (average of the middle pair for even lengths).
pub(crate) fn median(values: &mut [f32]) -> f32 {
    values.sort_by(f32::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Sensor anomaly filter
#[derive(Debug, Clone, Default)]
pub struct AnomalyFilter {
    config: AnomalyFilterConfig,
}

impl AnomalyFilter {
    pub fn new(config: AnomalyFilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &AnomalyFilterConfig {
        &self.config
    }

    /// Filter a batch of readings.
    ///
    /// Malformed records (empty id, non-finite location) are input errors and
    /// abort the pass.
    pub fn filter(&self, readings: &[SensorReading]) -> Result<FilterReport> {
        let mut report = FilterReport::default();

        // 1. Physical bounds
        let mut in_bounds = Vec::with_capacity(readings.len());
        for reading in readings {
            reading.validate()?;
            let v = reading.value;
            if v.is_finite() && v >= self.config.min_valid && v <= self.config.max_valid {
                in_bounds.push(reading.clone());
            } else {
                warn!(
                    "Dropping sensor {}: value {} out of bounds [{}, {}]",
                    reading.id, v, self.config.min_valid, self.config.max_valid
                );
                report.rejected.push(Rejection {
                    reading: reading.clone(),
                    reason: RejectReason::OutOfBounds,
                });
            }
        }

        // 2. Modified Z-score, only with enough sensors
        if in_bounds.len() < self.config.min_sensors_for_outlier_check {
            report.accepted = in_bounds;
            return Ok(report);
        }

        let mut values: Vec<f32> = in_bounds.iter().map(|r| r.value).collect();
        let med = median(&mut values);
        let mut deviations: Vec<f32> = values.iter().map(|v| (v - med).abs()).collect();
        let mad = median(&mut deviations);
        if mad <= 0.0 {
            report.accepted = in_bounds;
            return Ok(report);
        }

        for reading in in_bounds {
            let score = MAD_CONSISTENCY * (reading.value - med) / mad;
            if score.abs() > self.config.modified_z_threshold {
                warn!(
                    "Dropping sensor {}: statistical outlier ({} vs median {}, score {:.2})",
                    reading.id, reading.value, med, score
                );
                report.rejected.push(Rejection {
                    reading,
                    reason: RejectReason::StatisticalOutlier { score },
                });
            } else {
                report.accepted.push(reading);
            }
        }

        Ok(report)
    }
}

/// Filter with the default configuration and return the surviving readings.
pub fn filter_anomalies(readings: &[SensorReading]) -> Result<Vec<SensorReading>> {
    Ok(AnomalyFilter::default().filter(readings)?.accepted)
}
