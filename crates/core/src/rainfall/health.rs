//! Spatial consistency check for rain sensors
//!
//! A sensor is compared with the median of its nearest neighbours. The
//! neighbours' own MAD sets the scale, so a gauge is only flagged when it
//! disagrees with a locally coherent neighbourhood.

use super::anomaly::median;
use crate::core_types::{SensorReading, SensorStatus};
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Health monitor settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Deviation (in neighbour MADs) above which a sensor is suspect
    pub deviation_threshold: f32,
    /// Neighbours consulted per sensor
    pub neighbours: usize,
    /// Added to the neighbour MAD before dividing
    pub scale_epsilon: f32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            deviation_threshold: 3.0,
            neighbours: 3,
            scale_epsilon: 1e-6,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.deviation_threshold.is_nan() || self.deviation_threshold <= 0.0 {
            return Err(Error::invalid_parameter(
                "health.deviation_threshold",
                self.deviation_threshold,
                "must be positive",
            ));
        }
        if self.neighbours == 0 {
            return Err(Error::invalid_parameter(
                "health.neighbours",
                self.neighbours,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SensorHealthMonitor {
    config: HealthConfig,
}

impl SensorHealthMonitor {
    pub fn new(config: HealthConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Classify every reading.
    ///
    /// `prior` carries statuses from earlier cycles. Only a `Fail` there is
    /// kept; every other sensor is re-evaluated from `Ok` on each call, so a
    /// gauge flagged `Suspect` once recovers as soon as it agrees with its
    /// neighbours again. Fewer than three readings flag nothing.
    #[must_use]
    pub fn check(
        &self,
        readings: &[SensorReading],
        prior: &FxHashMap<String, SensorStatus>,
    ) -> FxHashMap<String, SensorStatus> {
        let mut statuses: FxHashMap<String, SensorStatus> = readings
            .iter()
            .map(|r| {
                let status = match prior.get(&r.id) {
                    Some(SensorStatus::Fail) => SensorStatus::Fail,
                    _ => SensorStatus::Ok,
                };
                (r.id.clone(), status)
            })
            .collect();
        if readings.len() < 3 {
            return statuses;
        }

        let k = self.config.neighbours.min(readings.len() - 1);
        for (i, reading) in readings.iter().enumerate() {
            if statuses.get(&reading.id) == Some(&SensorStatus::Fail) {
                continue;
            }

            let mut by_distance: Vec<(f32, f32)> = readings
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, other)| ((other.location - reading.location).norm_squared(), other.value))
                .collect();
            by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut neighbour_values: Vec<f32> =
                by_distance.iter().take(k).map(|&(_, v)| v).collect();
            let prediction = median(&mut neighbour_values);
            let mut deviations: Vec<f32> = neighbour_values
                .iter()
                .map(|v| (v - prediction).abs())
                .collect();
            let scale = median(&mut deviations) + self.config.scale_epsilon;
            let score = (reading.value - prediction).abs() / scale;

            if score > self.config.deviation_threshold {
                warn!(
                    "Sensor {} suspect: {} vs neighbour median {} (score {:.1})",
                    reading.id, reading.value, prediction, score
                );
                statuses.insert(reading.id.clone(), SensorStatus::Suspect);
            }
        }
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec2;
    use chrono::Utc;

    fn reading(id: &str, x: f32, value: f32) -> SensorReading {
        SensorReading::new(id, Vec2::new(x, 0.0), value, Utc::now())
    }

    #[test]
    fn test_inconsistent_sensor_flagged() {
        let readings = vec![
            reading("A", 0.0, 10.0),
            reading("B", 1.0, 11.0),
            reading("C", 2.0, 10.5),
            reading("D", 3.0, 90.0),
            reading("E", 4.0, 10.2),
        ];
        let statuses = SensorHealthMonitor::default().check(&readings, &FxHashMap::default());
        assert_eq!(statuses["D"], SensorStatus::Suspect);
        assert_eq!(statuses["A"], SensorStatus::Ok);
        assert_eq!(statuses["E"], SensorStatus::Ok);
    }

    #[test]
    fn test_failed_sensor_kept() {
        let readings = vec![
            reading("A", 0.0, 10.0),
            reading("B", 1.0, 10.0),
            reading("C", 2.0, 10.0),
        ];
        let mut prior = FxHashMap::default();
        prior.insert("B".to_string(), SensorStatus::Fail);
        let statuses = SensorHealthMonitor::default().check(&readings, &prior);
        assert_eq!(statuses["B"], SensorStatus::Fail);
        assert_eq!(statuses["A"], SensorStatus::Ok);
    }

    #[test]
    fn test_suspect_recovers_when_consistent() {
        let monitor = SensorHealthMonitor::default();
        let spiking = vec![
            reading("A", 0.0, 10.0),
            reading("B", 1.0, 10.0),
            reading("C", 2.0, 200.0),
            reading("D", 3.0, 10.0),
            reading("E", 4.0, 10.0),
        ];
        let first = monitor.check(&spiking, &FxHashMap::default());
        assert_eq!(first["C"], SensorStatus::Suspect);

        let mut steady = spiking.clone();
        steady[2].value = 10.0;
        let second = monitor.check(&steady, &first);
        assert!(second.values().all(|s| *s == SensorStatus::Ok));
    }

    #[test]
    fn test_too_few_sensors_unchanged() {
        let readings = vec![reading("A", 0.0, 1.0), reading("B", 1.0, 400.0)];
        let statuses = SensorHealthMonitor::default().check(&readings, &FxHashMap::default());
        assert!(statuses.values().all(|s| *s == SensorStatus::Ok));
    }
}
