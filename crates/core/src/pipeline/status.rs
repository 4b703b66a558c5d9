//! Per-cycle status record handed to dashboards and loggers

use crate::risk::{AlertOutcome, RiskSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Compact, serialisable summary of one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStatus {
    pub timestamp: DateTime<Utc>,
    pub max_risk: f32,
    /// Sensors that passed screening and were fused
    pub active_sensors: usize,
    /// Messages were sent this cycle
    pub alert: bool,
    /// An alert condition was held back by the cooldown
    pub suppressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub latency_ms: f64,
}

impl CycleStatus {
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        summary: &RiskSummary,
        active_sensors: usize,
        outcome: &AlertOutcome,
        latency: Duration,
    ) -> Self {
        let (alert, suppressed, last_message) = match outcome {
            AlertOutcome::Clear => (false, false, None),
            AlertOutcome::Sent(messages) => (true, false, messages.last().cloned()),
            AlertOutcome::Suppressed { .. } => (false, true, None),
        };
        Self {
            timestamp,
            max_risk: summary.max_risk,
            active_sensors,
            alert,
            suppressed,
            last_message,
            latency_ms: latency.as_secs_f64() * 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RiskSummary {
        RiskSummary {
            max_risk: 0.93,
            mean_risk: 0.4,
            high_risk_cells: 12,
            critical_cells: 9,
            min_fos: 0.7,
        }
    }

    #[test]
    fn test_flags_from_outcome() {
        let now = Utc::now();
        let sent = CycleStatus::new(
            now,
            &summary(),
            3,
            &AlertOutcome::Sent(vec!["a".into(), "b".into()]),
            Duration::from_millis(12),
        );
        assert!(sent.alert && !sent.suppressed);
        assert_eq!(sent.last_message.as_deref(), Some("b"));

        let held = CycleStatus::new(
            now,
            &summary(),
            3,
            &AlertOutcome::Suppressed {
                clusters: 1,
                remaining_seconds: 60,
            },
            Duration::ZERO,
        );
        assert!(!held.alert && held.suppressed);
    }

    #[test]
    fn test_json_field_names() {
        let status = CycleStatus::new(
            Utc::now(),
            &summary(),
            2,
            &AlertOutcome::Clear,
            Duration::from_millis(5),
        );
        let json = serde_json::to_value(&status).unwrap();
        for key in ["timestamp", "max_risk", "active_sensors", "alert", "latency_ms"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("last_message").is_none());
    }
}
