//! SMS alert composition and dispatch with cooldown
//!
//! Messages follow a fixed single-SMS layout:
//!
//! ```text
//! DST:14:05 HIGH RISK SEC-3-7 (30.12,78.45). Evac:Z31. Info:CODE4
//! ```
//!
//! The zone list is the only free-text field and is truncated first when the
//! message would exceed the limit. If the fixed part alone is too long the
//! message is cut at the limit.

use super::cluster::AlertCluster;
use crate::core_types::Vec2;
use crate::error::{Error, Result};
use crate::grid::GridCoords;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Single SMS segment length
pub const SMS_MAX_CHARS: usize = 160;

const TRUNCATION_MARK: &str = "..";

/// Alerting rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Risk level counted as high risk in summaries and metrics
    pub primary_threshold: f32,
    /// Risk level for cells that can form an alert cluster
    pub secondary_threshold: f32,
    /// Smallest cluster (cells) that raises an alert
    pub min_cluster_size: usize,
    /// Quiet period after a sent alert (seconds)
    pub cooldown_seconds: i64,
    /// Prefix identifying the issuing district
    pub district_code: String,
    pub max_message_chars: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            primary_threshold: 0.8,
            secondary_threshold: 0.6,
            min_cluster_size: 10,
            cooldown_seconds: 3600,
            district_code: "DST".to_string(),
            max_message_chars: SMS_MAX_CHARS,
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("alert.primary_threshold", self.primary_threshold),
            ("alert.secondary_threshold", self.secondary_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::invalid_parameter(name, value, "must be in [0, 1]"));
            }
        }
        if self.min_cluster_size == 0 {
            return Err(Error::invalid_parameter(
                "alert.min_cluster_size",
                self.min_cluster_size,
                "must be at least 1",
            ));
        }
        if self.cooldown_seconds < 0 {
            return Err(Error::invalid_parameter(
                "alert.cooldown_seconds",
                self.cooldown_seconds,
                "must be non-negative",
            ));
        }
        if self.max_message_chars == 0 || self.max_message_chars > SMS_MAX_CHARS {
            return Err(Error::invalid_parameter(
                "alert.max_message_chars",
                self.max_message_chars,
                format!("must be in [1, {SMS_MAX_CHARS}]"),
            ));
        }
        Ok(())
    }
}

/// Builds length-limited alert texts
#[derive(Debug, Clone)]
pub struct SmsComposer {
    district_code: String,
    max_chars: usize,
}

impl Default for SmsComposer {
    fn default() -> Self {
        Self::new("DST", SMS_MAX_CHARS)
    }
}

impl SmsComposer {
    #[must_use]
    pub fn new(district_code: impl Into<String>, max_chars: usize) -> Self {
        Self {
            district_code: district_code.into(),
            max_chars: max_chars.min(SMS_MAX_CHARS),
        }
    }

    /// Default evacuation zones for a cluster: its centroid row.
    #[must_use]
    pub fn default_zones(cluster: &AlertCluster) -> Vec<String> {
        vec![format!("Z{}", cluster.centroid.0)]
    }

    /// Sector id from the centroid cell, in blocks of 10x10 cells.
    #[must_use]
    pub fn sector_id(cluster: &AlertCluster) -> String {
        let (row, col) = cluster.centroid;
        format!("SEC-{}-{}", row / 10, col / 10)
    }

    /// Compose the message for a cluster located at `location` (x = lon, y = lat).
    #[must_use]
    pub fn compose(
        &self,
        cluster: &AlertCluster,
        location: Vec2,
        zones: &[String],
        timestamp: DateTime<Utc>,
    ) -> String {
        let head = format!(
            "{}:{} HIGH RISK {} ({:.2},{:.2}). Evac:",
            self.district_code,
            timestamp.format("%H:%M"),
            Self::sector_id(cluster),
            location.y,
            location.x,
        );
        let tail = format!(". Info:CODE{}", cluster.label);
        let zones = zones.join(",");

        let fixed_len = head.chars().count() + tail.chars().count();
        let zones_len = zones.chars().count();
        if fixed_len + zones_len <= self.max_chars {
            return format!("{head}{zones}{tail}");
        }

        let available = self.max_chars.saturating_sub(fixed_len);
        if available >= TRUNCATION_MARK.len() {
            let kept: String = zones
                .chars()
                .take(available - TRUNCATION_MARK.len())
                .collect();
            return format!("{head}{kept}{TRUNCATION_MARK}{tail}");
        }

        format!("{head}{tail}").chars().take(self.max_chars).collect()
    }
}

/// Compose the standard alert for a cluster with default district and zones.
pub fn format_alert_message(
    cluster: &AlertCluster,
    coords: &GridCoords,
    timestamp: DateTime<Utc>,
) -> Result<String> {
    let (width, height) = coords.dimensions();
    let (row, col) = cluster.centroid;
    if row >= height || col >= width {
        return Err(Error::invalid_parameter(
            "cluster.centroid",
            format!("({row}, {col})"),
            format!("outside {width}x{height} grid"),
        ));
    }
    let composer = SmsComposer::default();
    Ok(composer.compose(
        cluster,
        coords.at(col, row),
        &SmsComposer::default_zones(cluster),
        timestamp,
    ))
}

/// A message handed to the SMS gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlertOutcome {
    /// No qualifying cluster
    Clear,
    /// Messages sent this cycle, one per cluster
    Sent(Vec<String>),
    /// Clusters qualified but the cooldown is still running
    Suppressed { clusters: usize, remaining_seconds: i64 },
}

impl AlertOutcome {
    /// Messages went out this cycle
    #[must_use]
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Sent(_))
    }
}

/// Cooldown timer and outbox
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    config: AlertConfig,
    composer: SmsComposer,
    last_sent: Option<DateTime<Utc>>,
    outbox: Vec<OutboxEntry>,
}

impl AlertDispatcher {
    pub fn new(config: AlertConfig) -> Result<Self> {
        config.validate()?;
        let composer = SmsComposer::new(config.district_code.clone(), config.max_message_chars);
        Ok(Self {
            config,
            composer,
            last_sent: None,
            outbox: Vec::new(),
        })
    }

    /// Send one message per cluster unless the cooldown is active.
    ///
    /// Clusters are expected to be already size-filtered. The cooldown starts
    /// at the timestamp of the last cycle that sent messages.
    pub fn dispatch(
        &mut self,
        clusters: &[AlertCluster],
        coords: &GridCoords,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome> {
        if clusters.is_empty() {
            return Ok(AlertOutcome::Clear);
        }

        if let Some(last) = self.last_sent {
            let elapsed = (now - last).num_seconds();
            if elapsed < self.config.cooldown_seconds {
                let remaining_seconds = (self.config.cooldown_seconds - elapsed)
                    .min(self.config.cooldown_seconds);
                warn!(
                    "Alert suppressed: {} cluster(s), cooldown {}s remaining",
                    clusters.len(),
                    remaining_seconds
                );
                return Ok(AlertOutcome::Suppressed {
                    clusters: clusters.len(),
                    remaining_seconds,
                });
            }
        }

        let (width, height) = coords.dimensions();
        let mut messages = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            let (row, col) = cluster.centroid;
            if row >= height || col >= width {
                return Err(Error::invalid_parameter(
                    "cluster.centroid",
                    format!("({row}, {col})"),
                    format!("outside {width}x{height} grid"),
                ));
            }
            let message = self.composer.compose(
                cluster,
                coords.at(col, row),
                &SmsComposer::default_zones(cluster),
                now,
            );
            info!("SMS alert: {}", message);
            messages.push(message);
        }

        self.outbox.extend(messages.iter().map(|message| OutboxEntry {
            timestamp: now,
            message: message.clone(),
        }));
        self.last_sent = Some(now);
        Ok(AlertOutcome::Sent(messages))
    }

    #[must_use]
    pub fn outbox(&self) -> &[OutboxEntry] {
        &self.outbox
    }

    /// Hand the pending messages to the caller and clear the outbox.
    pub fn drain_outbox(&mut self) -> Vec<OutboxEntry> {
        std::mem::take(&mut self.outbox)
    }

    #[must_use]
    pub fn last_sent(&self) -> Option<DateTime<Utc>> {
        self.last_sent
    }

    #[must_use]
    pub fn config(&self) -> &AlertConfig {
        &self.config
    }
}
