//! Landslide Early-Warning Core Library
//!
//! Computational core of a rainfall-triggered shallow landslide early-warning
//! system. Each inference cycle turns rain observations into a per-cell
//! failure probability and, when a large enough region is at risk, into
//! length-limited SMS alerts.
//!
//! ## Cycle
//!
//! - Sensor screening: physical bounds, modified Z-score outliers and a
//!   spatial consistency check
//! - Rainfall estimation: terrain-aware downscaling of coarse products,
//!   inverse-distance sensor fusion and a per-cell scalar Kalman filter
//! - Slope stability: infinite-slope factor of safety with a simplified
//!   Green-Ampt wetting front and antecedent saturation
//! - Risk and alerting: logistic FoS-to-risk mapping, 4-connected cluster
//!   detection and SMS dispatch with a cooldown
//!
//! All per-cell passes run in parallel with rayon. State that persists
//! between cycles lives in an explicitly owned [`EarlyWarningEngine`].

pub mod backtest;
pub mod config;
pub mod core_types;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod preprocess;
pub mod rainfall;
pub mod risk;
pub mod stability;

// Re-export core types
pub use config::{CycleConfig, EwsConfig};
pub use core_types::{SensorFeed, SensorReading, SensorStatus, SourceType, Vec2};
pub use error::{Error, Result};
pub use grid::{CellParam, FieldData, GridCoords, TerrainGrid};

// Re-export the public operations
pub use backtest::{alert_lead_time_hours, compute_metrics, BacktestMetrics};
pub use preprocess::{estimate_soil_parameters, SoilConfig, SoilParameters, TextureFields};
pub use rainfall::{downscale_rainfall, filter_anomalies, fuse_idw, kalman_update, DownscaleMode};
pub use risk::{
    find_alert_clusters, format_alert_message, fos_to_risk, AlertCluster, AlertOutcome, RiskCurve,
};
pub use stability::compute_fos;

// Re-export the pipeline
pub use pipeline::{BackgroundRain, CycleInput, CycleReport, CycleStatus, EarlyWarningEngine};
