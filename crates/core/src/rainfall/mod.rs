//! Rainfall estimation: downscaling, sensor screening and fusion

pub mod anomaly;
pub mod downscale;
pub mod health;
pub mod idw;
pub mod kalman;

pub use anomaly::{
    filter_anomalies, AnomalyFilter, AnomalyFilterConfig, FilterReport, RejectReason, Rejection,
};
pub use downscale::{
    downscale_rainfall, resample_bilinear, DownscaleConfig, DownscaleMode, RainfallDownscaler,
};
pub use health::{HealthConfig, SensorHealthMonitor};
pub use idw::{apply_orographic_correction, fuse_idw, IdwConfig, IdwFuser, OrographicCorrection};
pub use kalman::{kalman_update, KalmanConfig, KalmanFuser};
