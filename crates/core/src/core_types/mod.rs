//! Core value types shared across the pipeline

pub mod sensor;

use nalgebra::Vector2;

/// 2D location (x/y meters or lon/lat degrees)
pub type Vec2 = Vector2<f32>;

pub use sensor::{SensorFeed, SensorReading, SensorStatus, SourceType};
