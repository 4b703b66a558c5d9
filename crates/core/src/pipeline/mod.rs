//! Per-cycle early-warning pipeline

pub mod engine;
pub mod status;

pub use engine::{BackgroundRain, CycleInput, CycleReport, EarlyWarningEngine};
pub use status::CycleStatus;
