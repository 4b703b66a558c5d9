//! Slope stability: factor of safety and antecedent saturation

pub mod fos;
pub mod saturation;

pub use fos::{compute_fos, StabilityConfig, StabilityEngine};
pub use saturation::{SaturationConfig, SaturationState};
