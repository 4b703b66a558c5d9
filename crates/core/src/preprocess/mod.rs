//! Static per-session preprocessing of terrain and soil inputs

pub mod soil;

pub use soil::{
    estimate_soil_parameters, ResolvedSoil, SoilConfig, SoilParameters, TextureFields,
};
