//! Grid storage, terrain derivatives and cell coordinates

pub mod coords;
pub mod field;
pub mod param;
pub mod terrain;

pub use coords::GridCoords;
pub use field::FieldData;
pub use param::CellParam;
pub use terrain::{compute_curvature, compute_slope, TerrainGrid};
