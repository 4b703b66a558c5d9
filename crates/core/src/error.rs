//! Error types for the early-warning core
//!
//! Only input validation failures surface as errors. Numerical degeneracies
//! (coincident sensor/cell locations, zero MAD, flat terrain, zero rainfall
//! volume) are handled in place with epsilon floors, and anomalous sensor
//! readings are filtered rather than reported here.

use thiserror::Error;

/// Main error type for early-warning operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(
        "grid size mismatch for {field}: expected {expected_width}x{expected_height}, got {width}x{height}"
    )]
    ShapeMismatch {
        field: &'static str,
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error("empty grid: {0}")]
    EmptyGrid(&'static str),

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("degenerate soil texture at cell {cell}: clay + sand + silt must be positive")]
    DegenerateTexture { cell: usize },

    #[error("malformed sensor record '{id}': {reason}")]
    MalformedReading { id: String, reason: String },
}

impl Error {
    /// Build an `InvalidParameter` error from any displayable value.
    pub fn invalid_parameter(
        name: &'static str,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for early-warning operations
pub type Result<T> = std::result::Result<T, Error>;
