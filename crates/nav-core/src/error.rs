//! Core error type.
//!
//! Downstream crates wrap `CoreError` as one variant of their own enums
//! (`#[from]`) rather than extending it.

use thiserror::Error;

use crate::RoadId;

/// Errors raised while constructing core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("road {id} has {points} point(s); at least 2 are required")]
    DegenerateRoad { id: RoadId, points: usize },

    #[error("road {road} tags point {index}, which is out of range")]
    TagOutOfRange { road: RoadId, index: u32 },

    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

/// Shorthand result type for `nav-core`.
pub type CoreResult<T> = Result<T, CoreError>;
