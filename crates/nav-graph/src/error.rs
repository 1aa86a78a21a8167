//! Graph-subsystem error type.

use thiserror::Error;

use nav_core::{CoreError, SubsectionId};

/// Errors produced by `nav-graph` and by [`crate::GraphReader`] implementations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to read {subsection}: {message}")]
    Reader { subsection: SubsectionId, message: String },

    #[error("invalid road data: {0}")]
    Road(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "osm")]
    #[error("OSM parse error: {0}")]
    Osm(String),
}

pub type GraphResult<T> = Result<T, GraphError>;
