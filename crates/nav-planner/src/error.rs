use thiserror::Error;

use nav_core::CoreError;
use nav_graph::GraphError;

use crate::assemble::Route;

/// Why a route could not be produced.
///
/// The first nine variants are the failure reasons callers branch on; the
/// remaining ones reject malformed requests before any search starts.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("start point is not near any usable road")]
    StartPointNotFound,

    #[error("end point is not near any usable road")]
    EndPointNotFound,

    #[error("intermediate point {index} is not near any usable road")]
    IntermediatePointNotFound { index: usize },

    #[error("no route leaves the start point")]
    NoRouteFromStart,

    #[error("no route reaches the target point")]
    NoRouteToTarget,

    #[error("search exceeded its memory limit of {limit} bytes")]
    MemoryLimitExceeded { limit: usize },

    #[error("route calculation was aborted")]
    Aborted,

    #[error("route could not be assembled: {0}")]
    RouteNotCalculated(String),

    #[error("road graph could not be loaded: {0}")]
    GraphLoadError(#[from] GraphError),

    #[error("a route needs at least two waypoints, got {0}")]
    TooFewWaypoints(usize),

    #[error("invalid waypoint: {0}")]
    InvalidWaypoint(#[from] CoreError),

    #[error("invalid routing configuration: {0}")]
    Config(String),
}

/// Convenience alias used throughout `nav-planner`.
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Outcome of [`RoutePlanner::calculate_route`][crate::RoutePlanner::calculate_route].
pub type RouteCalculationResult = RoutingResult<Route>;
