//! `nav-planner` — bidirectional A* route planning for the `nav` engine.
//!
//! # Pipeline
//!
//! ```text
//! calculate_route(waypoints)
//!   ① snap      : nearest point on a usable road, inserted into an overlay
//!   ② search    : per waypoint pair: forward from the start, reverse from
//!                 the target, until the frontiers meet
//!   ③ assemble  : join both halves into legs, merge, validate contiguity
//! ```
//!
//! | Module           | Contents                                              |
//! |------------------|-------------------------------------------------------|
//! | [`planner`]      | `RoutePlanner`, `RoutePlannerBuilder`                 |
//! | [`config`]       | `RoutingConfig`, `SearchDirection`                    |
//! | [`profile`]      | `RoutingProfile`, `ProfileParams`, `CarProfile`       |
//! | [`search`]       | `BidirectionalSearchEngine`, `Cancellation`, stats    |
//! | [`frontier`]     | Per-direction indexed heap and visited map            |
//! | [`segment`]      | Search nodes and their arena                          |
//! | [`restrictions`] | `TurnRestrictionResolver`                             |
//! | [`heuristic`]    | `HeuristicEstimator`, `BorderLineTable`               |
//! | [`assemble`]     | `Route`, `RouteLeg`, `RouteAssembler`                 |
//! | [`error`]        | `RoutingError`, `RouteCalculationResult`              |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nav_core::GeoPoint;
//! use nav_graph::{RoadGraphTileCache, TileCacheConfig};
//! use nav_planner::{CarProfile, NeverCancel, RoutePlannerBuilder};
//!
//! let cache = Arc::new(RoadGraphTileCache::new(Arc::new(reader), TileCacheConfig::default()));
//! let mut planner = RoutePlannerBuilder::new(cache, Arc::new(CarProfile::new())).build()?;
//! let route = planner.calculate_route(
//!     &[GeoPoint::new(52.52, 13.40), GeoPoint::new(52.50, 13.45)],
//!     false,
//!     &NeverCancel,
//! )?;
//! ```

pub mod assemble;
pub mod config;
pub mod error;
pub mod frontier;
pub mod heuristic;
pub mod planner;
pub mod profile;
pub mod restrictions;
pub mod search;
pub mod segment;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use assemble::{Route, RouteAssembler, RouteLeg};
pub use config::{RoutingConfig, SearchDirection, WRONG_HEADING_PENALTY_S};
pub use error::{RouteCalculationResult, RoutingError, RoutingResult};
pub use heuristic::{BorderLineTable, HeuristicEstimator};
pub use planner::{RoutePlanner, RoutePlannerBuilder};
pub use profile::{CarProfile, ProfileParams, RoutingProfile};
pub use restrictions::TurnRestrictionResolver;
pub use search::{BidirectionalSearchEngine, Cancellation, NeverCancel, RouteStatistics, SearchState};
pub use segment::{RouteCalculationSegment, RoutePointId, SearchSide, SegmentId};
