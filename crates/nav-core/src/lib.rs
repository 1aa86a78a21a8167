//! `nav-core` — foundational types for the `nav` routing engine.
//!
//! This crate is a dependency of every other `nav-*` crate.  It has no
//! `nav-*` dependencies and only one external one (`thiserror`, plus optional
//! `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                                    |
//! |-----------|-------------------------------------------------------------|
//! | [`ids`]   | `RoadId`, `TileId`, `SubsectionId`                          |
//! | [`geo`]   | `GeoPoint`, `Point31`, `Area31`, angle helpers              |
//! | [`tile`]  | Tile arithmetic on the 31-bit grid                          |
//! | [`road`]  | `Road`, `RoadBuilder`, direction/restriction/class enums    |
//! | [`error`] | `CoreError`, `CoreResult`                                   |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public value types.  |

pub mod error;
pub mod geo;
pub mod ids;
pub mod road;
pub mod tile;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::{Area31, GeoPoint, Point31, normalize_angle};
pub use ids::{RoadId, SubsectionId, TileId};
pub use road::{PointTag, RestrictionKind, Road, RoadBuilder, RoadClass, RoadDirection};
pub use tile::DEFAULT_TILE_ZOOM;
