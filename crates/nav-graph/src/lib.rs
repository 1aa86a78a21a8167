//! `nav-graph` — the road graph as the planner sees it: paged in per tile.
//!
//! # Crate layout
//!
//! | Module     | Contents                                                        |
//! |------------|-----------------------------------------------------------------|
//! | [`reader`] | `GraphReader` trait, `BorderSample`, `MemoryReader` (R-tree)    |
//! | [`cache`]  | `RoadGraphTileCache`, `TileCacheConfig`, `CacheStats`           |
//! | [`loader`] | `SpatialSegmentLoader`, `Candidate`, `RoadPointMatch`, `RoadFilter` |
//! | [`osm`]    | `load_from_pbf` (feature = `"osm"` only)                        |
//! | [`error`]  | `GraphError`, `GraphResult<T>`                                  |
//!
//! # Data flow
//!
//! ```text
//! GraphReader ──subsections──▶ RoadGraphTileCache ──roads per tile──▶ SpatialSegmentLoader
//!   (external)                  (shared, RwLock)                       (one per search)
//! ```
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `osm`   | Enables building a `MemoryReader` from OSM PBF via `osmpbf`. |
//! | `serde` | Derives `Serialize`/`Deserialize` on public value types.     |

pub mod cache;
pub mod error;
pub mod loader;
pub mod reader;

#[cfg(feature = "osm")]
pub mod osm;


pub use cache::{CacheStats, RoadGraphTileCache, TileCacheConfig};
pub use error::{GraphError, GraphResult};
pub use loader::{AcceptAll, Candidate, RoadFilter, RoadPointMatch, SpatialSegmentLoader};
pub use reader::{BorderSample, GraphReader, MemoryReader, MemoryReaderBuilder};
