//! Shared per-tile road cache.
//!
//! # Model
//!
//! The cache keeps one bucket per tile (at a fixed zoom).  A bucket holds every
//! loaded road with at least one point in that tile, keyed by road id.  A tile
//! is *indexed* once all subsections intersecting it have been loaded.  Loading
//! a subsection registers each of its roads into the bucket of every tile the
//! road touches, so a road spanning tiles is shared (one `Arc`) by all of them.
//!
//! The invariant that keeps reloads cheap: if a subsection is marked loaded,
//! every one of its roads is present in the bucket of every tile it touches.
//! Evicting a bucket therefore un-marks every subsection that contributed to
//! it, and a later load of any tile needing that subsection re-reads it.
//!
//! # Concurrency
//!
//! Reads (`roads_touching`, `is_indexed`, `estimated_footprint`) take a shared
//! lock; loading and eviction take the exclusive lock.  Recency is tracked with
//! per-bucket atomics so readers can touch buckets without upgrading.  Roads
//! handed out are `Arc`s: eviction only drops the cache's references, never a
//! road a running search still holds.
//!
//! # Footprint
//!
//! Accounting is per bucket (`TILE_OVERHEAD_BYTES` + the estimated size of each
//! road in it), so a road in three tiles is counted three times.  That
//! overestimates slightly and makes eviction exact: removing a bucket frees
//! precisely what it was charged.

use std::collections::BTreeMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use nav_core::{Area31, DEFAULT_TILE_ZOOM, Road, RoadId, SubsectionId, TileId};

use crate::error::GraphResult;
use crate::reader::{BorderSample, GraphReader};

/// Fixed charge for an empty bucket.
pub const TILE_OVERHEAD_BYTES: usize = 1_000;

/// Before loading, a cache above this share of its limit evicts down to
/// [`EVICT_TARGET_RATIO`].
const EVICT_TRIGGER_RATIO: f64 = 0.9;
const EVICT_TARGET_RATIO: f64 = 0.7;

// ── Configuration & statistics ────────────────────────────────────────────────

/// Cache construction parameters.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileCacheConfig {
    /// Zoom of cached tiles.  Higher zoom means smaller tiles.
    pub zoom:               u32,
    /// Soft limit; loading a tile above 90 % of it evicts down to 70 %.
    pub memory_limit_bytes: usize,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            zoom:               DEFAULT_TILE_ZOOM,
            memory_limit_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Cumulative load/evict counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheStats {
    /// Times a tile became indexed (reloads included).
    pub loaded_tiles:        u64,
    /// Distinct tiles ever indexed.
    pub distinct_tiles:      usize,
    /// Tiles indexed again after having been evicted.
    pub reloaded_tiles:      u64,
    pub evicted_tiles:       u64,
    pub subsection_loads:    u64,
    pub resident_tiles:      usize,
    pub peak_resident_tiles: usize,
}

// ── Internal state ────────────────────────────────────────────────────────────

struct TileBucket {
    roads:       BTreeMap<RoadId, Arc<Road>>,
    /// Subsections that registered at least one road here.
    sources:     FxHashSet<SubsectionId>,
    bytes:       usize,
    indexed:     bool,
    last_access: AtomicU64,
}

impl TileBucket {
    fn new(now: u64) -> Self {
        Self {
            roads:       BTreeMap::new(),
            sources:     FxHashSet::default(),
            bytes:       TILE_OVERHEAD_BYTES,
            indexed:     false,
            last_access: AtomicU64::new(now),
        }
    }
}

#[derive(Default)]
struct CacheState {
    tiles:     FxHashMap<TileId, TileBucket>,
    loaded:    FxHashSet<SubsectionId>,
    footprint: usize,
    seen:      FxHashSet<TileId>,
    evicted:   FxHashSet<TileId>,
    stats:     CacheStats,
}

// ── RoadGraphTileCache ────────────────────────────────────────────────────────

/// Tile-indexed road cache shared by every search over the same reader.
pub struct RoadGraphTileCache {
    reader: Arc<dyn GraphReader>,
    config: TileCacheConfig,
    state:  RwLock<CacheState>,
    clock:  AtomicU64,
}

impl RoadGraphTileCache {
    pub fn new(reader: Arc<dyn GraphReader>, config: TileCacheConfig) -> Self {
        Self {
            reader,
            config,
            state: RwLock::new(CacheState::default()),
            clock: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn zoom(&self) -> u32 {
        self.config.zoom
    }

    pub fn config(&self) -> &TileCacheConfig {
        &self.config
    }

    /// Estimated bytes of one bucket holding no roads.
    pub fn tile_overhead(&self) -> usize {
        TILE_OVERHEAD_BYTES
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// `true` once every subsection intersecting `tile` has been loaded.
    pub fn is_indexed(&self, tile: TileId) -> bool {
        self.state.read().tiles.get(&tile).is_some_and(|b| b.indexed)
    }

    /// Loaded roads with at least one point in `tile`, ordered by road id.
    /// Empty if nothing touching `tile` has been loaded yet.
    pub fn roads_touching(&self, tile: TileId) -> Vec<Arc<Road>> {
        let state = self.state.read();
        match state.tiles.get(&tile) {
            Some(bucket) => {
                bucket.last_access.store(self.tick(), Ordering::Relaxed);
                bucket.roads.values().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub fn estimated_footprint(&self) -> usize {
        self.state.read().footprint
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            distinct_tiles: state.seen.len(),
            resident_tiles: state.tiles.len(),
            ..state.stats.clone()
        }
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    /// Load every subsection intersecting `tile` that is not already loaded,
    /// then mark the tile indexed.  No-op for an indexed tile.
    ///
    /// # Errors
    ///
    /// Propagates the first reader failure.  The tile stays unindexed, so a
    /// later call retries.
    pub fn ensure_loaded(&self, tile: TileId) -> GraphResult<()> {
        if self.is_indexed(tile) {
            return Ok(());
        }

        let mut guard = self.state.write();
        let state = &mut *guard;
        if state.tiles.get(&tile).is_some_and(|b| b.indexed) {
            return Ok(());
        }

        let limit = self.config.memory_limit_bytes;
        if state.footprint as f64 > limit as f64 * EVICT_TRIGGER_RATIO {
            let target = (limit as f64 * EVICT_TARGET_RATIO) as usize;
            self.evict_locked(state, target, Some(tile));
        }

        let area = tile.area(self.zoom());
        for subsection in self.reader.subsections_in(&area)? {
            if state.loaded.contains(&subsection) {
                continue;
            }
            let roads = self.reader.load_subsection(subsection)?;
            state.stats.subsection_loads += 1;
            for road in roads {
                self.register_locked(state, Arc::new(road), subsection);
            }
            state.loaded.insert(subsection);
        }

        let now = self.tick();
        let bucket = match state.tiles.entry(tile) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                state.footprint += TILE_OVERHEAD_BYTES;
                v.insert(TileBucket::new(now))
            }
        };
        bucket.indexed = true;
        bucket.last_access.store(now, Ordering::Relaxed);

        state.stats.loaded_tiles += 1;
        if state.evicted.contains(&tile) {
            state.stats.reloaded_tiles += 1;
        }
        state.seen.insert(tile);
        state.stats.peak_resident_tiles = state.stats.peak_resident_tiles.max(state.tiles.len());

        debug!(
            tile = tile.0,
            resident = state.tiles.len(),
            footprint = state.footprint,
            "tile indexed"
        );
        Ok(())
    }

    /// Insert `road` into the bucket of every tile its points touch.
    /// Buckets already holding a road with the same id keep their copy.
    pub fn register_loaded_road(&self, road: Arc<Road>) {
        let mut guard = self.state.write();
        let source = road.subsection();
        self.register_locked(&mut guard, road, source);
    }

    fn register_locked(&self, state: &mut CacheState, road: Arc<Road>, source: SubsectionId) {
        let size = road.estimated_size_bytes();
        for tile in road.tiles(self.zoom()) {
            let now = self.tick();
            let bucket = match state.tiles.entry(tile) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => {
                    state.footprint += TILE_OVERHEAD_BYTES;
                    v.insert(TileBucket::new(now))
                }
            };
            if !bucket.roads.contains_key(&road.id()) {
                bucket.roads.insert(road.id(), Arc::clone(&road));
                bucket.bytes += size;
                state.footprint += size;
            }
            bucket.sources.insert(source);
        }
    }

    /// Drop least-recently-used buckets until the footprint is at most
    /// `limit`.  Returns the number of buckets dropped.
    pub fn evict_until_below(&self, limit: usize) -> usize {
        let mut guard = self.state.write();
        self.evict_locked(&mut guard, limit, None)
    }

    fn evict_locked(&self, state: &mut CacheState, limit: usize, keep: Option<TileId>) -> usize {
        if state.footprint <= limit {
            return 0;
        }
        let mut order: Vec<(u64, TileId)> = state
            .tiles
            .iter()
            .map(|(&id, b)| (b.last_access.load(Ordering::Relaxed), id))
            .collect();
        order.sort_unstable();

        let mut evicted = 0;
        for (_, id) in order {
            if state.footprint <= limit {
                break;
            }
            if Some(id) == keep {
                continue;
            }
            if let Some(bucket) = state.tiles.remove(&id) {
                state.footprint -= bucket.bytes;
                for source in &bucket.sources {
                    state.loaded.remove(source);
                }
                state.evicted.insert(id);
                evicted += 1;
            }
        }
        state.stats.evicted_tiles += evicted as u64;
        if evicted > 0 {
            debug!(evicted, footprint = state.footprint, limit, "tiles evicted");
        }
        evicted
    }

    // ── Border samples ───────────────────────────────────────────────────

    /// Border samples inside `area`, read straight from the reader (never
    /// cached; the border table is built once per search).
    pub fn border_samples(&self, area: &Area31) -> GraphResult<Vec<BorderSample>> {
        let mut out = Vec::new();
        for subsection in self.reader.subsections_in(area)? {
            out.extend(self.reader.load_border_points(subsection, area)?);
        }
        Ok(out)
    }
}
