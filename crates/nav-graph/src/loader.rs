//! Candidate lookup and waypoint snapping on top of the tile cache.
//!
//! A [`SpatialSegmentLoader`] lives for one route calculation.  Besides
//! answering "which roads pass through this exact coordinate", it owns the
//! calculation's *overlay*: private copies of roads into which snapped
//! waypoints have been inserted as extra points.  Overlay copies shadow the
//! cached road with the same id for the rest of the calculation, so every node
//! the search creates on such a road uses one consistent point numbering.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::trace;

use nav_core::{Point31, Road, RoadId, TileId};

use crate::cache::RoadGraphTileCache;
use crate::error::GraphResult;

/// Zoom levels tried in turn when snapping, finest first.
const SNAP_ZOOMS: [u32; 2] = [17, 15];

// ── Filter seam ───────────────────────────────────────────────────────────────

/// Decides which loaded roads a calculation may use.  Routing profiles
/// implement this; roads it rejects are invisible to snapping and expansion.
pub trait RoadFilter {
    fn accepts(&self, road: &Road) -> bool;
}

/// Filter that accepts every road.
#[derive(Copy, Clone, Debug, Default)]
pub struct AcceptAll;

impl RoadFilter for AcceptAll {
    #[inline]
    fn accepts(&self, _road: &Road) -> bool {
        true
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// One road passing through a queried coordinate, at a specific point index.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub road:        Arc<Road>,
    pub point_index: u32,
}

impl Candidate {
    #[inline]
    pub fn road_id(&self) -> RoadId {
        self.road.id()
    }
}

/// Nearest point on any accepted road to a query coordinate.
#[derive(Clone, Debug)]
pub struct RoadPointMatch {
    pub road:            Arc<Road>,
    /// The projection lies on the segment `segment_end - 1 → segment_end`.
    pub segment_end:     u32,
    pub point:           Point31,
    pub square_distance: f64,
}

// ── SpatialSegmentLoader ──────────────────────────────────────────────────────

pub struct SpatialSegmentLoader<'a> {
    cache:   &'a RoadGraphTileCache,
    filter:  &'a dyn RoadFilter,
    overlay: BTreeMap<RoadId, Arc<Road>>,
}

impl<'a> SpatialSegmentLoader<'a> {
    pub fn new(cache: &'a RoadGraphTileCache, filter: &'a dyn RoadFilter) -> Self {
        Self { cache, filter, overlay: BTreeMap::new() }
    }

    pub fn cache(&self) -> &'a RoadGraphTileCache {
        self.cache
    }

    /// Overlay copy of `id`, if a waypoint was snapped onto it.
    pub fn overlay_road(&self, id: RoadId) -> Option<&Arc<Road>> {
        self.overlay.get(&id)
    }

    /// Every (road, index) whose coordinate equals `p`.
    ///
    /// Loads the tile containing `p` first if it is not indexed.  The result
    /// is ordered by road id, then index, and is the same for repeated calls
    /// against an unchanged cache.
    ///
    /// # Errors
    ///
    /// Reader failures while loading the tile.
    pub fn load_candidates_at(&self, p: Point31) -> GraphResult<Vec<Candidate>> {
        let tile = TileId::containing(p, self.cache.zoom());
        self.cache.ensure_loaded(tile)?;

        let mut seen: BTreeSet<(RoadId, u32)> = BTreeSet::new();
        let mut out = Vec::new();
        let mut push = |road: &Arc<Road>| {
            for index in road.indices_at(p) {
                if seen.insert((road.id(), index)) {
                    out.push(Candidate { road: Arc::clone(road), point_index: index });
                }
            }
        };

        for road in self.overlay.values() {
            if road.area().contains(p) {
                push(road);
            }
        }
        for road in self.cache.roads_touching(tile) {
            if self.overlay.contains_key(&road.id()) || !self.filter.accepts(&road) {
                continue;
            }
            push(&road);
        }

        out.sort_by_key(|c| (c.road_id(), c.point_index));
        Ok(out)
    }

    /// Accepted roads in the neighbourhood of `p`, by id.
    ///
    /// At `zoom_around` finer than the cache zoom this samples a 3×3 pattern
    /// one `zoom_around` tile apart; coarser, it covers every cache tile
    /// within one `zoom_around` tile of `p`.
    pub fn roads_around(&self, p: Point31, zoom_around: u32) -> GraphResult<Vec<Arc<Road>>> {
        let zoom = self.cache.zoom();
        let (reach, step) = if zoom_around >= zoom {
            (1i64, i64::from(TileId::side(zoom_around)))
        } else {
            (1i64 << (zoom - zoom_around), i64::from(TileId::side(zoom)))
        };

        let max = i64::from(u32::MAX >> 1);
        let mut tiles = BTreeSet::new();
        for i in -reach..=reach {
            for j in -reach..=reach {
                let x = i64::from(p.x) + i * step;
                let y = i64::from(p.y) + j * step;
                if (0..=max).contains(&x) && (0..=max).contains(&y) {
                    tiles.insert(TileId::containing(Point31::new(x as u32, y as u32), zoom));
                }
            }
        }

        let mut roads: BTreeMap<RoadId, Arc<Road>> = BTreeMap::new();
        for tile in tiles {
            self.cache.ensure_loaded(tile)?;
            for road in self.cache.roads_touching(tile) {
                if let Some(o) = self.overlay.get(&road.id()) {
                    roads.insert(road.id(), Arc::clone(o));
                } else if self.filter.accepts(&road) {
                    roads.insert(road.id(), road);
                }
            }
        }
        Ok(roads.into_values().collect())
    }

    /// Nearest projection of `p` onto an accepted road, searching a small
    /// neighbourhood first and a wider one if that finds nothing.
    pub fn find_closest_road_point(&self, p: Point31) -> GraphResult<Option<RoadPointMatch>> {
        for zoom_around in SNAP_ZOOMS {
            let roads = self.roads_around(p, zoom_around)?;
            if let Some(m) = closest_on(&roads, p) {
                trace!(road = m.road.id().0, d2 = m.square_distance, zoom_around, "snapped");
                return Ok(Some(m));
            }
        }
        Ok(None)
    }

    /// Make the matched projection a real point of its road's overlay copy
    /// (creating the copy on first use).  A projection that coincides with an
    /// existing vertex changes nothing.
    pub fn insert_snapped(&mut self, m: &RoadPointMatch) -> Arc<Road> {
        let id = m.road.id();
        let base = self.overlay.get(&id).cloned().unwrap_or_else(|| Arc::clone(&m.road));
        if base.indices_at(m.point).next().is_some() {
            self.overlay.insert(id, Arc::clone(&base));
            return base;
        }
        // Indices may have shifted since the match was taken, if another
        // waypoint landed on the same road first.
        let at = closest_on(std::slice::from_ref(&base), m.point)
            .map_or(m.segment_end, |again| again.segment_end);
        let road = Arc::new(base.with_inserted_point(at, m.point));
        self.overlay.insert(id, Arc::clone(&road));
        road
    }

    /// Resolve a previously snapped coordinate to a candidate on the current
    /// overlay (or cached) copy of `id`.
    pub fn resolve(&self, id: RoadId, p: Point31) -> Option<Candidate> {
        let road = self.overlay.get(&id)?;
        road.indices_at(p)
            .next()
            .map(|point_index| Candidate { road: Arc::clone(road), point_index })
    }
}

fn closest_on(roads: &[Arc<Road>], p: Point31) -> Option<RoadPointMatch> {
    let mut best: Option<RoadPointMatch> = None;
    for road in roads {
        for k in 1..road.point_count() {
            let proj = p.project_onto(road.point(k - 1), road.point(k));
            let d = p.square_distance(proj);
            if best.as_ref().is_none_or(|b| d < b.square_distance) {
                best = Some(RoadPointMatch {
                    road:            Arc::clone(road),
                    segment_end:     k,
                    point:           proj,
                    square_distance: d,
                });
            }
        }
    }
    best
}
