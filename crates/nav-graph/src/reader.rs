//! The reader seam and an in-memory reader.
//!
//! The on-disk map format is owned elsewhere.  The planner only needs two
//! things from it: which subsections might hold roads inside an area, and the
//! decoded roads (and optional border samples) of one subsection.
//! [`GraphReader`] is that contract; [`MemoryReader`] implements it over
//! roads held in memory, indexed by an R-tree of subsection envelopes.
//!
//! # Example
//!
//! ```
//! use nav_core::{Point31, RoadBuilder, RoadId};
//! use nav_graph::{GraphReader, MemoryReaderBuilder};
//!
//! let mut b = MemoryReaderBuilder::new(14);
//! b.add_road(
//!     RoadBuilder::new(RoadId(1))
//!         .point(Point31::new(1 << 30, 1 << 30))
//!         .point(Point31::new((1 << 30) + 500, 1 << 30))
//!         .build()
//!         .unwrap(),
//! );
//! let reader = b.build();
//! assert_eq!(reader.subsection_count(), 1);
//! ```

use std::collections::BTreeMap;

use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashSet;

use nav_core::{Area31, Point31, Road, RoadId, SubsectionId, TileId};

use crate::error::{GraphError, GraphResult};

// ── Contract ──────────────────────────────────────────────────────────────────

/// A sample point on a horizontal partition line, as stored by the map source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BorderSample {
    pub point: Point31,
    /// Road that crosses the line at `point`.
    pub road:  RoadId,
}

/// Source of road data, split into opaque subsections.
///
/// Implementations must be safe to call from several searches at once; the
/// tile cache serializes its own mutation but not reader calls made by
/// different caches.
pub trait GraphReader: Send + Sync {
    /// Subsections whose data may intersect `area`.
    fn subsections_in(&self, area: &Area31) -> GraphResult<Vec<SubsectionId>>;

    /// Decode every road of `subsection`.
    ///
    /// # Errors
    ///
    /// Malformed data must surface as an error, never as an empty list.
    fn load_subsection(&self, subsection: SubsectionId) -> GraphResult<Vec<Road>>;

    /// Border samples of `subsection` that lie in `area`.  Sources without
    /// partition data keep the default.
    fn load_border_points(
        &self,
        _subsection: SubsectionId,
        _area: &Area31,
    ) -> GraphResult<Vec<BorderSample>> {
        Ok(Vec::new())
    }
}

// ── MemoryReader ──────────────────────────────────────────────────────────────

struct Subsection {
    roads:  Vec<Road>,
    border: Vec<BorderSample>,
    broken: bool,
}

/// R-tree entry: one envelope per subsection.
struct SubsectionEntry {
    id:       SubsectionId,
    envelope: AABB<[i64; 2]>,
}

impl RTreeObject for SubsectionEntry {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn to_aabb(area: &Area31) -> AABB<[i64; 2]> {
    AABB::from_corners(
        [i64::from(area.left), i64::from(area.top)],
        [i64::from(area.right), i64::from(area.bottom)],
    )
}

/// Roads held in memory, partitioned into subsections by the tile of their
/// first point at a fixed zoom.
pub struct MemoryReader {
    subsections: Vec<Subsection>,
    index:       RTree<SubsectionEntry>,
    road_count:  usize,
}

impl MemoryReader {
    pub fn subsection_count(&self) -> usize {
        self.subsections.len()
    }

    pub fn road_count(&self) -> usize {
        self.road_count
    }

    fn get(&self, id: SubsectionId) -> GraphResult<&Subsection> {
        self.subsections.get(id.0 as usize).ok_or_else(|| GraphError::Reader {
            subsection: id,
            message:    "unknown subsection".to_string(),
        })
    }
}

impl GraphReader for MemoryReader {
    fn subsections_in(&self, area: &Area31) -> GraphResult<Vec<SubsectionId>> {
        let mut ids: Vec<SubsectionId> = self
            .index
            .locate_in_envelope_intersecting(&to_aabb(area))
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn load_subsection(&self, subsection: SubsectionId) -> GraphResult<Vec<Road>> {
        let s = self.get(subsection)?;
        if s.broken {
            return Err(GraphError::Reader {
                subsection,
                message: "corrupt road block".to_string(),
            });
        }
        Ok(s.roads.clone())
    }

    fn load_border_points(
        &self,
        subsection: SubsectionId,
        area: &Area31,
    ) -> GraphResult<Vec<BorderSample>> {
        let s = self.get(subsection)?;
        Ok(s.border.iter().filter(|b| area.contains(b.point)).copied().collect())
    }
}

// ── MemoryReaderBuilder ───────────────────────────────────────────────────────

/// Incremental builder for [`MemoryReader`].
pub struct MemoryReaderBuilder {
    zoom:     u32,
    by_tile:  BTreeMap<TileId, SubsectionId>,
    sections: Vec<(Vec<Road>, Vec<BorderSample>, Option<Area31>)>,
    broken:   FxHashSet<SubsectionId>,
}

impl MemoryReaderBuilder {
    /// `subsection_zoom` sets how coarse the partition is: one subsection per
    /// tile of that zoom.
    pub fn new(subsection_zoom: u32) -> Self {
        Self {
            zoom:     subsection_zoom.min(31),
            by_tile:  BTreeMap::new(),
            sections: Vec::new(),
            broken:   FxHashSet::default(),
        }
    }

    fn section_for(&mut self, p: Point31) -> SubsectionId {
        let tile = TileId::containing(p, self.zoom);
        if let Some(&id) = self.by_tile.get(&tile) {
            return id;
        }
        let id = SubsectionId(self.sections.len() as u32);
        self.sections.push((Vec::new(), Vec::new(), None));
        self.by_tile.insert(tile, id);
        id
    }

    fn grow(&mut self, id: SubsectionId, area: Area31) {
        let slot = &mut self.sections[id.0 as usize].2;
        *slot = Some(match *slot {
            None => area,
            Some(a) => a.including(Point31::new(area.left, area.top))
                .including(Point31::new(area.right, area.bottom)),
        });
    }

    /// Add a road; returns the subsection it was assigned to.
    pub fn add_road(&mut self, road: Road) -> SubsectionId {
        let id = self.section_for(road.point(0));
        self.grow(id, road.area());
        self.sections[id.0 as usize].0.push(road.in_subsection(id));
        id
    }

    /// Add a border sample to the subsection containing its point.
    pub fn add_border_sample(&mut self, sample: BorderSample) -> SubsectionId {
        let id = self.section_for(sample.point);
        self.grow(id, Area31::point(sample.point));
        self.sections[id.0 as usize].1.push(sample);
        id
    }

    /// Make every later load of the subsection containing `p` fail, as a
    /// corrupt block would.
    pub fn corrupt_subsection_at(&mut self, p: Point31) -> SubsectionId {
        let id = self.section_for(p);
        self.grow(id, Area31::point(p));
        self.broken.insert(id);
        id
    }

    pub fn build(self) -> MemoryReader {
        let mut entries = Vec::with_capacity(self.sections.len());
        let mut subsections = Vec::with_capacity(self.sections.len());
        let mut road_count = 0;

        for (i, (roads, border, area)) in self.sections.into_iter().enumerate() {
            let id = SubsectionId(i as u32);
            if let Some(area) = area {
                entries.push(SubsectionEntry { id, envelope: to_aabb(&area) });
            }
            road_count += roads.len();
            subsections.push(Subsection { roads, border, broken: self.broken.contains(&id) });
        }

        MemoryReader {
            subsections,
            index: RTree::bulk_load(entries),
            road_count,
        }
    }
}

impl Default for MemoryReaderBuilder {
    fn default() -> Self {
        Self::new(12)
    }
}
