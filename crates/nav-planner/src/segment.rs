//! Search nodes and the arena that owns them.
//!
//! A [`RouteCalculationSegment`] says "the search stands on `road` at
//! `point_index`, having paid `distance_from_start` to get here".  Nodes are
//! appended to a [`SegmentArena`] and refer to their parent by [`SegmentId`],
//! so parent chains are plain index walks and the whole search state is
//! dropped in one go when the calculation ends.

use std::sync::Arc;

use nav_core::{Road, RoadId};

// ── Handles & keys ────────────────────────────────────────────────────────────

/// Index of a segment in its [`SegmentArena`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct SegmentId(pub u32);

impl SegmentId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which of the two searches a segment belongs to.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SearchSide {
    /// Grows from the start in travel direction.
    Forward,
    /// Grows from the target against travel direction.
    Reverse,
}

impl SearchSide {
    #[inline]
    pub fn opposite(self) -> SearchSide {
        match self {
            SearchSide::Forward => SearchSide::Reverse,
            SearchSide::Reverse => SearchSide::Forward,
        }
    }

    #[inline]
    pub fn is_reverse(self) -> bool {
        self == SearchSide::Reverse
    }
}

/// Restricts which way along its road a segment may be walked.  Set on the
/// continuation node created when a walk stops at a junction, so the search
/// never turns back on itself there.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum AllowedDirection {
    #[default]
    Any,
    Increasing,
    Decreasing,
}

impl AllowedDirection {
    #[inline]
    pub fn allows(self, positive: bool) -> bool {
        match self {
            AllowedDirection::Any => true,
            AllowedDirection::Increasing => positive,
            AllowedDirection::Decreasing => !positive,
        }
    }

    pub fn towards(positive: bool) -> AllowedDirection {
        if positive { AllowedDirection::Increasing } else { AllowedDirection::Decreasing }
    }
}

/// Key of a directed interval in a visited map.
///
/// `(road, index, true)` is the interval `index → index + 1`;
/// `(road, index, false)` is `index + 1 → index`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct RoutePointId {
    pub road:     RoadId,
    pub index:    u32,
    pub positive: bool,
}

impl RoutePointId {
    #[inline]
    pub fn new(road: RoadId, index: u32, positive: bool) -> Self {
        Self { road, index, positive }
    }
}

// ── Segment ───────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SegmentKind {
    Regular,
    /// Synthesized where the two searches touch.  Its parent is the half from
    /// the frontier that found the meeting; `opposite` is the other half.
    Meeting { opposite: SegmentId },
}

#[derive(Clone, Debug)]
pub struct RouteCalculationSegment {
    pub road:                Arc<Road>,
    pub point_index:         u32,
    /// Seconds from the frontier's origin (g).
    pub distance_from_start: f64,
    /// Heuristic seconds to the frontier's goal (h).
    pub distance_to_end:     f64,
    pub side:                SearchSide,
    pub allowed:             AllowedDirection,
    pub parent:              Option<SegmentId>,
    /// Index on the parent's road where the parent's walk reached this node.
    pub parent_end_point:    u32,
    pub kind:                SegmentKind,
}

impl RouteCalculationSegment {
    pub fn seed(road: Arc<Road>, point_index: u32, side: SearchSide, h: f64) -> Self {
        Self {
            road,
            point_index,
            distance_from_start: 0.0,
            distance_to_end: h,
            side,
            allowed: AllowedDirection::Any,
            parent: None,
            parent_end_point: 0,
            kind: SegmentKind::Regular,
        }
    }

    #[inline]
    pub fn road_id(&self) -> RoadId {
        self.road.id()
    }

    #[inline]
    pub fn is_meeting(&self) -> bool {
        matches!(self.kind, SegmentKind::Meeting { .. })
    }

    /// Priority key `g + c·h`.
    #[inline]
    pub fn key(&self, coefficient: f64) -> f64 {
        self.distance_from_start + coefficient * self.distance_to_end
    }
}

// ── Arena ─────────────────────────────────────────────────────────────────────

/// Append-only store of every segment created by one search.
#[derive(Default)]
pub struct SegmentArena {
    segments: Vec<RouteCalculationSegment>,
}

/// Bytes charged per live segment against the memory limit: the node plus
/// its share of queue and map entries.
pub const SEGMENT_BYTES: usize = size_of::<RouteCalculationSegment>() + 96;

impl SegmentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, segment: RouteCalculationSegment) -> SegmentId {
        let id = SegmentId(self.segments.len() as u32);
        self.segments.push(segment);
        id
    }

    /// Panics on an id from another arena, like slice indexing.
    #[inline]
    pub fn get(&self, id: SegmentId) -> &RouteCalculationSegment {
        &self.segments[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: SegmentId) -> &mut RouteCalculationSegment {
        &mut self.segments[id.index()]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn estimated_bytes(&self) -> usize {
        self.segments.len() * SEGMENT_BYTES
    }

    /// `id` followed by its parent, grandparent, … up to the seed.
    pub fn chain(&self, id: SegmentId) -> impl Iterator<Item = SegmentId> + '_ {
        std::iter::successors(Some(id), move |&s| self.get(s).parent)
    }
}
