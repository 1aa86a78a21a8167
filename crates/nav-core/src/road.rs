//! The immutable road model.
//!
//! A [`Road`] is a polyline of [`Point31`] coordinates plus the attributes the
//! planner needs: travel direction, class, roundabout flag, per-point tags and
//! turn restrictions keyed by the *other* road's id.  Roads are built once by a
//! reader (see `nav-graph`), wrapped in `Arc`, and shared read-only by the tile
//! cache and every running search.
//!
//! # Example
//!
//! ```
//! use nav_core::{Point31, RestrictionKind, RoadBuilder, RoadDirection, RoadId};
//!
//! let road = RoadBuilder::new(RoadId(7))
//!     .point(Point31::new(100, 100))
//!     .point(Point31::new(200, 100))
//!     .direction(RoadDirection::OneWayForward)
//!     .restriction(RoadId(8), RestrictionKind::NoLeftTurn)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(road.point_count(), 2);
//! assert_eq!(road.restriction_to(RoadId(8)), Some(RestrictionKind::NoLeftTurn));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::mem::size_of;

use crate::error::{CoreError, CoreResult};
use crate::geo::{Area31, Point31};
use crate::{RoadId, SubsectionId, TileId};

/// Distance scanned along a road to estimate its bearing at a point.
const BEARING_SCAN_M: f64 = 5.0;

// ── Enums ─────────────────────────────────────────────────────────────────────

/// Which way traffic may move along the point sequence.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RoadDirection {
    #[default]
    TwoWay,
    /// Travel only from lower to higher point index.
    OneWayForward,
    /// Travel only from higher to lower point index.
    OneWayReverse,
}

impl RoadDirection {
    /// Whether moving towards higher point indices is legal.
    #[inline]
    pub fn allows_increasing(self) -> bool {
        !matches!(self, RoadDirection::OneWayReverse)
    }

    /// Whether moving towards lower point indices is legal.
    #[inline]
    pub fn allows_decreasing(self) -> bool {
        !matches!(self, RoadDirection::OneWayForward)
    }
}

/// A road-to-road turn restriction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RestrictionKind {
    NoLeftTurn,
    NoRightTurn,
    NoUTurn,
    NoStraightOn,
    OnlyLeftTurn,
    OnlyRightTurn,
    OnlyStraightOn,
}

impl RestrictionKind {
    /// "only-X" restrictions: the named road is the single legal exit.
    #[inline]
    pub fn is_exclusive(self) -> bool {
        matches!(
            self,
            RestrictionKind::OnlyLeftTurn
                | RestrictionKind::OnlyRightTurn
                | RestrictionKind::OnlyStraightOn
        )
    }

    /// "no-X" restrictions: the named road is not a legal exit.
    #[inline]
    pub fn is_prohibitive(self) -> bool {
        !self.is_exclusive()
    }

    /// Parse the value of an OSM `restriction=*` tag.
    pub fn from_osm(tag: &str) -> Option<RestrictionKind> {
        Some(match tag {
            "no_left_turn"     => RestrictionKind::NoLeftTurn,
            "no_right_turn"    => RestrictionKind::NoRightTurn,
            "no_u_turn"        => RestrictionKind::NoUTurn,
            "no_straight_on"   => RestrictionKind::NoStraightOn,
            "only_left_turn"   => RestrictionKind::OnlyLeftTurn,
            "only_right_turn"  => RestrictionKind::OnlyRightTurn,
            "only_straight_on" => RestrictionKind::OnlyStraightOn,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RestrictionKind::NoLeftTurn     => "no_left_turn",
            RestrictionKind::NoRightTurn    => "no_right_turn",
            RestrictionKind::NoUTurn        => "no_u_turn",
            RestrictionKind::NoStraightOn   => "no_straight_on",
            RestrictionKind::OnlyLeftTurn   => "only_left_turn",
            RestrictionKind::OnlyRightTurn  => "only_right_turn",
            RestrictionKind::OnlyStraightOn => "only_straight_on",
        }
    }
}

impl std::fmt::Display for RestrictionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional road class, as used by speed tables and profile acceptance.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    Service,
    #[default]
    Unclassified,
    Track,
    Footway,
    Cycleway,
    Path,
}

impl RoadClass {
    /// Classify an OSM `highway=*` value.  `_link` roads share the class of
    /// their parent road; unknown values are `Unclassified`.
    pub fn from_highway(value: &str) -> RoadClass {
        match value.trim_end_matches("_link") {
            "motorway"                      => RoadClass::Motorway,
            "trunk"                         => RoadClass::Trunk,
            "primary"                       => RoadClass::Primary,
            "secondary"                     => RoadClass::Secondary,
            "tertiary"                      => RoadClass::Tertiary,
            "residential" | "living_street" => RoadClass::Residential,
            "service"                       => RoadClass::Service,
            "track"                         => RoadClass::Track,
            "footway" | "pedestrian" | "steps" => RoadClass::Footway,
            "cycleway"                      => RoadClass::Cycleway,
            "path" | "bridleway"            => RoadClass::Path,
            _                               => RoadClass::Unclassified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoadClass::Motorway     => "motorway",
            RoadClass::Trunk        => "trunk",
            RoadClass::Primary      => "primary",
            RoadClass::Secondary    => "secondary",
            RoadClass::Tertiary     => "tertiary",
            RoadClass::Residential  => "residential",
            RoadClass::Service      => "service",
            RoadClass::Unclassified => "unclassified",
            RoadClass::Track        => "track",
            RoadClass::Footway      => "footway",
            RoadClass::Cycleway     => "cycleway",
            RoadClass::Path         => "path",
        }
    }
}

impl std::fmt::Display for RoadClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-level feature that a routing profile may turn into obstacle time.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointTag {
    TrafficSignals,
    StopSign,
    Barrier,
}

// ── Road ──────────────────────────────────────────────────────────────────────

/// An immutable road polyline.  Construct with [`RoadBuilder`].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Road {
    id:            RoadId,
    points:        Vec<Point31>,
    direction:     RoadDirection,
    class:         RoadClass,
    roundabout:    bool,
    max_speed_mps: Option<f32>,
    /// Sorted by point index.
    point_tags:    Vec<(u32, PointTag)>,
    restrictions:  BTreeMap<RoadId, RestrictionKind>,
    subsection:    SubsectionId,
}

impl Road {
    #[inline]
    pub fn id(&self) -> RoadId {
        self.id
    }

    #[inline]
    pub fn points(&self) -> &[Point31] {
        &self.points
    }

    /// Coordinate at `index`.  Panics if out of range, like slice indexing.
    #[inline]
    pub fn point(&self, index: u32) -> Point31 {
        self.points[index as usize]
    }

    /// Number of points (always ≥ 2).
    #[inline]
    pub fn point_count(&self) -> u32 {
        self.points.len() as u32
    }

    #[inline]
    pub fn last_index(&self) -> u32 {
        self.point_count() - 1
    }

    #[inline]
    pub fn direction(&self) -> RoadDirection {
        self.direction
    }

    #[inline]
    pub fn class(&self) -> RoadClass {
        self.class
    }

    #[inline]
    pub fn is_roundabout(&self) -> bool {
        self.roundabout
    }

    /// Posted speed limit, if the source carried one.
    #[inline]
    pub fn max_speed_mps(&self) -> Option<f32> {
        self.max_speed_mps
    }

    #[inline]
    pub fn subsection(&self) -> SubsectionId {
        self.subsection
    }

    /// Restriction governing the turn from this road onto `to`.
    #[inline]
    pub fn restriction_to(&self, to: RoadId) -> Option<RestrictionKind> {
        self.restrictions.get(&to).copied()
    }

    /// All restrictions authored on this road, ordered by target road id.
    pub fn restrictions(&self) -> impl Iterator<Item = (RoadId, RestrictionKind)> + '_ {
        self.restrictions.iter().map(|(&id, &kind)| (id, kind))
    }

    #[inline]
    pub fn has_restrictions(&self) -> bool {
        !self.restrictions.is_empty()
    }

    /// Tags attached to the point at `index`.
    pub fn tags_at(&self, index: u32) -> impl Iterator<Item = PointTag> + '_ {
        let start = self.point_tags.partition_point(|&(i, _)| i < index);
        self.point_tags[start..]
            .iter()
            .take_while(move |&&(i, _)| i == index)
            .map(|&(_, tag)| tag)
    }

    #[inline]
    pub fn has_tag(&self, index: u32, tag: PointTag) -> bool {
        self.tags_at(index).any(|t| t == tag)
    }

    /// Every index whose coordinate equals `p` (more than one for loops).
    pub fn indices_at(&self, p: Point31) -> impl Iterator<Item = u32> + '_ {
        self.points
            .iter()
            .enumerate()
            .filter(move |&(_, q)| *q == p)
            .map(|(i, _)| i as u32)
    }

    /// Bounding area of all points.
    pub fn area(&self) -> Area31 {
        // `build` guarantees at least two points.
        Area31::covering(self.points.iter().copied()).unwrap_or(Area31::point(Point31::default()))
    }

    /// Tiles touched by any point of this road at `zoom`.
    pub fn tiles(&self, zoom: u32) -> BTreeSet<TileId> {
        self.points.iter().map(|&p| TileId::containing(p, zoom)).collect()
    }

    /// Along-road distance in metres between two point indices (either order).
    pub fn distance_between(&self, a: u32, b: u32) -> f64 {
        let (lo, hi) = (a.min(b) as usize, a.max(b) as usize);
        self.points[lo..=hi]
            .windows(2)
            .map(|w| w[0].distance_m(w[1]))
            .sum()
    }

    /// Bearing of the road leaving `origin` towards higher (`forward`) or
    /// lower indices, measured over the first few metres.
    ///
    /// `None` when there is no point in that direction.
    pub fn direction_delta(&self, origin: u32, forward: bool) -> Option<f64> {
        let o = self.point(origin);
        let mut idx = origin;
        let mut prev = o;
        let mut scanned = 0.0;
        let mut target = None;
        while scanned < BEARING_SCAN_M {
            idx = match forward {
                true if idx < self.last_index() => idx + 1,
                false if idx > 0 => idx - 1,
                _ => break,
            };
            let p = self.point(idx);
            scanned += prev.distance_m(p);
            prev = p;
            target = Some(p);
        }
        target.map(|p| o.bearing_to(p))
    }

    /// Copy of this road with `p` inserted before `index`.  Point tags at or
    /// after `index` shift up by one.
    pub fn with_inserted_point(&self, index: u32, p: Point31) -> Road {
        let mut road = self.clone();
        let at = (index as usize).min(road.points.len());
        road.points.insert(at, p);
        for (i, _) in &mut road.point_tags {
            if *i as usize >= at {
                *i += 1;
            }
        }
        road
    }

    /// Re-home an unshared road into `subsection`.  Readers call this while
    /// partitioning roads, before they are wrapped in `Arc`.
    pub fn in_subsection(mut self, subsection: SubsectionId) -> Road {
        self.subsection = subsection;
        self
    }

    /// Approximate heap footprint, used for cache accounting.
    pub fn estimated_size_bytes(&self) -> usize {
        size_of::<Road>()
            + self.points.len() * size_of::<Point31>()
            + self.point_tags.len() * size_of::<(u32, PointTag)>()
            + self.restrictions.len() * (size_of::<RoadId>() + size_of::<RestrictionKind>() + 16)
    }
}

// ── RoadBuilder ───────────────────────────────────────────────────────────────

/// Fluent builder for [`Road`].
pub struct RoadBuilder {
    road: Road,
}

impl RoadBuilder {
    pub fn new(id: RoadId) -> Self {
        Self {
            road: Road {
                id,
                points:        Vec::new(),
                direction:     RoadDirection::TwoWay,
                class:         RoadClass::Unclassified,
                roundabout:    false,
                max_speed_mps: None,
                point_tags:    Vec::new(),
                restrictions:  BTreeMap::new(),
                subsection:    SubsectionId::INVALID,
            },
        }
    }

    pub fn point(mut self, p: Point31) -> Self {
        self.road.points.push(p);
        self
    }

    pub fn points<I: IntoIterator<Item = Point31>>(mut self, points: I) -> Self {
        self.road.points.extend(points);
        self
    }

    pub fn direction(mut self, direction: RoadDirection) -> Self {
        self.road.direction = direction;
        self
    }

    pub fn class(mut self, class: RoadClass) -> Self {
        self.road.class = class;
        self
    }

    pub fn roundabout(mut self, roundabout: bool) -> Self {
        self.road.roundabout = roundabout;
        self
    }

    pub fn max_speed_mps(mut self, speed: f32) -> Self {
        self.road.max_speed_mps = Some(speed);
        self
    }

    pub fn tag(mut self, index: u32, tag: PointTag) -> Self {
        self.road.point_tags.push((index, tag));
        self
    }

    pub fn restriction(mut self, to: RoadId, kind: RestrictionKind) -> Self {
        self.road.restrictions.insert(to, kind);
        self
    }

    pub fn subsection(mut self, subsection: SubsectionId) -> Self {
        self.road.subsection = subsection;
        self
    }

    /// Validate and freeze.
    ///
    /// # Errors
    ///
    /// [`CoreError::DegenerateRoad`] for fewer than two points,
    /// [`CoreError::TagOutOfRange`] for a tag past the last point.
    pub fn build(mut self) -> CoreResult<Road> {
        let n = self.road.points.len();
        if n < 2 {
            return Err(CoreError::DegenerateRoad { id: self.road.id, points: n });
        }
        if let Some(&(index, _)) = self.road.point_tags.iter().find(|(i, _)| *i as usize >= n) {
            return Err(CoreError::TagOutOfRange { road: self.road.id, index });
        }
        self.road.point_tags.sort_unstable();
        self.road.point_tags.dedup();
        Ok(self.road)
    }
}
