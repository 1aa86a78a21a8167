//! Turning a meeting node into a route.
//!
//! The forward half is a chain from the meeting back to the start seed; the
//! reverse half a chain from the meeting back to the target seed.  Every
//! parent link becomes one leg on the parent's road, from where the parent
//! stood to where its walk reached the child.  The forward chain is reversed
//! into travel order, the piece of road between the two halves goes in the
//! middle, and the reverse chain already runs in travel order.

use std::sync::Arc;

use nav_core::{Point31, Road, RoadId};

use crate::error::{RouteCalculationResult, RoutingError, RoutingResult};
use crate::profile::RoutingProfile;
use crate::search::RouteStatistics;
use crate::segment::{SearchSide, SegmentArena, SegmentId, SegmentKind};

// ── Route types ───────────────────────────────────────────────────────────────

/// A contiguous stretch of one road, travelled from `start_index` to
/// `end_index` (in either direction).
#[derive(Clone, Debug)]
pub struct RouteLeg {
    pub road:        Arc<Road>,
    pub start_index: u32,
    pub end_index:   u32,
    pub distance_m:  f64,
    pub time_s:      f64,
}

impl RouteLeg {
    /// `true` when travelled towards higher indices (or zero-length).
    #[inline]
    pub fn is_forward(&self) -> bool {
        self.start_index <= self.end_index
    }

    #[inline]
    pub fn road_id(&self) -> RoadId {
        self.road.id()
    }

    #[inline]
    pub fn entry_point(&self) -> Point31 {
        self.road.point(self.start_index)
    }

    #[inline]
    pub fn exit_point(&self) -> Point31 {
        self.road.point(self.end_index)
    }

    /// Point indices in travel order, both ends included.
    pub fn indices(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        if self.is_forward() {
            Box::new(self.start_index..=self.end_index)
        } else {
            Box::new((self.end_index..=self.start_index).rev())
        }
    }

    pub fn points(&self) -> impl Iterator<Item = Point31> + '_ {
        self.indices().map(|i| self.road.point(i))
    }

    fn continues(&self, next: &RouteLeg) -> bool {
        self.road_id() == next.road_id()
            && self.end_index == next.start_index
            && self.is_forward() == next.is_forward()
            && self.road.points() == next.road.points()
    }
}

/// A calculated route.
#[derive(Clone, Debug, Default)]
pub struct Route {
    pub legs:                 Vec<RouteLeg>,
    /// Passed through from the request for guidance consumers.
    pub left_side_navigation: bool,
    pub distance_m:           f64,
    pub time_s:               f64,
    /// One entry per searched waypoint pair.
    pub statistics:           Vec<RouteStatistics>,
}

impl Route {
    /// Geometry in travel order; junction points shared by consecutive legs
    /// appear once.
    pub fn points(&self) -> Vec<Point31> {
        let mut out: Vec<Point31> = Vec::new();
        for leg in &self.legs {
            for p in leg.points() {
                if out.last() != Some(&p) {
                    out.push(p);
                }
            }
        }
        out
    }

    pub fn first_point(&self) -> Option<Point31> {
        self.legs.first().map(RouteLeg::entry_point)
    }

    pub fn last_point(&self) -> Option<Point31> {
        self.legs.last().map(RouteLeg::exit_point)
    }

    /// Road ids in leg order (a road may repeat).
    pub fn road_ids(&self) -> Vec<RoadId> {
        self.legs.iter().map(RouteLeg::road_id).collect()
    }
}

/// Append `leg`, dropping zero-length pieces and merging it into the last
/// leg when it simply continues along the same road.
pub fn push_leg(legs: &mut Vec<RouteLeg>, leg: RouteLeg) {
    if let Some(last) = legs.last_mut() {
        if leg.start_index == leg.end_index {
            return;
        }
        if last.start_index == last.end_index {
            *last = leg;
            return;
        }
        if last.continues(&leg) {
            last.end_index = leg.end_index;
            last.distance_m += leg.distance_m;
            last.time_s += leg.time_s;
            return;
        }
    }
    legs.push(leg);
}

// ── Assembler ─────────────────────────────────────────────────────────────────

pub struct RouteAssembler<'a> {
    profile: &'a dyn RoutingProfile,
}

impl<'a> RouteAssembler<'a> {
    pub fn new(profile: &'a dyn RoutingProfile) -> Self {
        Self { profile }
    }

    /// Leg from `start` to `end` on `road`, with distance and nominal travel
    /// time including obstacles at each point arrived at.
    pub fn leg(&self, road: Arc<Road>, start: u32, end: u32) -> RouteLeg {
        let params = self.profile.params();
        let mut speed = self.profile.speed(&road);
        if speed <= 0.0 {
            speed = params.default_speed_mps;
        }
        let speed = f64::from(speed.min(params.max_speed_mps).max(f32::EPSILON));

        let mut leg = RouteLeg { road, start_index: start, end_index: end, distance_m: 0.0, time_s: 0.0 };
        let indices: Vec<u32> = leg.indices().collect();
        for w in indices.windows(2) {
            let d = leg.road.point(w[0]).distance_m(leg.road.point(w[1]));
            let obstacle = f64::from(self.profile.obstacle_time(&leg.road, w[1]).max(0.0));
            leg.distance_m += d;
            leg.time_s += d / speed + obstacle;
        }
        leg
    }

    /// Legs of the path through `meeting`, in travel order.
    ///
    /// # Errors
    ///
    /// `RouteNotCalculated` if `meeting` is not a meeting node.
    pub fn collect(&self, arena: &SegmentArena, meeting: SegmentId) -> RoutingResult<Vec<RouteLeg>> {
        let node = arena.get(meeting);
        let (SegmentKind::Meeting { opposite }, Some(found_by)) = (node.kind, node.parent) else {
            return Err(RoutingError::RouteNotCalculated("search ended on a regular segment".into()));
        };
        let (forward, reverse) = match node.side {
            SearchSide::Forward => (found_by, opposite),
            SearchSide::Reverse => (opposite, found_by),
        };

        let mut pieces: Vec<(Arc<Road>, u32, u32)> = Vec::new();
        for child in arena.chain(forward) {
            let c = arena.get(child);
            if let Some(p) = c.parent {
                let p = arena.get(p);
                pieces.push((Arc::clone(&p.road), p.point_index, c.parent_end_point));
            }
        }
        pieces.reverse();

        let (f, r) = (arena.get(forward), arena.get(reverse));
        pieces.push((Arc::clone(&f.road), f.point_index, r.point_index));

        for child in arena.chain(reverse) {
            let c = arena.get(child);
            if let Some(p) = c.parent {
                let p = arena.get(p);
                pieces.push((Arc::clone(&p.road), c.parent_end_point, p.point_index));
            }
        }

        let mut legs = Vec::with_capacity(pieces.len());
        for (road, start, end) in pieces {
            push_leg(&mut legs, self.leg(road, start, end));
        }
        Ok(legs)
    }

    /// Validate contiguity and total up.
    ///
    /// # Errors
    ///
    /// `RouteNotCalculated` for an empty leg list or when one leg does not
    /// end where the next begins.
    pub fn finish(
        &self,
        legs:                 Vec<RouteLeg>,
        left_side_navigation: bool,
        statistics:           Vec<RouteStatistics>,
    ) -> RouteCalculationResult {
        if legs.is_empty() {
            return Err(RoutingError::RouteNotCalculated("route has no legs".into()));
        }
        for (i, w) in legs.windows(2).enumerate() {
            if w[0].exit_point() != w[1].entry_point() {
                return Err(RoutingError::RouteNotCalculated(format!(
                    "leg {i} on {} ends at {} but leg {} on {} starts at {}",
                    w[0].road_id(),
                    w[0].exit_point(),
                    i + 1,
                    w[1].road_id(),
                    w[1].entry_point(),
                )));
            }
        }
        Ok(Route {
            distance_m: legs.iter().map(|l| l.distance_m).sum(),
            time_s: legs.iter().map(|l| l.time_s).sum(),
            legs,
            left_side_navigation,
            statistics,
        })
    }
}
