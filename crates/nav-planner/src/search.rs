//! Bidirectional A* over road segments.
//!
//! # Loop
//!
//! ```text
//! seed forward at the start, reverse at the target
//! loop:
//!   ① poll cancellation
//!   ② pick a frontier (forward, reverse, then by cost / size balance)
//!   ③ pop its best segment; a meeting node ends the search
//!   ④ check the memory budget
//!   ⑤ walk the segment's road both ways until a junction, a dead end,
//!      a barrier, or an interval the opposite search already walked
//! ```
//!
//! Each step of a walk marks the directed interval it crossed in the active
//! frontier's visited map.  The searches meet when one walks an interval the
//! other walked in the opposite direction from exactly the point just
//! reached; the two halves are then joined by a meeting node whose cost is
//! the sum of both sides.
//!
//! # Termination
//!
//! An empty frontier is never picked again, but the other side keeps
//! searching and can still meet the intervals it left behind.  Only when both
//! are empty does the search fail, named after the frontier that emptied
//! first.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_3, PI};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use nav_core::{PointTag, Road, normalize_angle};
use nav_graph::{Candidate, GraphResult, SpatialSegmentLoader};

use crate::config::{RoutingConfig, SearchDirection, WRONG_HEADING_PENALTY_S};
use crate::error::{RoutingError, RoutingResult};
use crate::frontier::Frontier;
use crate::heuristic::HeuristicEstimator;
use crate::profile::{RoutingProfile, effective_speed};
use crate::restrictions::TurnRestrictionResolver;
use crate::segment::{
    AllowedDirection, RouteCalculationSegment, RoutePointId, SearchSide, SegmentArena, SegmentId,
    SegmentKind,
};

/// A frontier this many times larger than the other yields its turn.
const FRONTIER_SIZE_RATIO: f64 = 1.3;
/// Heuristic weight used only when comparing the two frontiers' best keys.
const BALANCE_COEFFICIENT: f64 = 0.5;
/// Leaving the start more than this far off the initial heading is "against" it.
const HEADING_TOLERANCE: f64 = FRAC_PI_3;

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Cooperative abort flag, polled once per search iteration.
pub trait Cancellation: Sync {
    fn is_aborted(&self) -> bool;
}

impl Cancellation for AtomicBool {
    #[inline]
    fn is_aborted(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Never aborts.
#[derive(Copy, Clone, Debug, Default)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    #[inline]
    fn is_aborted(&self) -> bool {
        false
    }
}

// ── State & statistics ────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SearchState {
    Initialized,
    Running,
    Found,
    NoRouteFromStart,
    NoRouteToTarget,
    MemoryExceeded,
    Aborted,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteStatistics {
    pub forward_iterations:  u64,
    pub backward_iterations: u64,
    /// Queue sizes when the search stopped.
    pub forward_queue_len:   usize,
    pub backward_queue_len:  usize,
    pub forward_visited:     usize,
    pub backward_visited:    usize,
    pub segments_created:    usize,
    /// Seconds of the route found, if any.
    pub meeting_cost:        Option<f64>,
    pub elapsed:             Duration,
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct BidirectionalSearchEngine<'a> {
    loader:        &'a SpatialSegmentLoader<'a>,
    profile:       &'a dyn RoutingProfile,
    config:        &'a RoutingConfig,
    resolver:      TurnRestrictionResolver,
    heuristic:     HeuristicEstimator,
    arena:         SegmentArena,
    forward:       Frontier,
    reverse:       Frontier,
    state:         SearchState,
    first_emptied: Option<SearchSide>,
    iteration:     u64,
    stats:         RouteStatistics,
}

impl<'a> BidirectionalSearchEngine<'a> {
    /// Seed both frontiers.  `start` and `target` are every road passing
    /// through the snapped start and target points (normally one each).
    pub fn new(
        loader:    &'a SpatialSegmentLoader<'a>,
        profile:   &'a dyn RoutingProfile,
        config:    &'a RoutingConfig,
        heuristic: HeuristicEstimator,
        start:     &[Candidate],
        target:    &[Candidate],
    ) -> Self {
        let mut engine = Self {
            loader,
            profile,
            config,
            resolver: TurnRestrictionResolver::new(profile.params().restrictions_aware),
            heuristic,
            arena: SegmentArena::new(),
            forward: Frontier::new(SearchSide::Forward),
            reverse: Frontier::new(SearchSide::Reverse),
            state: SearchState::Initialized,
            first_emptied: None,
            iteration: 0,
            stats: RouteStatistics::default(),
        };

        let h = engine.heuristic.estimate(engine.heuristic.start(), engine.heuristic.target());
        for (side, seeds) in [(SearchSide::Forward, start), (SearchSide::Reverse, target)] {
            for c in seeds {
                let id = engine.arena.push(RouteCalculationSegment::seed(
                    Arc::clone(&c.road),
                    c.point_index,
                    side,
                    h,
                ));
                let frontier = engine.frontier_mut(side);
                frontier.register_node((c.road_id(), c.point_index, AllowedDirection::Any), id);
                frontier.push(id, 0.0, h, config.heuristic_coefficient);
            }
        }
        engine
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn arena(&self) -> &SegmentArena {
        &self.arena
    }

    pub fn statistics(&self) -> &RouteStatistics {
        &self.stats
    }

    fn frontier(&self, side: SearchSide) -> &Frontier {
        match side {
            SearchSide::Forward => &self.forward,
            SearchSide::Reverse => &self.reverse,
        }
    }

    fn frontier_mut(&mut self, side: SearchSide) -> &mut Frontier {
        match side {
            SearchSide::Forward => &mut self.forward,
            SearchSide::Reverse => &mut self.reverse,
        }
    }

    // ── Main loop ────────────────────────────────────────────────────────

    /// Run to completion.  On success returns the meeting node, whose two
    /// halves the [`RouteAssembler`][crate::RouteAssembler] joins into legs.
    ///
    /// # Errors
    ///
    /// `NoRouteFromStart` / `NoRouteToTarget` when the frontiers run dry,
    /// `MemoryLimitExceeded`, `Aborted`, and `GraphLoadError` for reader
    /// failures while loading tiles.
    pub fn run(&mut self, cancel: &dyn Cancellation) -> RoutingResult<SegmentId> {
        let started = Instant::now();
        self.state = SearchState::Running;
        let result = self.search(cancel);

        self.stats.elapsed = started.elapsed();
        self.stats.forward_queue_len = self.forward.len();
        self.stats.backward_queue_len = self.reverse.len();
        self.stats.forward_visited = self.forward.visited_len();
        self.stats.backward_visited = self.reverse.visited_len();
        self.stats.segments_created = self.arena.len();

        debug!(
            state = ?self.state,
            forward = self.stats.forward_iterations,
            backward = self.stats.backward_iterations,
            segments = self.stats.segments_created,
            cost = self.stats.meeting_cost,
            elapsed_ms = self.stats.elapsed.as_millis() as u64,
            "search finished"
        );
        result
    }

    fn search(&mut self, cancel: &dyn Cancellation) -> RoutingResult<SegmentId> {
        loop {
            if cancel.is_aborted() {
                self.state = SearchState::Aborted;
                return Err(RoutingError::Aborted);
            }

            let Some(side) = self.choose_side() else {
                return Err(match self.first_emptied {
                    Some(SearchSide::Reverse) => {
                        self.state = SearchState::NoRouteToTarget;
                        RoutingError::NoRouteToTarget
                    }
                    _ => {
                        self.state = SearchState::NoRouteFromStart;
                        RoutingError::NoRouteFromStart
                    }
                });
            };
            self.iteration += 1;

            let Some(id) = self.frontier_mut(side).pop() else { continue };
            match side {
                SearchSide::Forward => self.stats.forward_iterations += 1,
                SearchSide::Reverse => self.stats.backward_iterations += 1,
            }

            let segment = self.arena.get(id);
            if segment.is_meeting() {
                self.state = SearchState::Found;
                self.stats.meeting_cost = Some(segment.distance_from_start);
                return Ok(id);
            }

            let used = self.loader.cache().estimated_footprint() + self.arena.estimated_bytes();
            let limit = self.config.memory_limit_bytes;
            if used > limit {
                warn!(used, limit, segments = self.arena.len(), "route search over memory limit");
                self.state = SearchState::MemoryExceeded;
                return Err(RoutingError::MemoryLimitExceeded { limit });
            }

            trace!(
                ?side,
                road = segment.road_id().0,
                index = segment.point_index,
                g = segment.distance_from_start,
                "expand"
            );
            self.walk(side, id, true)?;
            self.walk(side, id, false)?;
        }
    }

    /// Frontier to expand next, or `None` when no allowed frontier is left.
    fn choose_side(&mut self) -> Option<SearchSide> {
        let forward_empty = self.forward.is_empty();
        let reverse_empty = self.reverse.is_empty();
        // A side drained under a direction override did not run dry on its own.
        if self.first_emptied.is_none() {
            if forward_empty && self.grows(SearchSide::Forward) {
                self.first_emptied = Some(SearchSide::Forward);
            } else if reverse_empty && self.grows(SearchSide::Reverse) {
                self.first_emptied = Some(SearchSide::Reverse);
            }
        }

        // Under an override the other side is drained first, so meetings
        // it already holds are still found.
        let preferred = match (self.iteration, self.config.direction) {
            (0, _) => SearchSide::Forward,
            (1, _) => SearchSide::Reverse,
            (_, SearchDirection::ForwardOnly) => SearchSide::Reverse,
            (_, SearchDirection::ReverseOnly) => SearchSide::Forward,
            (_, SearchDirection::Bidirectional) => self.balanced_side(),
        };

        match (preferred, forward_empty, reverse_empty) {
            (_, true, true) => None,
            (SearchSide::Forward, true, false) => Some(SearchSide::Reverse),
            (SearchSide::Reverse, false, true) => Some(SearchSide::Forward),
            (side, _, _) => Some(side),
        }
    }

    /// Whether `side` may still add junction nodes.  Both sides grow during
    /// the two seed expansions; after that an override freezes the other.
    fn grows(&self, side: SearchSide) -> bool {
        if self.iteration <= 2 {
            return true;
        }
        match self.config.direction {
            SearchDirection::Bidirectional => true,
            SearchDirection::ForwardOnly => side == SearchSide::Forward,
            SearchDirection::ReverseOnly => side == SearchSide::Reverse,
        }
    }

    fn balanced_side(&self) -> SearchSide {
        let (Some(f), Some(r)) = (self.forward.peek(), self.reverse.peek()) else {
            return SearchSide::Forward;
        };
        let (nf, nr) = (self.forward.len() as f64, self.reverse.len() as f64);
        if nf > FRONTIER_SIZE_RATIO * nr {
            return SearchSide::Reverse;
        }
        if nr > FRONTIER_SIZE_RATIO * nf {
            return SearchSide::Forward;
        }
        let kf = self.arena.get(f).key(BALANCE_COEFFICIENT);
        let kr = self.arena.get(r).key(BALANCE_COEFFICIENT);
        if kf > kr { SearchSide::Reverse } else { SearchSide::Forward }
    }

    // ── Expansion ────────────────────────────────────────────────────────

    /// Walk from segment `id` along its road towards higher (`positive`) or
    /// lower indices.
    fn walk(&mut self, side: SearchSide, id: SegmentId, positive: bool) -> GraphResult<()> {
        let segment = self.arena.get(id);
        let road = Arc::clone(&segment.road);
        let index = segment.point_index;
        let g = segment.distance_from_start;
        let allowed = segment.allowed;
        let parent = segment.parent.map(|p| (p, segment.parent_end_point));

        if (positive && index >= road.last_index()) || (!positive && index == 0) {
            return Ok(());
        }
        // Forward travel and reverse un-travel along increasing indices both
        // need the road to be drivable towards higher indices.
        let direction = self.profile.direction(&road);
        let legal = if positive != side.is_reverse() {
            direction.allows_increasing()
        } else {
            direction.allows_decreasing()
        };
        if !legal || !allowed.allows(positive) {
            return Ok(());
        }
        let first = RoutePointId::new(road.id(), if positive { index } else { index - 1 }, positive);
        if self.frontier(side).is_visited(first) {
            return Ok(());
        }

        let mut obstacles = self.entry_cost(side, &road, index, positive, parent);
        let speed = effective_speed(self.profile, &road);

        let mut distance = 0.0;
        let mut prev = index;
        loop {
            let end = if positive { prev + 1 } else { prev - 1 };
            let interval = if positive { prev } else { end };
            self.frontier_mut(side).visit(RoutePointId::new(road.id(), interval, positive), id);

            distance += road.point(prev).distance_m(road.point(end));
            let obstacle = self.profile.obstacle_time(&road, end);
            if obstacle < 0.0 {
                break;
            }
            obstacles += f64::from(obstacle);
            let g_end = g + obstacles + distance / speed;

            let opposite = RoutePointId::new(road.id(), interval, !positive);
            if let Some(other) = self.frontier(side.opposite()).visited_by(opposite) {
                if self.arena.get(other).point_index == end {
                    self.push_meeting(side, id, &road, end, positive, g_end, other);
                    break;
                }
            }

            let candidates = self.loader.load_candidates_at(road.point(end))?;
            let junction = candidates.iter().any(|c| c.road_id() != road.id() || c.point_index != end);
            if junction {
                if self.grows(side) {
                    let reachable = self.resolver.resolve(&road, candidates, side.is_reverse());
                    self.relax(side, id, &road, end, positive, g_end, reachable);
                }
                break;
            }

            let at_end = if positive { end == road.last_index() } else { end == 0 };
            if at_end {
                break;
            }
            prev = end;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn push_meeting(
        &mut self,
        side:     SearchSide,
        parent:   SegmentId,
        road:     &Arc<Road>,
        end:      u32,
        positive: bool,
        g_end:    f64,
        opposite: SegmentId,
    ) {
        // The opposite half leaves its point towards us; charge its entry too.
        let other = self.arena.get(opposite);
        let entry = self.entry_cost(
            other.side,
            road,
            end,
            !positive,
            other.parent.map(|p| (p, other.parent_end_point)),
        );
        let total = g_end + other.distance_from_start + entry;
        let id = self.arena.push(RouteCalculationSegment {
            road:                Arc::clone(road),
            point_index:         end,
            distance_from_start: total,
            distance_to_end:     0.0,
            side,
            allowed:             AllowedDirection::Any,
            parent:              Some(parent),
            parent_end_point:    end,
            kind:                SegmentKind::Meeting { opposite },
        });
        trace!(road = road.id().0, index = end, cost = total, "frontiers met");
        let coefficient = self.config.heuristic_coefficient;
        self.frontier_mut(side).push(id, total, 0.0, coefficient);
    }

    /// Create or improve frontier nodes for the candidates at a junction.
    #[allow(clippy::too_many_arguments)]
    fn relax(
        &mut self,
        side:       SearchSide,
        parent:     SegmentId,
        road:       &Road,
        end:        u32,
        positive:   bool,
        g_end:      f64,
        candidates: Vec<Candidate>,
    ) {
        let coefficient = self.config.heuristic_coefficient;
        let h = self.heuristic.estimate_towards(road.point(end), side);

        for c in candidates {
            let continuation = c.road_id() == road.id() && c.point_index == end;
            let allowed =
                if continuation { AllowedDirection::towards(positive) } else { AllowedDirection::Any };
            let key = (c.road_id(), c.point_index, allowed);

            let frontier = self.frontier(side);
            let done_up = c.point_index >= c.road.last_index()
                || frontier.is_visited(RoutePointId::new(c.road_id(), c.point_index, true));
            let done_down = c.point_index == 0
                || frontier.is_visited(RoutePointId::new(c.road_id(), c.point_index - 1, false));
            let existing = frontier.node(key);

            // Both ways out are walked already; expanded nodes stay as they are.
            if done_up && done_down {
                continue;
            }

            match existing {
                None => {
                    let id = self.arena.push(RouteCalculationSegment {
                        road:                c.road,
                        point_index:         c.point_index,
                        distance_from_start: g_end,
                        distance_to_end:     h,
                        side,
                        allowed,
                        parent:              Some(parent),
                        parent_end_point:    end,
                        kind:                SegmentKind::Regular,
                    });
                    let frontier = self.frontier_mut(side);
                    frontier.register_node(key, id);
                    frontier.push(id, g_end, h, coefficient);
                }
                Some(n) => {
                    let node = self.arena.get_mut(n);
                    let (new_key, old_key) = (g_end + coefficient * h, node.key(coefficient));
                    let better = new_key < old_key
                        || (new_key == old_key && g_end < node.distance_from_start);
                    if better {
                        node.distance_from_start = g_end;
                        node.distance_to_end = h;
                        node.parent = Some(parent);
                        node.parent_end_point = end;
                        self.frontier_mut(side).push(n, g_end, h, coefficient);
                    }
                }
            }
        }
    }

    // ── Costs ────────────────────────────────────────────────────────────

    /// Cost of starting a walk from `index` on `road`: the turn from the
    /// parent's road, or the heading penalty for a forward seed.
    fn entry_cost(
        &self,
        side:     SearchSide,
        road:     &Road,
        index:    u32,
        positive: bool,
        parent:   Option<(SegmentId, u32)>,
    ) -> f64 {
        match parent {
            Some((p, parent_end)) => self.turn_time(road, index, positive, p, parent_end),
            None if side == SearchSide::Forward => self.heading_penalty(road, index, positive),
            None => 0.0,
        }
    }

    /// Seconds for turning from the parent's road onto `road` at `index`,
    /// leaving towards higher (`positive`) or lower indices.
    fn turn_time(
        &self,
        road:       &Road,
        index:      u32,
        positive:   bool,
        parent:     SegmentId,
        parent_end: u32,
    ) -> f64 {
        let from = self.arena.get(parent);
        if from.road_id() == road.id() {
            return 0.0;
        }
        let params = self.profile.params();
        if from.road.has_tag(parent_end, PointTag::TrafficSignals) {
            return 0.0;
        }
        if params.roundabout_turn_s > 0.0 && !from.road.is_roundabout() && road.is_roundabout() {
            return f64::from(params.roundabout_turn_s);
        }

        let leaving = road.direction_delta(index, positive);
        let back = from.road.direction_delta(parent_end, parent_end < from.point_index);
        let (Some(a1), Some(a2)) = (leaving, back) else {
            return 0.0;
        };
        let diff = normalize_angle(a1 - a2 - PI).abs();
        if diff > 2.0 * PI / 3.0 {
            f64::from(params.left_turn_s)
        } else if diff > FRAC_PI_2 {
            f64::from(params.right_turn_s)
        } else {
            0.0
        }
    }

    fn heading_penalty(&self, road: &Road, index: u32, positive: bool) -> f64 {
        let Some(heading) = self.config.initial_heading else {
            return 0.0;
        };
        match road.direction_delta(index, positive) {
            Some(bearing) if normalize_angle(bearing - heading).abs() > HEADING_TOLERANCE => {
                WRONG_HEADING_PENALTY_S
            }
            _ => 0.0,
        }
    }
}
