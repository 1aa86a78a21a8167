//! Public entry point: [`RoutePlanner`] and its builder.

use std::sync::Arc;

use tracing::{debug, info, warn};

use nav_core::{Area31, GeoPoint, Point31, RoadId};
use nav_graph::{Candidate, RoadGraphTileCache, SpatialSegmentLoader};

use crate::assemble::{Route, RouteAssembler, RouteLeg, push_leg};
use crate::config::RoutingConfig;
use crate::error::{RouteCalculationResult, RoutingError, RoutingResult};
use crate::heuristic::{BorderLineTable, HeuristicEstimator};
use crate::profile::{ProfileFilter, RoutingProfile};
use crate::search::{BidirectionalSearchEngine, Cancellation, RouteStatistics};

/// Border samples are read this far (31-bit units) around the start/target box.
const BORDER_AREA_MARGIN: u32 = 1 << 21;

// ── Builder ───────────────────────────────────────────────────────────────────

/// Fluent builder for [`RoutePlanner`].
///
/// | Method       | Default                    |
/// |--------------|----------------------------|
/// | `.config(c)` | `RoutingConfig::default()` |
///
/// # Example
///
/// ```rust,ignore
/// let planner = RoutePlannerBuilder::new(cache, Arc::new(CarProfile::new()))
///     .config(RoutingConfig { heuristic_coefficient: 1.2, ..Default::default() })
///     .build()?;
/// ```
pub struct RoutePlannerBuilder {
    cache:   Arc<RoadGraphTileCache>,
    profile: Arc<dyn RoutingProfile>,
    config:  RoutingConfig,
}

impl RoutePlannerBuilder {
    pub fn new(cache: Arc<RoadGraphTileCache>, profile: Arc<dyn RoutingProfile>) -> Self {
        Self { cache, profile, config: RoutingConfig::default() }
    }

    pub fn config(mut self, config: RoutingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn heuristic_coefficient(mut self, coefficient: f64) -> Self {
        self.config.heuristic_coefficient = coefficient;
        self
    }

    pub fn memory_limit_bytes(mut self, limit: usize) -> Self {
        self.config.memory_limit_bytes = limit;
        self
    }

    pub fn initial_heading(mut self, heading: Option<f64>) -> Self {
        self.config.initial_heading = heading;
        self
    }

    /// # Errors
    ///
    /// [`RoutingError::Config`] if the configuration or the profile's
    /// parameters do not validate.
    pub fn build(self) -> RoutingResult<RoutePlanner> {
        self.config.validate()?;
        self.profile.params().validate()?;
        Ok(RoutePlanner {
            cache:    self.cache,
            profile:  self.profile,
            config:   self.config,
            previous: None,
        })
    }
}

// ── Planner ───────────────────────────────────────────────────────────────────

struct PreviousRoute {
    route:  Route,
    target: Point31,
}

/// Calculates routes over a shared tile cache with one profile.
///
/// Each calculation gets its own loader, overlay and search state; only the
/// cache is shared, so several planners over one cache may run on different
/// threads.  A planner remembers its last successful route for partial
/// recalculation.
pub struct RoutePlanner {
    cache:    Arc<RoadGraphTileCache>,
    profile:  Arc<dyn RoutingProfile>,
    config:   RoutingConfig,
    previous: Option<PreviousRoute>,
}

impl RoutePlanner {
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<RoadGraphTileCache> {
        &self.cache
    }

    pub fn profile(&self) -> &dyn RoutingProfile {
        &*self.profile
    }

    pub fn previous_route(&self) -> Option<&Route> {
        self.previous.as_ref().map(|p| &p.route)
    }

    pub fn forget_previous_route(&mut self) {
        self.previous = None;
    }

    /// Route through `waypoints` in order (start, intermediates…, target).
    ///
    /// # Errors
    ///
    /// Every failure reason of [`RoutingError`].  Snapping failures name the
    /// waypoint's position; search failures name the side that ran dry.
    pub fn calculate_route(
        &mut self,
        waypoints:            &[GeoPoint],
        left_side_navigation: bool,
        cancel:               &dyn Cancellation,
    ) -> RouteCalculationResult {
        if waypoints.len() < 2 {
            return Err(RoutingError::TooFewWaypoints(waypoints.len()));
        }
        let points = waypoints
            .iter()
            .map(|&g| Point31::from_geo(g))
            .collect::<Result<Vec<_>, _>>()?;

        let route = match self.partial_recalculation(&points, left_side_navigation, cancel)? {
            Some(route) => route,
            None => self.calculate_full(&points, left_side_navigation, cancel)?,
        };

        info!(
            legs = route.legs.len(),
            distance_m = route.distance_m,
            time_s = route.time_s,
            "route calculated"
        );
        if let Some(&target) = points.last() {
            self.previous = Some(PreviousRoute { route: route.clone(), target });
        }
        Ok(route)
    }

    fn calculate_full(
        &self,
        points:               &[Point31],
        left_side_navigation: bool,
        cancel:               &dyn Cancellation,
    ) -> RouteCalculationResult {
        let filter = ProfileFilter(&*self.profile);
        let mut loader = SpatialSegmentLoader::new(&self.cache, &filter);

        // Snap everything first so every search sees the final overlay.
        let mut snapped: Vec<(RoadId, Point31)> = Vec::with_capacity(points.len());
        for (i, &p) in points.iter().enumerate() {
            let Some(m) = loader.find_closest_road_point(p)? else {
                warn!(waypoint = i, point = %p, "waypoint not near any usable road");
                return Err(not_found(i, points.len()));
            };
            loader.insert_snapped(&m);
            snapped.push((m.road.id(), m.point));
        }

        let assembler = RouteAssembler::new(&*self.profile);
        let mut legs: Vec<RouteLeg> = Vec::new();
        let mut statistics = Vec::with_capacity(points.len() - 1);
        for pair in snapped.windows(2) {
            let (pair_legs, stats) = self.search_pair(&loader, &assembler, pair[0], pair[1], cancel)?;
            for leg in pair_legs {
                push_leg(&mut legs, leg);
            }
            statistics.extend(stats);
        }
        assembler.finish(legs, left_side_navigation, statistics)
    }

    /// One search between two snapped points.
    fn search_pair(
        &self,
        loader:    &SpatialSegmentLoader<'_>,
        assembler: &RouteAssembler<'_>,
        from:      (RoadId, Point31),
        to:        (RoadId, Point31),
        cancel:    &dyn Cancellation,
    ) -> RoutingResult<(Vec<RouteLeg>, Option<RouteStatistics>)> {
        let start = seeds(loader, from)?;
        let target = seeds(loader, to)?;

        if from.1 == to.1 {
            let c = &start[0];
            let leg = assembler.leg(Arc::clone(&c.road), c.point_index, c.point_index);
            return Ok((vec![leg], None));
        }

        let max_speed = f64::from(self.profile.params().max_speed_mps);
        let mut heuristic = HeuristicEstimator::new(max_speed, from.1, to.1);
        if self.config.use_border_lines {
            let area = Area31::point(from.1).including(to.1).expanded(BORDER_AREA_MARGIN);
            let samples = self.cache.border_samples(&area)?;
            heuristic = heuristic.with_border_lines(BorderLineTable::build(from.1, to.1, &samples));
            debug!(samples = samples.len(), active = heuristic.has_border_lines(), "border lines");
        }

        let mut engine = BidirectionalSearchEngine::new(
            loader,
            &*self.profile,
            &self.config,
            heuristic,
            &start,
            &target,
        );
        let meeting = engine.run(cancel)?;
        let legs = assembler.collect(engine.arena(), meeting)?;
        Ok((legs, Some(engine.statistics().clone())))
    }

    // ── Partial recalculation ────────────────────────────────────────────

    /// Re-plan only the head of the previous route when the new start is
    /// close to it and the target is unchanged.  `Ok(None)` means "do a full
    /// calculation".
    fn partial_recalculation(
        &self,
        points:               &[Point31],
        left_side_navigation: bool,
        cancel:               &dyn Cancellation,
    ) -> RoutingResult<Option<Route>> {
        let limit = self.config.partial_recalculation_distance_m;
        let (Some(previous), [start, target]) = (&self.previous, points) else {
            return Ok(None);
        };
        if limit <= 0.0 || previous.target != *target {
            return Ok(None);
        }

        let mut nearest: Option<(usize, f64)> = None;
        for (i, leg) in previous.route.legs.iter().enumerate() {
            for p in leg.points() {
                let d = start.distance_m(p);
                if d <= limit && nearest.is_none_or(|(_, best)| d < best) {
                    nearest = Some((i, d));
                }
            }
        }
        let Some((i, _)) = nearest else {
            return Ok(None);
        };
        let legs = &previous.route.legs;
        if i + 1 >= legs.len() {
            return Ok(None);
        }

        let rejoin = legs[i].exit_point();
        let head = match self.calculate_full(&[*start, rejoin], left_side_navigation, cancel) {
            Ok(head) => head,
            Err(RoutingError::Aborted) => return Err(RoutingError::Aborted),
            Err(e) => {
                debug!(error = %e, "partial recalculation failed, planning in full");
                return Ok(None);
            }
        };

        let mut merged = head.legs;
        for leg in legs[i + 1..].iter().cloned() {
            push_leg(&mut merged, leg);
        }
        let assembler = RouteAssembler::new(&*self.profile);
        match assembler.finish(merged, left_side_navigation, head.statistics) {
            Ok(route) => {
                debug!(reused_legs = legs.len() - i - 1, "partial recalculation");
                Ok(Some(route))
            }
            Err(e) => {
                debug!(error = %e, "partial route did not join, planning in full");
                Ok(None)
            }
        }
    }
}

/// Every road through a snapped point, the snapped road first.
fn seeds(loader: &SpatialSegmentLoader<'_>, (road, p): (RoadId, Point31)) -> RoutingResult<Vec<Candidate>> {
    let snapped = loader.resolve(road, p).ok_or_else(|| {
        RoutingError::RouteNotCalculated(format!("snapped point {p} is missing from {road}"))
    })?;
    let mut out = vec![snapped];
    for c in loader.load_candidates_at(p)? {
        if c.road_id() != road {
            out.push(c);
        }
    }
    Ok(out)
}

fn not_found(index: usize, count: usize) -> RoutingError {
    match index {
        0 => RoutingError::StartPointNotFound,
        i if i + 1 == count => RoutingError::EndPointNotFound,
        i => RoutingError::IntermediatePointNotFound { index: i },
    }
}
