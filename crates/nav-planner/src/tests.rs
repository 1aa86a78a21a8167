//! Unit tests for nav-planner.
//!
//! Every graph is built in memory around lon 0 / lat 0, where one 31-bit
//! unit is about 1.9 cm, so 1 000 units ≈ 18.7 m.  `y` grows southwards.

#[cfg(test)]
mod helpers {
    use std::sync::Arc;

    use nav_core::{GeoPoint, Point31, PointTag, Road, RoadBuilder, RoadClass, RoadDirection, RoadId};
    use nav_graph::{MemoryReader, MemoryReaderBuilder, RoadGraphTileCache, TileCacheConfig};

    use crate::{ProfileParams, RoutePlanner, RoutePlannerBuilder, RoutingConfig, RoutingProfile};

    pub const BASE: i64 = 1 << 30;

    pub fn pt(dx: i64, dy: i64) -> Point31 {
        Point31::new((BASE + dx) as u32, (BASE + dy) as u32)
    }

    pub fn geo(dx: i64, dy: i64) -> GeoPoint {
        pt(dx, dy).to_geo()
    }

    /// Same point up to the rounding of a geo round trip.
    pub fn near(a: Point31, b: Point31) -> bool {
        (i64::from(a.x) - i64::from(b.x)).abs() <= 2 && (i64::from(a.y) - i64::from(b.y)).abs() <= 2
    }

    pub fn way(id: u64, points: &[(i64, i64)]) -> RoadBuilder {
        RoadBuilder::new(RoadId(id)).points(points.iter().map(|&(x, y)| pt(x, y)))
    }

    pub fn reader(roads: Vec<Road>) -> MemoryReader {
        let mut b = MemoryReaderBuilder::new(12);
        for r in roads {
            b.add_road(r);
        }
        b.build()
    }

    pub fn cache(reader: MemoryReader) -> Arc<RoadGraphTileCache> {
        Arc::new(RoadGraphTileCache::new(Arc::new(reader), TileCacheConfig::default()))
    }

    pub fn planner(reader: MemoryReader, config: RoutingConfig) -> RoutePlanner {
        planner_on(cache(reader), config)
    }

    pub fn planner_on(cache: Arc<RoadGraphTileCache>, config: RoutingConfig) -> RoutePlanner {
        RoutePlannerBuilder::new(cache, Arc::new(TestProfile::new()))
            .config(config)
            .build()
            .unwrap()
    }

    /// 10 m/s everywhere, no turn costs, footways rejected, barriers block.
    pub struct TestProfile {
        params: ProfileParams,
    }

    impl TestProfile {
        pub fn new() -> Self {
            Self {
                params: ProfileParams {
                    max_speed_mps:      10.0,
                    default_speed_mps:  10.0,
                    left_turn_s:        0.0,
                    right_turn_s:       0.0,
                    roundabout_turn_s:  0.0,
                    restrictions_aware: true,
                },
            }
        }
    }

    impl RoutingProfile for TestProfile {
        fn params(&self) -> &ProfileParams {
            &self.params
        }

        fn accepts_road(&self, road: &Road) -> bool {
            road.class() != RoadClass::Footway
        }

        fn speed(&self, _road: &Road) -> f32 {
            10.0
        }

        fn obstacle_time(&self, road: &Road, index: u32) -> f32 {
            if road.has_tag(index, PointTag::Barrier) { -1.0 } else { 0.0 }
        }
    }

    /// Two one-way streets joined by three two-way cross streets.
    ///
    /// ```text
    ///  (0,0) ──▶── (1000,0) ──▶── (2000,0) ──▶── (3000,0)    road 1, eastbound
    ///    │                          │               │
    ///  road 4                     road 3          road 5
    ///    │                          │               │
    ///  (0,1000) ──◀── (1000,1000) ──◀── (2000,1000) ──◀── (3000,1000)   road 2, westbound
    /// ```
    pub fn grid_roads() -> Vec<Road> {
        vec![
            way(1, &[(0, 0), (1_000, 0), (2_000, 0), (3_000, 0)])
                .direction(RoadDirection::OneWayForward)
                .build()
                .unwrap(),
            way(2, &[(3_000, 1_000), (2_000, 1_000), (1_000, 1_000), (0, 1_000)])
                .direction(RoadDirection::OneWayForward)
                .build()
                .unwrap(),
            way(3, &[(2_000, 0), (2_000, 1_000)]).build().unwrap(),
            way(4, &[(0, 1_000), (0, 0)]).build().unwrap(),
            way(5, &[(3_000, 0), (3_000, 1_000)]).build().unwrap(),
        ]
    }

    pub fn grid() -> MemoryReader {
        reader(grid_roads())
    }

    /// A junction J = (1000,0) with a block north-east of it.
    ///
    /// ```text
    ///            (1000,-1000) ──── road 34 ──── (2000,-1000)
    ///                 │                              │
    ///              road 31                        road 33
    ///                 │                              │
    ///  (0,0) ─ road 30 ─ J ───────── road 32 ─────── (2000,0)
    /// ```
    ///
    /// `restrict` adds one restriction authored on road 30.
    pub fn junction(restrict: Option<(u64, nav_core::RestrictionKind)>) -> MemoryReader {
        let mut w = way(30, &[(0, 0), (1_000, 0)]);
        if let Some((to, kind)) = restrict {
            w = w.restriction(RoadId(to), kind);
        }
        reader(vec![
            w.build().unwrap(),
            way(31, &[(1_000, 0), (1_000, -1_000)]).build().unwrap(),
            way(32, &[(1_000, 0), (2_000, 0)]).build().unwrap(),
            way(33, &[(2_000, 0), (2_000, -1_000)]).build().unwrap(),
            way(34, &[(2_000, -1_000), (1_000, -1_000)]).build().unwrap(),
        ])
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod config {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::helpers::{TestProfile, cache, grid};
    use crate::{
        CarProfile, ProfileParams, RoutePlannerBuilder, RoutingConfig, RoutingError, RoutingProfile,
        SearchDirection,
    };

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_validate() {
        let c = RoutingConfig::default();
        assert_eq!(c.heuristic_coefficient, 1.0);
        assert_eq!(c.direction, SearchDirection::Bidirectional);
        assert_eq!(c.memory_limit_bytes, 256 * 1024 * 1024);
        assert!(!c.use_border_lines);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn attributes_are_parsed() {
        let c = RoutingConfig::from_attributes(&attrs(&[
            ("heuristicCoefficient", "1.5"),
            ("planRoadDirection", "-1"),
            ("memoryLimitMb", "64"),
            ("recalculateDistanceHelp", "100"),
            ("useBorderLines", "true"),
            ("somethingElse", "ignored"),
        ]))
        .unwrap();
        assert_eq!(c.heuristic_coefficient, 1.5);
        assert_eq!(c.direction, SearchDirection::ReverseOnly);
        assert_eq!(c.memory_limit_bytes, 64 * 1024 * 1024);
        assert_eq!(c.partial_recalculation_distance_m, 100.0);
        assert!(c.use_border_lines);

        let c = RoutingConfig::from_attributes(&attrs(&[("planRoadDirection", "2")])).unwrap();
        assert_eq!(c.direction, SearchDirection::ForwardOnly);
    }

    #[test]
    fn bad_attributes_are_rejected() {
        let err = RoutingConfig::from_attributes(&attrs(&[("heuristicCoefficient", "fast")]));
        assert!(matches!(err, Err(RoutingError::Config(_))));
        let err = RoutingConfig::from_attributes(&attrs(&[("heuristicCoefficient", "-2")]));
        assert!(matches!(err, Err(RoutingError::Config(_))));
        let err = RoutingConfig::from_attributes(&attrs(&[("memoryLimitMb", "0")]));
        assert!(matches!(err, Err(RoutingError::Config(_))));
    }

    #[test]
    fn builder_rejects_unusable_profiles() {
        let bad = [
            ProfileParams { max_speed_mps: 0.0, ..ProfileParams::default() },
            ProfileParams { max_speed_mps: f32::INFINITY, ..ProfileParams::default() },
            ProfileParams { default_speed_mps: f32::NAN, ..ProfileParams::default() },
            ProfileParams { left_turn_s: -1.0, ..ProfileParams::default() },
        ];
        for params in bad {
            let built = RoutePlannerBuilder::new(cache(grid()), Arc::new(CarProfile::with_params(params.clone())))
                .build();
            assert!(matches!(built, Err(RoutingError::Config(_))), "{params:?} accepted");
        }
        assert!(ProfileParams::default().validate().is_ok());
        assert!(CarProfile::new().params().validate().is_ok());
    }

    #[test]
    fn builder_validates() {
        let built = RoutePlannerBuilder::new(cache(grid()), Arc::new(TestProfile::new()))
            .heuristic_coefficient(f64::NAN)
            .build();
        assert!(matches!(built, Err(RoutingError::Config(_))));

        let built = RoutePlannerBuilder::new(cache(grid()), Arc::new(TestProfile::new()))
            .memory_limit_bytes(1 << 20)
            .initial_heading(Some(0.0))
            .build();
        assert!(built.is_ok());
    }
}

// ── Profile ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod profile {
    use nav_core::{PointTag, RoadClass};

    use super::helpers::way;
    use crate::profile::effective_speed;
    use crate::{CarProfile, RoutingProfile};

    #[test]
    fn car_accepts_motor_roads_only() {
        let car = CarProfile::new();
        let street = way(1, &[(0, 0), (10, 0)]).class(RoadClass::Residential).build().unwrap();
        let path = way(2, &[(0, 0), (10, 0)]).class(RoadClass::Footway).build().unwrap();
        assert!(car.accepts_road(&street));
        assert!(!car.accepts_road(&path));
    }

    #[test]
    fn posted_limit_beats_class_table() {
        let car = CarProfile::new();
        let plain = way(1, &[(0, 0), (10, 0)]).class(RoadClass::Primary).build().unwrap();
        let posted = way(2, &[(0, 0), (10, 0)])
            .class(RoadClass::Primary)
            .max_speed_mps(5.0)
            .build()
            .unwrap();
        assert!((car.speed(&plain) - 20.1).abs() < 1e-6);
        assert_eq!(car.speed(&posted), 5.0);
        assert!(effective_speed(&car, &posted) <= 5.0 + 1e-9);
    }

    #[test]
    fn obstacles_from_point_tags() {
        let car = CarProfile::new();
        let r = way(1, &[(0, 0), (10, 0), (20, 0), (30, 0)])
            .tag(1, PointTag::TrafficSignals)
            .tag(2, PointTag::Barrier)
            .build()
            .unwrap();
        assert_eq!(car.obstacle_time(&r, 0), 0.0);
        assert_eq!(car.obstacle_time(&r, 1), 2.0);
        assert!(car.obstacle_time(&r, 2) < 0.0);
    }
}

// ── Frontier ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod frontier {
    use nav_core::RoadId;

    use crate::frontier::Frontier;
    use crate::segment::{RoutePointId, SearchSide, SegmentId};

    #[test]
    fn push_again_is_decrease_key() {
        let mut f = Frontier::new(SearchSide::Forward);
        f.push(SegmentId(0), 10.0, 0.0, 1.0);
        f.push(SegmentId(1), 20.0, 0.0, 1.0);
        f.push(SegmentId(1), 5.0, 0.0, 1.0);
        assert_eq!(f.len(), 2);
        assert_eq!(f.pop(), Some(SegmentId(1)));
        assert_eq!(f.pop(), Some(SegmentId(0)));
        assert!(f.is_empty());
    }

    #[test]
    fn ties_prefer_lower_cost_then_insertion() {
        let mut f = Frontier::new(SearchSide::Reverse);
        f.push(SegmentId(0), 8.0, 2.0, 1.0);
        f.push(SegmentId(1), 5.0, 5.0, 1.0);
        f.push(SegmentId(2), 5.0, 5.0, 1.0);
        assert_eq!(f.peek(), Some(SegmentId(1)));
        assert_eq!(f.pop(), Some(SegmentId(1)));
        assert_eq!(f.pop(), Some(SegmentId(2)));
        assert_eq!(f.pop(), Some(SegmentId(0)));
    }

    #[test]
    fn first_visit_owns_the_interval() {
        let mut f = Frontier::new(SearchSide::Forward);
        let key = RoutePointId::new(RoadId(7), 3, true);
        f.visit(key, SegmentId(4));
        f.visit(key, SegmentId(9));
        assert_eq!(f.visited_by(key), Some(SegmentId(4)));
        assert!(!f.is_visited(RoutePointId::new(RoadId(7), 3, false)));
    }
}

// ── Restrictions ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod restrictions {
    use std::sync::Arc;

    use nav_core::{RestrictionKind, Road, RoadId};
    use nav_graph::Candidate;

    use super::helpers::way;
    use crate::TurnRestrictionResolver;

    fn at(road: &Road) -> Candidate {
        Candidate { road: Arc::new(road.clone()), point_index: 0 }
    }

    fn ids(cs: &[Candidate]) -> Vec<u64> {
        cs.iter().map(|c| c.road_id().0).collect()
    }

    fn roads(from_restriction: Option<(u64, RestrictionKind)>) -> (Road, Road, Road) {
        let mut w = way(1, &[(0, 0), (100, 0)]);
        if let Some((to, kind)) = from_restriction {
            w = w.restriction(RoadId(to), kind);
        }
        let n = way(2, &[(100, 0), (100, -100)]).build().unwrap();
        let e = way(3, &[(100, 0), (200, 0)]).build().unwrap();
        (w.build().unwrap(), n, e)
    }

    #[test]
    fn forward_prohibitive_drops_target() {
        let (w, n, e) = roads(Some((2, RestrictionKind::NoLeftTurn)));
        let out = TurnRestrictionResolver::new(true).resolve(&w, vec![at(&w), at(&n), at(&e)], false);
        assert_eq!(ids(&out), vec![1, 3]);
    }

    #[test]
    fn forward_exclusive_keeps_only_target() {
        let (w, n, e) = roads(Some((3, RestrictionKind::OnlyStraightOn)));
        let out = TurnRestrictionResolver::new(true).resolve(&w, vec![at(&w), at(&n), at(&e)], false);
        assert_eq!(ids(&out), vec![3]);
    }

    #[test]
    fn forward_exclusive_elsewhere_does_not_apply() {
        // The "only" target does not meet this junction.
        let (w, n, e) = roads(Some((99, RestrictionKind::OnlyRightTurn)));
        let out = TurnRestrictionResolver::new(true).resolve(&w, vec![at(&n), at(&e)], false);
        assert_eq!(ids(&out), vec![2, 3]);
    }

    #[test]
    fn reverse_prohibitive_drops_source() {
        // Searching backwards along road 2: may the vehicle have come from 1?
        let (w, n, e) = roads(Some((2, RestrictionKind::NoLeftTurn)));
        let out = TurnRestrictionResolver::new(true).resolve(&n, vec![at(&w), at(&n), at(&e)], true);
        assert_eq!(ids(&out), vec![2, 3]);
    }

    #[test]
    fn reverse_forced_elsewhere_drops_source() {
        let (w, n, e) = roads(Some((3, RestrictionKind::OnlyStraightOn)));
        let out = TurnRestrictionResolver::new(true).resolve(&n, vec![at(&w), at(&n), at(&e)], true);
        assert_eq!(ids(&out), vec![2, 3]);

        // Without road 3 at this junction the "only" turn says nothing here.
        let out = TurnRestrictionResolver::new(true).resolve(&n, vec![at(&w), at(&n)], true);
        assert_eq!(ids(&out), vec![1, 2]);
    }

    #[test]
    fn reverse_exclusive_towards_us_keeps_source() {
        let (w, n, e) = roads(Some((2, RestrictionKind::OnlyLeftTurn)));
        let out = TurnRestrictionResolver::new(true).resolve(&n, vec![at(&w), at(&e)], true);
        assert_eq!(ids(&out), vec![1, 3]);
    }

    #[test]
    fn unaware_resolver_passes_everything() {
        let (w, n, e) = roads(Some((2, RestrictionKind::NoLeftTurn)));
        let out = TurnRestrictionResolver::new(false).resolve(&w, vec![at(&w), at(&n), at(&e)], false);
        assert_eq!(ids(&out), vec![1, 2, 3]);
    }
}

// ── Heuristic ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod heuristic {
    use nav_core::RoadId;
    use nav_graph::BorderSample;

    use super::helpers::pt;
    use crate::segment::SearchSide;
    use crate::{BorderLineTable, HeuristicEstimator};

    fn sample(x: i64, y: i64) -> BorderSample {
        BorderSample { point: pt(x, y), road: RoadId(1) }
    }

    #[test]
    fn straight_line_at_max_speed() {
        let (a, b) = (pt(0, 0), pt(3_000, 4_000));
        let h = HeuristicEstimator::new(10.0, a, b);
        let expected = a.distance_m(b) / 10.0;
        assert!((h.estimate(a, b) - expected).abs() < 1e-9);
        assert!((h.estimate_towards(a, SearchSide::Forward) - expected).abs() < 1e-9);
        assert!((h.estimate_towards(b, SearchSide::Reverse) - expected).abs() < 1e-9);
    }

    #[test]
    fn border_line_forces_detour() {
        let (start, target) = (pt(0, 0), pt(0, 20_000));
        // One crossing, far to the east of the straight line.
        let table = BorderLineTable::build(start, target, &[sample(50_000, 10_000)]);
        assert_eq!(table.lines().len(), 1);

        let straight = start.distance_m(target);
        let refined = table.refine(start, SearchSide::Forward, straight);
        let via = start.distance_m(pt(50_000, 10_000)) + pt(50_000, 10_000).distance_m(target);
        assert!(refined > straight);
        assert!(refined <= via + 1e-6, "never above the true detour");

        // Same bound from the other end.
        let back = table.refine(target, SearchSide::Reverse, straight);
        assert!((back - refined).abs() < 1e-6);

        let h = HeuristicEstimator::new(10.0, start, target).with_border_lines(table);
        assert!(h.has_border_lines());
        assert!((h.estimate_towards(start, SearchSide::Forward) - refined / 10.0).abs() < 1e-9);
    }

    #[test]
    fn same_side_keeps_straight_line() {
        let (start, target) = (pt(0, 0), pt(0, 20_000));
        let table = BorderLineTable::build(start, target, &[sample(50_000, 10_000)]);
        let p = pt(100, 15_000);
        let straight = p.distance_m(target);
        assert_eq!(table.refine(p, SearchSide::Forward, straight), straight);
    }

    #[test]
    fn samples_outside_the_box_are_ignored() {
        let (start, target) = (pt(0, 0), pt(0, 20_000));
        let table = BorderLineTable::build(start, target, &[sample(0, 30_000), sample(0, -5)]);
        assert!(table.is_empty());
        let h = HeuristicEstimator::new(10.0, start, target).with_border_lines(table);
        assert!(!h.has_border_lines());
    }
}

// ── Search scenarios ──────────────────────────────────────────────────────────

#[cfg(test)]
mod search {
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use nav_core::{RestrictionKind, RoadId};
    use nav_graph::{AcceptAll, MemoryReaderBuilder, RoadGraphTileCache, SpatialSegmentLoader, TileCacheConfig};

    use super::helpers::{
        TestProfile, geo, grid, grid_roads, junction, near, planner, pt, reader, way,
    };
    use crate::segment::SegmentId;
    use crate::{
        BidirectionalSearchEngine, HeuristicEstimator, NeverCancel, Route, RoutingConfig,
        RoutingError, SearchDirection, SearchState,
    };

    fn ids(route: &Route) -> Vec<u64> {
        route.road_ids().iter().map(|r| r.0).collect()
    }

    fn assert_contiguous(route: &Route) {
        for w in route.legs.windows(2) {
            assert_eq!(w[0].exit_point(), w[1].entry_point());
        }
    }

    #[test]
    fn parallel_one_ways_use_the_cross_street() {
        let mut p = planner(grid(), RoutingConfig::default());
        let route = p.calculate_route(&[geo(500, 10), geo(500, 990)], false, &NeverCancel).unwrap();

        assert_eq!(ids(&route), vec![1, 3, 2]);
        assert_contiguous(&route);
        assert!(route.legs.iter().all(|l| l.is_forward()));
        assert!(near(route.first_point().unwrap(), pt(500, 0)));
        assert!(near(route.last_point().unwrap(), pt(500, 1_000)));
        assert_eq!(route.first_point().unwrap().y, pt(0, 0).y, "projected onto road 1");

        let expected = route.points().windows(2).map(|w| w[0].distance_m(w[1])).sum::<f64>();
        assert!((route.distance_m - expected).abs() < 1e-6);
        assert!((route.time_s - route.distance_m / 10.0).abs() < 1e-6);
        assert_eq!(route.statistics.len(), 1);
        assert!(route.statistics[0].meeting_cost.is_some());
    }

    #[test]
    fn one_way_is_never_driven_backwards() {
        // West along eastbound road 1 is only possible around the block.
        let mut p = planner(grid(), RoutingConfig::default());
        let route = p.calculate_route(&[geo(2_500, 10), geo(500, 10)], false, &NeverCancel).unwrap();

        assert_eq!(ids(&route), vec![1, 5, 2, 4, 1]);
        assert_contiguous(&route);
        for leg in route.legs.iter().filter(|l| l.road_id().0 <= 2) {
            assert!(leg.is_forward(), "one-way leg {leg:?} driven against its direction");
        }
    }

    #[test]
    fn same_road_gives_one_leg() {
        let r = reader(vec![way(10, &[(0, 0), (1_000, 0), (2_000, 0), (3_000, 0)]).build().unwrap()]);
        let mut p = planner(r, RoutingConfig::default());
        let route = p.calculate_route(&[geo(500, 10), geo(2_500, 10)], false, &NeverCancel).unwrap();

        assert_eq!(route.legs.len(), 1);
        let leg = &route.legs[0];
        assert_eq!(leg.road_id(), RoadId(10));
        assert!(leg.is_forward());
        let along = leg.road.distance_between(leg.start_index, leg.end_index);
        assert!((route.distance_m - along).abs() < 1e-9);
        assert!((route.distance_m - pt(500, 0).distance_m(pt(2_500, 0))).abs() < 0.2);

        // Backwards along the same two-way road.
        let back = p.calculate_route(&[geo(2_500, 10), geo(500, 10)], false, &NeverCancel).unwrap();
        assert_eq!(back.legs.len(), 1);
        assert!(!back.legs[0].is_forward());
    }

    #[test]
    fn direction_override_finds_meetings_from_the_seed_expansions() {
        let modes = [
            SearchDirection::Bidirectional,
            SearchDirection::ForwardOnly,
            SearchDirection::ReverseOnly,
        ];
        for direction in modes {
            let config = RoutingConfig { direction, ..RoutingConfig::default() };

            // One road, no junctions: the frontiers meet while the reverse
            // seed is expanded.
            let r = reader(vec![way(10, &[(0, 0), (1_000, 0), (2_000, 0), (3_000, 0)]).build().unwrap()]);
            let mut p = planner(r, config.clone());
            let route = p
                .calculate_route(&[geo(500, 10), geo(2_500, 10)], false, &NeverCancel)
                .unwrap_or_else(|e| panic!("{direction:?}: {e}"));
            assert_eq!(route.legs.len(), 1, "{direction:?}");
            let leg = &route.legs[0];
            assert!(leg.is_forward());
            let along = leg.road.distance_between(leg.start_index, leg.end_index);
            assert!((route.distance_m - along).abs() < 1e-9);
            assert!((route.distance_m - pt(500, 0).distance_m(pt(2_500, 0))).abs() < 0.2);

            // Same, on a one-way street that also has junctions further on.
            let mut p = planner(grid(), config);
            let route = p
                .calculate_route(&[geo(500, 10), geo(1_500, 10)], false, &NeverCancel)
                .unwrap_or_else(|e| panic!("{direction:?}: {e}"));
            assert_eq!(ids(&route), vec![1], "{direction:?}");
            assert_eq!(route.legs.len(), 1, "{direction:?}");
            assert!(route.legs[0].is_forward());
            assert!(route.statistics[0].meeting_cost.is_some());
        }
    }

    #[test]
    fn identical_waypoints_give_zero_length_route() {
        let mut p = planner(grid(), RoutingConfig::default());
        let route = p.calculate_route(&[geo(500, 10), geo(500, 10)], false, &NeverCancel).unwrap();
        assert_eq!(route.legs.len(), 1);
        assert_eq!(route.distance_m, 0.0);
        assert_eq!(route.first_point(), route.last_point());
    }

    #[test]
    fn disconnected_roads_fail_from_start() {
        let r = || {
            reader(vec![
                way(20, &[(0, 0), (1_000, 0)]).build().unwrap(),
                way(21, &[(0, 5_000), (1_000, 5_000)]).build().unwrap(),
            ])
        };
        let mut p = planner(r(), RoutingConfig::default());
        let err = p.calculate_route(&[geo(500, 10), geo(500, 4_990)], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::NoRouteFromStart), "got {err}");

        let mut again = planner(r(), RoutingConfig::default());
        let err = again.calculate_route(&[geo(500, 10), geo(500, 4_990)], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::NoRouteFromStart));
        assert!(again.previous_route().is_none());
    }

    #[test]
    fn isolated_target_fails_to_target() {
        let mut roads = grid_roads();
        roads.push(way(21, &[(0, 5_000), (1_000, 5_000)]).build().unwrap());
        let mut p = planner(reader(roads), RoutingConfig::default());
        let err = p.calculate_route(&[geo(500, 10), geo(500, 4_990)], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::NoRouteToTarget), "got {err}");
    }

    #[test]
    fn unrestricted_junction_turns_directly() {
        let mut p = planner(junction(None), RoutingConfig::default());
        let route = p.calculate_route(&[geo(500, 10), geo(1_010, -500)], false, &NeverCancel).unwrap();
        assert_eq!(ids(&route), vec![30, 31]);
    }

    #[test]
    fn restrictions_hold_in_every_direction_mode() {
        let kinds = [
            (31, RestrictionKind::NoLeftTurn),
            (32, RestrictionKind::OnlyStraightOn),
        ];
        let modes = [
            SearchDirection::Bidirectional,
            SearchDirection::ForwardOnly,
            SearchDirection::ReverseOnly,
        ];
        for restriction in kinds {
            for direction in modes {
                let config = RoutingConfig { direction, ..RoutingConfig::default() };
                let mut p = planner(junction(Some(restriction)), config);
                let route = p
                    .calculate_route(&[geo(500, 10), geo(1_010, -500)], false, &NeverCancel)
                    .unwrap();
                assert_eq!(
                    ids(&route),
                    vec![30, 32, 33, 34, 31],
                    "{restriction:?} searching {direction:?}"
                );
                assert_contiguous(&route);
            }
        }
    }

    #[test]
    fn barrier_blocks_the_road() {
        use nav_core::PointTag;
        let r = reader(vec![
            way(10, &[(0, 0), (1_000, 0), (2_000, 0)]).tag(1, PointTag::Barrier).build().unwrap(),
        ]);
        let mut p = planner(r, RoutingConfig::default());
        let err = p.calculate_route(&[geo(500, 10), geo(1_500, 10)], false, &NeverCancel);
        assert!(err.is_err());
    }

    #[test]
    fn results_are_deterministic() {
        let run = || {
            let mut p = planner(grid(), RoutingConfig::default());
            p.calculate_route(&[geo(2_500, 10), geo(500, 10)], false, &NeverCancel).unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(ids(&a), ids(&b));
        let spans = |r: &Route| r.legs.iter().map(|l| (l.start_index, l.end_index)).collect::<Vec<_>>();
        assert_eq!(spans(&a), spans(&b));
        let (sa, sb) = (&a.statistics[0], &b.statistics[0]);
        assert_eq!(sa.forward_iterations, sb.forward_iterations);
        assert_eq!(sa.backward_iterations, sb.backward_iterations);
        assert_eq!(sa.segments_created, sb.segments_created);
        assert_eq!(sa.meeting_cost, sb.meeting_cost);
    }

    #[test]
    fn costs_never_decrease_along_parent_chains() {
        let cache = RoadGraphTileCache::new(Arc::new(grid()), TileCacheConfig::default());
        let profile = TestProfile::new();
        let config = RoutingConfig::default();
        let mut loader = SpatialSegmentLoader::new(&cache, &AcceptAll);

        let a = loader.find_closest_road_point(pt(2_500, 10)).unwrap().unwrap();
        let b = loader.find_closest_road_point(pt(500, 10)).unwrap().unwrap();
        let ra = loader.insert_snapped(&a);
        let rb = loader.insert_snapped(&b);
        let start = loader.resolve(ra.id(), a.point).unwrap();
        let target = loader.resolve(rb.id(), b.point).unwrap();

        let heuristic = HeuristicEstimator::new(10.0, a.point, b.point);
        let mut engine =
            BidirectionalSearchEngine::new(&loader, &profile, &config, heuristic, &[start], &[target]);
        assert_eq!(engine.state(), SearchState::Initialized);
        let meeting = engine.run(&NeverCancel).unwrap();
        assert_eq!(engine.state(), SearchState::Found);

        let arena = engine.arena();
        assert!(arena.get(meeting).is_meeting());
        for i in 0..arena.len() {
            let s = arena.get(SegmentId(i as u32));
            let Some(p) = s.parent else { continue };
            let p = arena.get(p);
            assert!(s.distance_from_start + 1e-9 >= p.distance_from_start);
            if !s.is_meeting() {
                // No turn costs: a child costs its parent plus the piece walked.
                let piece = p.road.distance_between(p.point_index, s.parent_end_point) / 10.0;
                assert!(
                    (s.distance_from_start - p.distance_from_start - piece).abs() < 1e-6,
                    "segment {i} carries a stale cost"
                );
            }
        }
        let stats = engine.statistics();
        assert_eq!(stats.segments_created, arena.len());
        assert!(stats.forward_iterations >= 1 && stats.backward_iterations >= 1);
    }

    #[test]
    fn memory_limit_stops_the_search() {
        let config = RoutingConfig { memory_limit_bytes: 1, ..RoutingConfig::default() };
        let mut p = planner(grid(), config);
        let err = p.calculate_route(&[geo(500, 10), geo(500, 990)], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::MemoryLimitExceeded { limit: 1 }));
    }

    #[test]
    fn raised_flag_aborts() {
        let mut p = planner(grid(), RoutingConfig::default());
        let flag = AtomicBool::new(true);
        let err = p.calculate_route(&[geo(500, 10), geo(500, 990)], false, &flag).unwrap_err();
        assert!(matches!(err, RoutingError::Aborted));
    }

    #[test]
    fn reader_failure_is_graph_load_error() {
        let mut b = MemoryReaderBuilder::new(12);
        for r in grid_roads() {
            b.add_road(r);
        }
        b.corrupt_subsection_at(pt(0, 0));
        let mut p = planner(b.build(), RoutingConfig::default());
        let err = p.calculate_route(&[geo(500, 10), geo(500, 990)], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::GraphLoadError(_)), "got {err}");
    }

    #[test]
    fn snapping_failures_name_the_waypoint() {
        let far = geo(-3_000_000, 0);
        let mut p = planner(grid(), RoutingConfig::default());

        let err = p.calculate_route(&[far, geo(500, 990)], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::StartPointNotFound));

        let err = p.calculate_route(&[geo(500, 10), far], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::EndPointNotFound));

        let err = p
            .calculate_route(&[geo(500, 10), far, geo(500, 990)], false, &NeverCancel)
            .unwrap_err();
        assert!(matches!(err, RoutingError::IntermediatePointNotFound { index: 1 }));
    }

    #[test]
    fn malformed_requests_are_rejected() {
        let mut p = planner(grid(), RoutingConfig::default());
        let err = p.calculate_route(&[geo(500, 10)], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::TooFewWaypoints(1)));

        let bad = nav_core::GeoPoint::new(f64::NAN, 0.0);
        let err = p.calculate_route(&[bad, geo(500, 990)], false, &NeverCancel).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidWaypoint(_)));
    }

    #[test]
    fn intermediate_waypoint_is_visited() {
        let mut p = planner(grid(), RoutingConfig::default());
        let route = p
            .calculate_route(&[geo(500, 10), geo(2_010, 500), geo(500, 990)], true, &NeverCancel)
            .unwrap();

        assert_eq!(ids(&route), vec![1, 3, 2], "legs through the waypoint merge");
        assert_contiguous(&route);
        assert!(route.left_side_navigation);
        assert_eq!(route.statistics.len(), 2);
        assert!(route.points().iter().any(|&q| near(q, pt(2_000, 500))));
    }

    #[test]
    fn heading_penalty_applies_against_heading() {
        use std::f64::consts::FRAC_PI_2;
        let cost = |heading: f64| {
            let r = reader(vec![way(40, &[(0, 0), (1_000, 0), (2_000, 0)]).build().unwrap()]);
            let config = RoutingConfig { initial_heading: Some(heading), ..RoutingConfig::default() };
            let mut p = planner(r, config);
            let route = p.calculate_route(&[geo(500, 10), geo(1_500, 10)], false, &NeverCancel).unwrap();
            route.statistics[0].meeting_cost.unwrap()
        };
        let east = cost(FRAC_PI_2);
        let west = cost(-FRAC_PI_2);
        assert!((west - east - crate::WRONG_HEADING_PENALTY_S).abs() < 1e-6, "{east} vs {west}");
    }

    #[test]
    fn border_lines_keep_the_route() {
        use nav_graph::BorderSample;
        let mut b = MemoryReaderBuilder::new(12);
        for r in grid_roads() {
            b.add_road(r);
        }
        b.add_border_sample(BorderSample { point: pt(2_000, 500), road: RoadId(3) });
        let config = RoutingConfig { use_border_lines: true, ..RoutingConfig::default() };
        let mut p = planner(b.build(), config);
        let route = p.calculate_route(&[geo(500, 10), geo(500, 990)], false, &NeverCancel).unwrap();
        assert_eq!(ids(&route), vec![1, 3, 2]);
    }

    #[test]
    fn planners_share_a_cache_across_threads() {
        let cache = super::helpers::cache(grid());
        let routes: Vec<Vec<u64>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    s.spawn(move || {
                        let mut p = super::helpers::planner_on(cache, RoutingConfig::default());
                        let r = p
                            .calculate_route(&[geo(500, 10), geo(500, 990)], false, &NeverCancel)
                            .unwrap();
                        ids(&r)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(routes.iter().all(|r| *r == vec![1, 3, 2]));
        assert!(cache.stats().loaded_tiles >= 1);
    }
}

// ── Partial recalculation ─────────────────────────────────────────────────────

#[cfg(test)]
mod recalculation {
    use std::sync::Arc;

    use super::helpers::{geo, grid, near, planner, pt};
    use crate::{NeverCancel, RoutingConfig};

    fn config() -> RoutingConfig {
        RoutingConfig { partial_recalculation_distance_m: 50.0, ..RoutingConfig::default() }
    }

    #[test]
    fn nearby_start_reuses_the_tail() {
        let mut p = planner(grid(), config());
        let first = p.calculate_route(&[geo(500, 10), geo(500, 990)], false, &NeverCancel).unwrap();
        assert_eq!(first.legs.len(), 3);

        let second = p.calculate_route(&[geo(1_500, 10), geo(500, 990)], false, &NeverCancel).unwrap();
        let ids: Vec<u64> = second.road_ids().iter().map(|r| r.0).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert!(near(second.first_point().unwrap(), pt(1_500, 0)));
        assert!(Arc::ptr_eq(&second.legs[2].road, &first.legs[2].road), "tail leg reused");
        assert!(Arc::ptr_eq(&p.previous_route().unwrap().legs[2].road, &second.legs[2].road));
    }

    #[test]
    fn distant_start_or_new_target_plans_in_full() {
        let mut p = planner(grid(), config());
        let first = p.calculate_route(&[geo(500, 10), geo(500, 990)], false, &NeverCancel).unwrap();

        // Different target.
        let other = p.calculate_route(&[geo(1_500, 10), geo(1_500, 990)], false, &NeverCancel).unwrap();
        assert!(!other.legs.iter().any(|l| Arc::ptr_eq(&l.road, &first.legs[2].road)));

        // Disabled entirely.
        let mut q = planner(grid(), RoutingConfig::default());
        let a = q.calculate_route(&[geo(500, 10), geo(500, 990)], false, &NeverCancel).unwrap();
        let b = q.calculate_route(&[geo(1_500, 10), geo(500, 990)], false, &NeverCancel).unwrap();
        assert!(!Arc::ptr_eq(&a.legs[2].road, &b.legs[2].road));

        q.forget_previous_route();
        assert!(q.previous_route().is_none());
    }
}
