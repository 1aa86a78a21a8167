//! grid-city — routes a handful of trips across a synthetic downtown grid.
//!
//! Shows the planner end to end: snapping, one-way streets, a refused left
//! turn, an intermediate waypoint, and partial recalculation after the
//! vehicle has moved along its route.  Set `RUST_LOG=nav_planner=debug` to
//! see search statistics per waypoint pair.
//!
//! With `--features osm`, pass `<file.osm.pbf> <lat> <lon> <lat> <lon>` to
//! route over a real extract instead.

mod network;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nav_core::GeoPoint;
use nav_graph::{RoadGraphTileCache, TileCacheConfig};
use nav_planner::{CarProfile, Route, RoutePlanner, RoutePlannerBuilder, RoutingConfig};

use network::{AVENUES, BLOCK_DEG, STREETS, build_network, crossing};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Waypoints sit this far off the street centreline, like a parked car.
const CURB_OFFSET_DEG:     f64 = 0.000_05;
const RECALC_DISTANCE_M:   &str = "150";
const MEMORY_LIMIT_MB:     &str = "64";

fn curb(p: GeoPoint) -> GeoPoint {
    GeoPoint::new(p.lat + CURB_OFFSET_DEG, p.lon + BLOCK_DEG / 4.0)
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    #[cfg(feature = "osm")]
    if let Some(path) = std::env::args().nth(1) {
        return run_osm(&path);
    }

    println!("=== grid-city — nav routing demo ===");
    println!("Grid: {STREETS} streets × {AVENUES} avenues, {BLOCK_DEG}° blocks");
    println!();

    // 1. Graph and shared cache.
    let reader = build_network()?;
    let cache = Arc::new(RoadGraphTileCache::new(Arc::new(reader), TileCacheConfig::default()));

    // 2. Planner configured the way a host application passes attributes.
    let attributes: HashMap<String, String> = [
        ("recalculateDistanceHelp", RECALC_DISTANCE_M),
        ("memoryLimitMb", MEMORY_LIMIT_MB),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let config = RoutingConfig::from_attributes(&attributes)?;
    let mut planner = RoutePlannerBuilder::new(Arc::clone(&cache), Arc::new(CarProfile::new()))
        .config(config)
        .build()?;

    // 3. Trips.
    let trips: [(&str, Vec<GeoPoint>); 4] = [
        ("corner to corner", vec![curb(crossing(0, 0)), curb(crossing(STREETS - 1, AVENUES - 2))]),
        ("against a one-way", vec![curb(crossing(0, 5)), curb(crossing(0, 1))]),
        ("refused left turn", vec![curb(crossing(2, 2)), curb(crossing(4, 4))]),
        (
            "via waypoint",
            vec![curb(crossing(1, 1)), curb(crossing(5, 6)), curb(crossing(6, 0))],
        ),
    ];

    println!("{:<20} {:>5} {:>10} {:>9} {:>10}", "Trip", "Legs", "Dist (m)", "Time (s)", "Searched");
    println!("{}", "-".repeat(58));
    for (name, waypoints) in &trips {
        planner.forget_previous_route();
        match plan(&mut planner, waypoints) {
            Ok(route) => print_row(name, &route),
            Err(e) => println!("{name:<20} failed: {e}"),
        }
    }
    println!();

    // 4. The vehicle drives on; re-plan from a point along the last route.
    let target = curb(crossing(STREETS - 1, AVENUES - 2));
    let first = plan(&mut planner, &[curb(crossing(0, 0)), target])?;
    let moved = first
        .points()
        .get(first.points().len() / 3)
        .map(|p| p.to_geo())
        .unwrap_or(target);
    let t0 = Instant::now();
    let again = plan(&mut planner, &[moved, target])?;
    println!(
        "Re-planned from {moved} in {:.3} ms: {} legs, {:.0} m",
        t0.elapsed().as_secs_f64() * 1e3,
        again.legs.len(),
        again.distance_m,
    );

    // 5. Cache summary.
    let stats = cache.stats();
    println!(
        "Tile cache: {} resident tiles (peak {}), {} subsection loads, ~{} KiB",
        stats.resident_tiles,
        stats.peak_resident_tiles,
        stats.subsection_loads,
        cache.estimated_footprint() / 1024,
    );
    Ok(())
}

fn plan(planner: &mut RoutePlanner, waypoints: &[GeoPoint]) -> Result<Route> {
    let cancel = AtomicBool::new(false);
    let route = planner.calculate_route(waypoints, false, &cancel)?;
    Ok(route)
}

fn print_row(name: &str, route: &Route) {
    let searched: usize = route.statistics.iter().map(|s| s.segments_created).sum();
    println!(
        "{name:<20} {:>5} {:>10.0} {:>9.0} {:>10}",
        route.legs.len(),
        route.distance_m,
        route.time_s,
        searched,
    );
    info!(trip = name, roads = ?route.road_ids(), "route");
}

#[cfg(feature = "osm")]
fn run_osm(path: &str) -> Result<()> {
    use anyhow::Context;

    let coords: Vec<f64> = std::env::args()
        .skip(2)
        .map(|a| a.parse::<f64>().with_context(|| format!("bad coordinate {a:?}")))
        .collect::<Result<_>>()?;
    let [lat1, lon1, lat2, lon2] = coords[..] else {
        anyhow::bail!("usage: grid-city <file.osm.pbf> <lat> <lon> <lat> <lon>");
    };

    let t0 = Instant::now();
    let reader = nav_graph::osm::load_from_pbf(std::path::Path::new(path), 12)?;
    info!(roads = reader.road_count(), secs = t0.elapsed().as_secs_f64(), "extract loaded");

    let cache = Arc::new(RoadGraphTileCache::new(Arc::new(reader), TileCacheConfig::default()));
    let mut planner = RoutePlannerBuilder::new(cache, Arc::new(CarProfile::new())).build()?;
    let route = plan(&mut planner, &[GeoPoint::new(lat1, lon1), GeoPoint::new(lat2, lon2)])?;
    print_row("extract", &route);
    Ok(())
}
