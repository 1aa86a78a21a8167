//! OSM PBF loader, enabled with the `osm` Cargo feature.
//!
//! # Usage
//!
//! ```ignore
//! use std::path::Path;
//! use nav_graph::osm::load_from_pbf;
//!
//! let reader = load_from_pbf(Path::new("berlin.osm.pbf"), 12)?;
//! ```
//!
//! # What is loaded
//!
//! Every `highway=*` way becomes one [`Road`] whose id is the OSM way id;
//! profiles decide later which classes they drive on.  Besides geometry the
//! loader keeps:
//!
//! * one-way direction (`oneway=*`, implicit for motorways and roundabouts),
//! * `junction=roundabout`,
//! * numeric `maxspeed` (km/h, or `mph` suffixed),
//! * point tags for `highway=traffic_signals`, `highway=stop` and `barrier=*`
//!   nodes,
//! * `type=restriction` relations with a `from` way and a `to` way.
//!
//! # Memory note
//!
//! All node positions are buffered in a `HashMap<i64, Point31>` during the
//! single read pass, because ways reference nodes by id.  The map is dropped
//! before the reader is built.

use std::collections::HashMap;
use std::path::Path;

use osmpbf::{Element, ElementReader, RelMemberType};

use nav_core::{
    GeoPoint, Point31, PointTag, RestrictionKind, RoadBuilder, RoadClass, RoadDirection, RoadId,
};

use crate::error::{GraphError, GraphResult};
use crate::reader::{MemoryReader, MemoryReaderBuilder};

// ── Public entry point ────────────────────────────────────────────────────────

/// Build a [`MemoryReader`] from an OSM PBF file, partitioned into
/// subsections at `subsection_zoom`.
///
/// # Errors
///
/// Returns [`GraphError::Osm`] on parse errors.  Ways whose nodes are missing
/// from the extract are shortened, and dropped if fewer than two points remain.
pub fn load_from_pbf(path: &Path, subsection_zoom: u32) -> GraphResult<MemoryReader> {
    let reader = ElementReader::from_path(path).map_err(|e| GraphError::Osm(e.to_string()))?;

    let mut nodes: HashMap<i64, Point31> = HashMap::new();
    let mut node_tags: HashMap<i64, PointTag> = HashMap::new();
    let mut ways: Vec<OsmWay> = Vec::new();
    let mut restrictions: Vec<OsmRestriction> = Vec::new();

    reader
        .for_each(|elem| match elem {
            Element::Node(n) => {
                if let Ok(p) = Point31::from_geo(GeoPoint::new(n.lat(), n.lon())) {
                    nodes.insert(n.id(), p);
                }
                if let Some(tag) = point_tag(n.tags()) {
                    node_tags.insert(n.id(), tag);
                }
            }
            Element::DenseNode(n) => {
                if let Ok(p) = Point31::from_geo(GeoPoint::new(n.lat(), n.lon())) {
                    nodes.insert(n.id(), p);
                }
                if let Some(tag) = point_tag(n.tags()) {
                    node_tags.insert(n.id(), tag);
                }
            }
            Element::Way(w) => {
                // Collect tags eagerly so &str lifetimes don't escape the closure.
                let tags: Vec<(&str, &str)> = w.tags().collect();
                if let Some(highway) = tag(&tags, "highway") {
                    ways.push(OsmWay {
                        id:         w.id(),
                        refs:       w.refs().collect(),
                        class:      RoadClass::from_highway(highway),
                        direction:  direction(highway, &tags),
                        roundabout: tag(&tags, "junction") == Some("roundabout"),
                        max_speed:  tag(&tags, "maxspeed").and_then(parse_max_speed),
                    });
                }
            }
            Element::Relation(r) => {
                let tags: Vec<(&str, &str)> = r.tags().collect();
                if tag(&tags, "type") != Some("restriction") {
                    return;
                }
                let Some(kind) = tag(&tags, "restriction").and_then(RestrictionKind::from_osm) else {
                    return;
                };
                let (mut from, mut to) = (None, None);
                for m in r.members() {
                    if m.member_type != RelMemberType::Way {
                        continue;
                    }
                    match m.role() {
                        Ok("from") => from = Some(m.member_id),
                        Ok("to") => to = Some(m.member_id),
                        _ => {}
                    }
                }
                if let (Some(from), Some(to)) = (from, to) {
                    restrictions.push(OsmRestriction { from, to, kind });
                }
            }
        })
        .map_err(|e| GraphError::Osm(e.to_string()))?;

    let mut by_from: HashMap<i64, Vec<(i64, RestrictionKind)>> = HashMap::new();
    for r in restrictions {
        by_from.entry(r.from).or_default().push((r.to, r.kind));
    }

    let mut builder = MemoryReaderBuilder::new(subsection_zoom);
    for way in ways {
        let mut road = RoadBuilder::new(RoadId(way.id as u64))
            .class(way.class)
            .direction(way.direction)
            .roundabout(way.roundabout);
        if let Some(speed) = way.max_speed {
            road = road.max_speed_mps(speed);
        }

        let mut index = 0u32;
        for node in &way.refs {
            let Some(&p) = nodes.get(node) else { continue };
            road = road.point(p);
            if let Some(&tag) = node_tags.get(node) {
                road = road.tag(index, tag);
            }
            index += 1;
        }
        if index < 2 {
            continue;
        }
        for &(to, kind) in by_from.get(&way.id).into_iter().flatten() {
            road = road.restriction(RoadId(to as u64), kind);
        }
        builder.add_road(road.build()?);
    }

    Ok(builder.build())
}

// ── Internal types ────────────────────────────────────────────────────────────

struct OsmWay {
    id:         i64,
    refs:       Vec<i64>,
    class:      RoadClass,
    direction:  RoadDirection,
    roundabout: bool,
    max_speed:  Option<f32>,
}

struct OsmRestriction {
    from: i64,
    to:   i64,
    kind: RestrictionKind,
}

// ── Tag helpers ───────────────────────────────────────────────────────────────

fn tag<'t>(tags: &[(&str, &'t str)], key: &str) -> Option<&'t str> {
    tags.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn point_tag<'t, I: Iterator<Item = (&'t str, &'t str)>>(mut tags: I) -> Option<PointTag> {
    tags.find_map(|(k, v)| match (k, v) {
        ("highway", "traffic_signals") => Some(PointTag::TrafficSignals),
        ("highway", "stop") => Some(PointTag::StopSign),
        ("barrier", "no") => None,
        ("barrier", _) => Some(PointTag::Barrier),
        _ => None,
    })
}

/// Travel direction from `oneway=*`.  Motorways and roundabouts are
/// implicitly one-way in OSM convention.
fn direction(highway: &str, tags: &[(&str, &str)]) -> RoadDirection {
    match tag(tags, "oneway") {
        Some("yes" | "1" | "true") => RoadDirection::OneWayForward,
        Some("-1" | "reverse") => RoadDirection::OneWayReverse,
        Some("no" | "0" | "false") => RoadDirection::TwoWay,
        _ if matches!(highway, "motorway" | "motorway_link")
            || tag(tags, "junction") == Some("roundabout") =>
        {
            RoadDirection::OneWayForward
        }
        _ => RoadDirection::TwoWay,
    }
}

/// `maxspeed` in m/s; accepts bare km/h numbers and `"<n> mph"`.
fn parse_max_speed(value: &str) -> Option<f32> {
    let value = value.trim();
    if let Some(mph) = value.strip_suffix("mph") {
        return mph.trim().parse::<f32>().ok().map(|v| v * 0.447_04);
    }
    value.parse::<f32>().ok().map(|kmh| kmh / 3.6)
}
