//! Synthetic downtown grid.
//!
//! Streets run east-west and alternate one-way directions; avenues run
//! north-south and are two-way.  Every crossing is a shared vertex of both
//! roads.  A few crossings have signals, one street refuses a left turn, and
//! a footway cuts diagonally across the grid for the car profile to ignore.

use anyhow::Result;

use nav_core::{
    GeoPoint, Point31, PointTag, RestrictionKind, Road, RoadBuilder, RoadClass, RoadDirection, RoadId,
};
use nav_graph::{MemoryReader, MemoryReaderBuilder};

pub const ORIGIN:      GeoPoint = GeoPoint { lat: 30.695, lon: -88.050 };
pub const STREETS:     u32      = 8;
pub const AVENUES:     u32      = 8;
/// Degrees between neighbouring streets/avenues (~200 m).
pub const BLOCK_DEG:   f64      = 0.002;
const SUBSECTION_ZOOM: u32      = 13;

pub fn street_id(row: u32) -> RoadId {
    RoadId(100 + u64::from(row))
}

pub fn avenue_id(col: u32) -> RoadId {
    RoadId(200 + u64::from(col))
}

/// Crossing of street `row` (0 = northmost) and avenue `col` (0 = westmost).
pub fn crossing(row: u32, col: u32) -> GeoPoint {
    GeoPoint::new(
        ORIGIN.lat - f64::from(row) * BLOCK_DEG,
        ORIGIN.lon + f64::from(col) * BLOCK_DEG,
    )
}

pub fn build_network() -> Result<MemoryReader> {
    let mut b = MemoryReaderBuilder::new(SUBSECTION_ZOOM);
    for road in roads()? {
        b.add_road(road);
    }
    Ok(b.build())
}

fn roads() -> Result<Vec<Road>> {
    let mut out = Vec::new();

    for row in 0..STREETS {
        let mut points = Vec::with_capacity(AVENUES as usize);
        for col in 0..AVENUES {
            points.push(Point31::from_geo(crossing(row, col))?);
        }
        let direction = if row % 2 == 0 { RoadDirection::OneWayForward } else { RoadDirection::OneWayReverse };
        let mut street = RoadBuilder::new(street_id(row))
            .points(points)
            .direction(direction)
            .class(RoadClass::Residential);
        // Signals on every other crossing.
        for col in (0..AVENUES).step_by(2) {
            street = street.tag(col, PointTag::TrafficSignals);
        }
        if row == 2 {
            street = street.restriction(avenue_id(4), RestrictionKind::NoLeftTurn);
        }
        out.push(street.build()?);
    }

    for col in 0..AVENUES {
        let mut points = Vec::with_capacity(STREETS as usize);
        for row in 0..STREETS {
            points.push(Point31::from_geo(crossing(row, col))?);
        }
        let class = if col == AVENUES / 2 { RoadClass::Secondary } else { RoadClass::Tertiary };
        out.push(RoadBuilder::new(avenue_id(col)).points(points).class(class).build()?);
    }

    let diagonal = [crossing(0, 0), crossing(STREETS - 1, AVENUES - 1)]
        .into_iter()
        .map(Point31::from_geo)
        .collect::<Result<Vec<_>, _>>()?;
    out.push(RoadBuilder::new(RoadId(900)).points(diagonal).class(RoadClass::Footway).build()?);

    Ok(out)
}
