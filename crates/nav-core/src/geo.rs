//! Geographic coordinates and the 31-bit fixed-point grid.
//!
//! Road geometry is stored as [`Point31`]: longitude and latitude projected to
//! spherical Mercator and quantized to 31 bits per axis (`x` grows east, `y`
//! grows south).  At zoom `z` a tile covers `2^(31 - z)` units per side, so
//! tile arithmetic is plain shifting.
//!
//! Two distance measures are used:
//!
//! * [`Point31::distance_m`]: haversine on the decoded coordinates; used for
//!   travel cost and the search heuristic.
//! * [`Point31::square_distance`]: a planar approximation on raw 31-bit
//!   deltas; only ever used to *compare* candidate projections while snapping.

use std::f64::consts::PI;

use crate::error::{CoreError, CoreResult};

const FULL_RANGE: f64 = 2_147_483_648.0; // 2^31
const MAX_UNIT: f64 = FULL_RANGE - 1.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_6;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

// Metres per 31-bit unit for the planar helpers.
const X31_METRES: f64 = 0.011;
const Y31_METRES: f64 = 0.01863;

// ── GeoPoint ──────────────────────────────────────────────────────────────────

/// A WGS-84 coordinate in degrees.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// `true` if both components are finite and inside the WGS-84 range.
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

// ── Point31 ───────────────────────────────────────────────────────────────────

/// A coordinate on the 31-bit Mercator grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point31 {
    pub x: u32,
    pub y: u32,
}

impl Point31 {
    #[inline]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Encode a WGS-84 coordinate.  Latitudes beyond the Mercator limit are
    /// clamped; non-finite or out-of-range input is rejected.
    pub fn from_geo(p: GeoPoint) -> CoreResult<Point31> {
        if !p.is_valid() {
            return Err(CoreError::InvalidCoordinate { lat: p.lat, lon: p.lon });
        }
        let x = (p.lon + 180.0) / 360.0 * FULL_RANGE;

        let lat = p.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let merc = (lat.tan() + 1.0 / lat.cos()).ln();
        let y = (1.0 - merc / PI) / 2.0 * FULL_RANGE;

        Ok(Point31 {
            x: x.clamp(0.0, MAX_UNIT) as u32,
            y: y.clamp(0.0, MAX_UNIT) as u32,
        })
    }

    /// Decode back to degrees.
    pub fn to_geo(self) -> GeoPoint {
        let lon = f64::from(self.x) / FULL_RANGE * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * f64::from(self.y) / FULL_RANGE);
        let lat = n.sinh().atan().to_degrees();
        GeoPoint { lat, lon }
    }

    /// Haversine distance in metres.
    #[inline]
    pub fn distance_m(self, other: Point31) -> f64 {
        self.to_geo().distance_m(other.to_geo())
    }

    /// Planar squared distance (m²) on raw grid deltas.
    pub fn square_distance(self, other: Point31) -> f64 {
        let dx = (i64::from(self.x) - i64::from(other.x)) as f64 * X31_METRES;
        let dy = (i64::from(self.y) - i64::from(other.y)) as f64 * Y31_METRES;
        dx * dx + dy * dy
    }

    /// Closest point to `self` on the segment `a → b`.
    ///
    /// Returns `a` or `b` exactly when the perpendicular foot falls outside
    /// the segment, so callers can tell "on a vertex" from "between vertices"
    /// by equality.
    pub fn project_onto(self, a: Point31, b: Point31) -> Point31 {
        let abx = (i64::from(b.x) - i64::from(a.x)) as f64;
        let aby = (i64::from(b.y) - i64::from(a.y)) as f64;
        let apx = (i64::from(self.x) - i64::from(a.x)) as f64;
        let apy = (i64::from(self.y) - i64::from(a.y)) as f64;

        let dot = abx * apx * X31_METRES * X31_METRES + aby * apy * Y31_METRES * Y31_METRES;
        let len2 = a.square_distance(b);
        if dot <= 0.0 || len2 == 0.0 {
            return a;
        }
        if dot >= len2 {
            return b;
        }
        let f = dot / len2;
        Point31 {
            x: (f64::from(a.x) + abx * f).round().clamp(0.0, MAX_UNIT) as u32,
            y: (f64::from(a.y) + aby * f).round().clamp(0.0, MAX_UNIT) as u32,
        }
    }

    /// Screen-style bearing from `self` towards `other`, in radians.
    ///
    /// Only differences between two bearings are meaningful; the absolute
    /// reference is irrelevant to turn classification.
    #[inline]
    pub fn bearing_to(self, other: Point31) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        -dx.atan2(dy)
    }
}

impl std::fmt::Display for Point31 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Normalize an angle to `(-π, π]`.
pub fn normalize_angle(mut a: f64) -> f64 {
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}

// ── Area31 ────────────────────────────────────────────────────────────────────

/// Inclusive axis-aligned rectangle on the 31-bit grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Area31 {
    pub left:   u32,
    pub top:    u32,
    pub right:  u32,
    pub bottom: u32,
}

impl Area31 {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left:   left.min(right),
            top:    top.min(bottom),
            right:  left.max(right),
            bottom: top.max(bottom),
        }
    }

    /// Degenerate area containing one point.
    pub fn point(p: Point31) -> Self {
        Self { left: p.x, top: p.y, right: p.x, bottom: p.y }
    }

    /// Smallest area covering every point, or `None` for an empty iterator.
    pub fn covering<I: IntoIterator<Item = Point31>>(points: I) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        Some(it.fold(Self::point(first), |a, p| a.including(p)))
    }

    /// Grow to include `p`.
    pub fn including(self, p: Point31) -> Self {
        Self {
            left:   self.left.min(p.x),
            top:    self.top.min(p.y),
            right:  self.right.max(p.x),
            bottom: self.bottom.max(p.y),
        }
    }

    /// Grow by `margin` units on every side, saturating at the grid edge.
    pub fn expanded(self, margin: u32) -> Self {
        let max = MAX_UNIT as u32;
        Self {
            left:   self.left.saturating_sub(margin),
            top:    self.top.saturating_sub(margin),
            right:  self.right.saturating_add(margin).min(max),
            bottom: self.bottom.saturating_add(margin).min(max),
        }
    }

    #[inline]
    pub fn contains(&self, p: Point31) -> bool {
        (self.left..=self.right).contains(&p.x) && (self.top..=self.bottom).contains(&p.y)
    }

    #[inline]
    pub fn intersects(&self, other: &Area31) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.top <= other.bottom
            && other.top <= self.bottom
    }
}
