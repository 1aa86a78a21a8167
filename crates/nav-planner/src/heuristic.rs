//! Admissible time estimates for the A* key.
//!
//! The base estimate is straight-line distance at the profile's maximum
//! speed.  When the reader provides border samples (points where roads cross
//! horizontal partition lines), a [`BorderLineTable`] tightens it: a route
//! between two points on opposite sides of a line must cross that line at
//! one of its samples, so the shortest detour through the samples is a
//! better lower bound than the straight line.

use std::collections::BTreeMap;

use nav_core::Point31;
use nav_graph::BorderSample;

use crate::segment::SearchSide;

/// Samples further than this (in 31-bit units) to either side of the
/// start/target box are ignored.
const BORDER_X_MARGIN: u32 = 1 << 21;

// ── Border lines ──────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BorderPoint {
    pub point:             Point31,
    /// Lower bound in metres from the start through earlier lines.
    pub distance_to_start: f64,
    /// Lower bound in metres to the target through later lines.
    pub distance_to_end:   f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BorderLine {
    pub y:      u32,
    pub points: Vec<BorderPoint>,
}

/// Horizontal border lines lying strictly between start and target, sorted
/// by `y`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BorderLineTable {
    start:  Point31,
    target: Point31,
    lines:  Vec<BorderLine>,
}

impl BorderLineTable {
    pub fn build(start: Point31, target: Point31, samples: &[BorderSample]) -> Self {
        let left = start.x.min(target.x).saturating_sub(BORDER_X_MARGIN);
        let right = start.x.max(target.x).saturating_add(BORDER_X_MARGIN);
        let (top, bottom) = (start.y.min(target.y), start.y.max(target.y));

        let mut by_y: BTreeMap<u32, Vec<Point31>> = BTreeMap::new();
        for s in samples {
            let p = s.point;
            if p.x > left && p.x < right && p.y > top && p.y < bottom {
                by_y.entry(p.y).or_default().push(p);
            }
        }

        let mut lines: Vec<BorderLine> = by_y
            .into_iter()
            .map(|(y, mut xs)| {
                // The ends stand in for crossings outside the sampled range.
                xs.push(Point31::new(left, y));
                xs.push(Point31::new(right, y));
                xs.sort_unstable();
                xs.dedup();
                let points = xs
                    .into_iter()
                    .map(|point| BorderPoint { point, distance_to_start: 0.0, distance_to_end: 0.0 })
                    .collect();
                BorderLine { y, points }
            })
            .collect();

        let n = lines.len();
        let from_start: Vec<usize> =
            if start.y <= target.y { (0..n).collect() } else { (0..n).rev().collect() };

        propagate(&mut lines, &from_start, start, true);
        let from_target: Vec<usize> = from_start.iter().rev().copied().collect();
        propagate(&mut lines, &from_target, target, false);

        Self { start, target, lines }
    }

    pub fn lines(&self) -> &[BorderLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines with `y` strictly above `y`.
    fn lines_above(&self, y: u32) -> usize {
        self.lines.partition_point(|l| l.y < y)
    }

    /// Lower bound in metres from `from` to the start (reverse side) or the
    /// target (forward side), never below `straight_m`.
    pub fn refine(&self, from: Point31, side: SearchSide, straight_m: f64) -> f64 {
        let goal = match side {
            SearchSide::Forward => self.target,
            SearchSide::Reverse => self.start,
        };
        let mut here = self.lines_above(from.y);
        let there = self.lines_above(goal.y);
        // A point lying on a line has already crossed it.
        if here < there && self.lines[here].y == from.y {
            here += 1;
        }
        let line = match here.cmp(&there) {
            std::cmp::Ordering::Equal => return straight_m,
            std::cmp::Ordering::Less => &self.lines[here],
            std::cmp::Ordering::Greater => &self.lines[here - 1],
        };

        let best = line
            .points
            .iter()
            .map(|b| {
                let rest = match side {
                    SearchSide::Forward => b.distance_to_end,
                    SearchSide::Reverse => b.distance_to_start,
                };
                from.distance_m(b.point) + rest
            })
            .fold(f64::INFINITY, f64::min);

        if best.is_finite() && best > straight_m { best } else { straight_m }
    }
}

/// Fill one distance field line by line, starting next to `origin`.
fn propagate(lines: &mut [BorderLine], order: &[usize], origin: Point31, to_start: bool) {
    let field = |b: &BorderPoint| if to_start { b.distance_to_start } else { b.distance_to_end };
    let mut previous: Option<usize> = None;
    for &i in order {
        let distances: Vec<f64> = lines[i]
            .points
            .iter()
            .map(|p| match previous {
                None => origin.distance_m(p.point),
                Some(j) => lines[j]
                    .points
                    .iter()
                    .map(|q| field(q) + q.point.distance_m(p.point))
                    .fold(f64::INFINITY, f64::min),
            })
            .collect();
        for (p, d) in lines[i].points.iter_mut().zip(distances) {
            if to_start {
                p.distance_to_start = d;
            } else {
                p.distance_to_end = d;
            }
        }
        previous = Some(i);
    }
}

// ── Estimator ─────────────────────────────────────────────────────────────────

/// Time lower bound towards either end of one search.
#[derive(Clone, Debug)]
pub struct HeuristicEstimator {
    max_speed_mps: f64,
    start:         Point31,
    target:        Point31,
    borders:       Option<BorderLineTable>,
}

impl HeuristicEstimator {
    pub fn new(max_speed_mps: f64, start: Point31, target: Point31) -> Self {
        Self { max_speed_mps, start, target, borders: None }
    }

    pub fn with_border_lines(mut self, table: BorderLineTable) -> Self {
        self.borders = (!table.is_empty()).then_some(table);
        self
    }

    #[inline]
    pub fn start(&self) -> Point31 {
        self.start
    }

    #[inline]
    pub fn target(&self) -> Point31 {
        self.target
    }

    pub fn has_border_lines(&self) -> bool {
        self.borders.is_some()
    }

    /// Straight-line travel time between two points, in seconds.
    pub fn estimate(&self, from: Point31, to: Point31) -> f64 {
        from.distance_m(to) / self.max_speed_mps
    }

    /// Estimate from `from` to the goal of the `side` search: the target for
    /// forward, the start for reverse.
    pub fn estimate_towards(&self, from: Point31, side: SearchSide) -> f64 {
        let goal = match side {
            SearchSide::Forward => self.target,
            SearchSide::Reverse => self.start,
        };
        let straight = from.distance_m(goal);
        let metres = match &self.borders {
            Some(table) => table.refine(from, side, straight),
            None => straight,
        };
        metres / self.max_speed_mps
    }
}
