//! One direction's open set and visited set.
//!
//! The open set is an indexed min-heap ([`PriorityQueue`] under
//! [`Reverse`]), so pushing a segment that is already queued updates its
//! priority in place: that is the search's decrease-key.  Ties on the
//! priority key fall back to the lower `g`, then to insertion order, which
//! makes every pop order reproducible.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use priority_queue::PriorityQueue;
use rustc_hash::{FxBuildHasher, FxHashMap};

use nav_core::RoadId;

use crate::segment::{AllowedDirection, RoutePointId, SearchSide, SegmentId};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct QueueKey {
    priority: OrderedFloat<f64>,
    cost:     OrderedFloat<f64>,
    seq:      u64,
}

/// Identity of a frontier node: one per road point and walking constraint.
pub type NodeKey = (RoadId, u32, AllowedDirection);

pub struct Frontier {
    side:    SearchSide,
    queue:   PriorityQueue<SegmentId, Reverse<QueueKey>, FxBuildHasher>,
    visited: FxHashMap<RoutePointId, SegmentId>,
    nodes:   FxHashMap<NodeKey, SegmentId>,
    seq:     u64,
}

impl Frontier {
    pub fn new(side: SearchSide) -> Self {
        Self {
            side,
            queue: PriorityQueue::with_default_hasher(),
            visited: FxHashMap::default(),
            nodes: FxHashMap::default(),
            seq: 0,
        }
    }

    #[inline]
    pub fn side(&self) -> SearchSide {
        self.side
    }

    // ── Open set ─────────────────────────────────────────────────────────

    /// Queue `id` with priority `g + coefficient·h`, or re-prioritize it if
    /// already queued.
    pub fn push(&mut self, id: SegmentId, g: f64, h: f64, coefficient: f64) {
        let key = QueueKey {
            priority: OrderedFloat(g + coefficient * h),
            cost:     OrderedFloat(g),
            seq:      self.seq,
        };
        self.seq += 1;
        self.queue.push(id, Reverse(key));
    }

    pub fn pop(&mut self) -> Option<SegmentId> {
        self.queue.pop().map(|(id, _)| id)
    }

    pub fn peek(&self) -> Option<SegmentId> {
        self.queue.peek().map(|(&id, _)| id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    // ── Visited intervals ────────────────────────────────────────────────

    /// Record that `owner` walked `key`.  The first owner is kept.
    pub fn visit(&mut self, key: RoutePointId, owner: SegmentId) {
        self.visited.entry(key).or_insert(owner);
    }

    #[inline]
    pub fn is_visited(&self, key: RoutePointId) -> bool {
        self.visited.contains_key(&key)
    }

    #[inline]
    pub fn visited_by(&self, key: RoutePointId) -> Option<SegmentId> {
        self.visited.get(&key).copied()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    // ── Node identity ────────────────────────────────────────────────────

    #[inline]
    pub fn node(&self, key: NodeKey) -> Option<SegmentId> {
        self.nodes.get(&key).copied()
    }

    pub fn register_node(&mut self, key: NodeKey, id: SegmentId) {
        self.nodes.insert(key, id);
    }
}
