//! Turn-restriction filtering at junctions.
//!
//! Restrictions are authored on the road a vehicle arrives on: "from this
//! road, turning onto road X is forbidden / the only allowed move".  The
//! forward search applies them as written.  The reverse search arrives at a
//! junction on the road the vehicle will *leave* by, so it has to ask the
//! question the other way round: "could a vehicle coming in on candidate C
//! legally continue onto the road we are on?"

use std::collections::BTreeSet;

use nav_core::{Road, RoadId};
use nav_graph::Candidate;

#[derive(Copy, Clone, Debug)]
pub struct TurnRestrictionResolver {
    aware: bool,
}

impl TurnRestrictionResolver {
    /// `aware = false` passes every candidate through unchanged.
    pub fn new(aware: bool) -> Self {
        Self { aware }
    }

    /// Candidates reachable from `from` at one junction.  Order is preserved.
    ///
    /// `reverse` selects the reverse-search reading described in the module
    /// docs.
    pub fn resolve(&self, from: &Road, candidates: Vec<Candidate>, reverse: bool) -> Vec<Candidate> {
        if !self.aware {
            return candidates;
        }
        if reverse {
            resolve_reverse(from, candidates)
        } else {
            resolve_forward(from, candidates)
        }
    }
}

fn resolve_forward(from: &Road, candidates: Vec<Candidate>) -> Vec<Candidate> {
    if !from.has_restrictions() {
        return candidates;
    }
    let exclusive = candidates
        .iter()
        .any(|c| from.restriction_to(c.road_id()).is_some_and(|k| k.is_exclusive()));

    candidates
        .into_iter()
        .filter(|c| match from.restriction_to(c.road_id()) {
            Some(kind) => kind.is_exclusive(),
            // An "only" turn present here shuts every other way out.
            None => !exclusive,
        })
        .collect()
}

fn resolve_reverse(from: &Road, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let present: BTreeSet<RoadId> = candidates.iter().map(Candidate::road_id).collect();
    candidates
        .into_iter()
        .filter(|c| match c.road.restriction_to(from.id()) {
            Some(kind) => kind.is_exclusive(),
            // Forced elsewhere: an "only" turn from C onto another road that
            // meets this junction.
            None => !c.road.restrictions().any(|(to, kind)| {
                kind.is_exclusive() && to != from.id() && present.contains(&to)
            }),
        })
        .collect()
}
