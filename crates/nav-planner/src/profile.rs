//! Vehicle profiles: which roads are usable and what moving along them costs.
//!
//! The planner only talks to [`RoutingProfile`].  [`CarProfile`] is the
//! built-in implementation; tests and applications supply their own.

use nav_core::{PointTag, Road, RoadClass, RoadDirection};
use nav_graph::RoadFilter;

use crate::error::{RoutingError, RoutingResult};

// ── Parameters ────────────────────────────────────────────────────────────────

/// Scalar profile parameters read by the search.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileParams {
    /// Upper bound on any effective speed; also the heuristic's speed.
    pub max_speed_mps:       f32,
    /// Used when a road has no speed of its own.
    pub default_speed_mps:   f32,
    pub left_turn_s:         f32,
    pub right_turn_s:        f32,
    /// Charged for entering a roundabout; `0` disables the special case.
    pub roundabout_turn_s:   f32,
    /// Apply turn restrictions stored on roads.
    pub restrictions_aware:  bool,
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            max_speed_mps:      130.0 / 3.6,
            default_speed_mps:  40.0 / 3.6,
            left_turn_s:        0.0,
            right_turn_s:       0.0,
            roundabout_turn_s:  0.0,
            restrictions_aware: true,
        }
    }
}

impl ProfileParams {
    /// # Errors
    ///
    /// [`RoutingError::Config`] for a speed that is not finite and positive,
    /// or a turn cost that is not finite and non-negative.
    pub fn validate(&self) -> RoutingResult<()> {
        for (name, speed) in [("max speed", self.max_speed_mps), ("default speed", self.default_speed_mps)] {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(RoutingError::Config(format!("{name} must be finite and positive, got {speed}")));
            }
        }
        let turns = [
            ("left turn", self.left_turn_s),
            ("right turn", self.right_turn_s),
            ("roundabout turn", self.roundabout_turn_s),
        ];
        for (name, cost) in turns {
            if !cost.is_finite() || cost < 0.0 {
                return Err(RoutingError::Config(format!("{name} cost must be finite and non-negative, got {cost}")));
            }
        }
        Ok(())
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Cost model of one kind of vehicle.
///
/// # Thread safety
///
/// Profiles are shared by every calculation of a planner, so they must be
/// `Send + Sync`.
pub trait RoutingProfile: Send + Sync {
    fn params(&self) -> &ProfileParams;

    /// Whether the vehicle may use `road` at all.
    fn accepts_road(&self, road: &Road) -> bool;

    /// Nominal speed on `road` in m/s; `0` means "use the default speed".
    fn speed(&self, road: &Road) -> f32;

    /// Multiplier applied to the speed to prefer some roads over others.
    fn speed_priority(&self, _road: &Road) -> f32 {
        1.0
    }

    /// Allowed travel direction; the road's own by default.
    fn direction(&self, road: &Road) -> RoadDirection {
        road.direction()
    }

    /// Seconds lost at the point `index` of `road`.  Negative means the
    /// point cannot be passed.
    fn obstacle_time(&self, _road: &Road, _index: u32) -> f32 {
        0.0
    }
}

/// Adapts a profile to the loader's [`RoadFilter`] seam.
pub(crate) struct ProfileFilter<'a>(pub &'a dyn RoutingProfile);

impl RoadFilter for ProfileFilter<'_> {
    #[inline]
    fn accepts(&self, road: &Road) -> bool {
        self.0.accepts_road(road)
    }
}

// ── Effective speed ───────────────────────────────────────────────────────────

/// Speed actually used for travel time on `road`: the profile speed scaled by
/// priority, falling back to the default speed, capped at the maximum.
pub fn effective_speed(profile: &dyn RoutingProfile, road: &Road) -> f64 {
    let params = profile.params();
    let priority = profile.speed_priority(road);
    let mut speed = profile.speed(road) * priority;
    if speed <= 0.0 {
        speed = params.default_speed_mps * priority;
    }
    if speed <= 0.0 {
        speed = params.default_speed_mps;
    }
    let speed = speed.min(params.max_speed_mps);
    if speed > 0.0 { f64::from(speed) } else { f64::from(params.max_speed_mps.max(f32::EPSILON)) }
}

// ── CarProfile ────────────────────────────────────────────────────────────────

/// Seconds lost at a traffic signal.
const SIGNAL_DELAY_S: f32 = 2.0;
/// Seconds lost at a stop sign.
const STOP_DELAY_S: f32 = 3.0;

/// Car routing on the motorized road classes.
///
/// Posted speed limits win over the class table.  Barriers are impassable.
#[derive(Clone, Debug)]
pub struct CarProfile {
    params: ProfileParams,
}

impl CarProfile {
    pub fn new() -> Self {
        Self {
            params: ProfileParams {
                left_turn_s: 8.0,
                right_turn_s: 3.0,
                roundabout_turn_s: 5.0,
                ..ProfileParams::default()
            },
        }
    }

    pub fn with_params(params: ProfileParams) -> Self {
        Self { params }
    }
}

impl Default for CarProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// Typical free-flow car speed per class, `None` for non-car classes.
fn car_speed_mps(class: RoadClass) -> Option<f32> {
    match class {
        RoadClass::Motorway     => Some(29.1), // ~65 mph
        RoadClass::Trunk        => Some(24.6), // ~55 mph
        RoadClass::Primary      => Some(20.1), // ~45 mph
        RoadClass::Secondary    => Some(17.9), // ~40 mph
        RoadClass::Tertiary     => Some(13.4), // ~30 mph
        RoadClass::Residential  => Some(8.9),  // ~20 mph
        RoadClass::Service
        | RoadClass::Unclassified => Some(6.7), // ~15 mph
        RoadClass::Track
        | RoadClass::Footway
        | RoadClass::Cycleway
        | RoadClass::Path        => None,
        _                        => Some(8.9),
    }
}

impl RoutingProfile for CarProfile {
    fn params(&self) -> &ProfileParams {
        &self.params
    }

    fn accepts_road(&self, road: &Road) -> bool {
        car_speed_mps(road.class()).is_some()
    }

    fn speed(&self, road: &Road) -> f32 {
        road.max_speed_mps()
            .or_else(|| car_speed_mps(road.class()))
            .unwrap_or(0.0)
    }

    fn speed_priority(&self, road: &Road) -> f32 {
        match road.class() {
            RoadClass::Service => 0.7,
            RoadClass::Residential | RoadClass::Unclassified => 0.9,
            _ => 1.0,
        }
    }

    fn obstacle_time(&self, road: &Road, index: u32) -> f32 {
        let mut total = 0.0;
        for tag in road.tags_at(index) {
            match tag {
                PointTag::Barrier => return -1.0,
                PointTag::TrafficSignals => total += SIGNAL_DELAY_S,
                PointTag::StopSign => total += STOP_DELAY_S,
            }
        }
        total
    }
}
