//! Per-planner search configuration.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{RoutingError, RoutingResult};

/// Which frontiers the search may expand after the first two iterations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchDirection {
    /// Alternate between forward and reverse by frontier cost and size.
    #[default]
    Bidirectional,
    ForwardOnly,
    ReverseOnly,
}

/// Search parameters shared by every calculation of one planner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutingConfig {
    /// Weight of the heuristic in the priority key `g + c·h`.  Values above
    /// 1 trade optimality for fewer expansions.  Default: 1.0.
    pub heuristic_coefficient: f64,

    /// Frontier selection override.  Default: bidirectional.
    pub direction: SearchDirection,

    /// Budget for the tile cache footprint plus live search segments.
    /// Default: 256 MiB.
    pub memory_limit_bytes: usize,

    /// Compass bearing of the vehicle at the start, in radians (north 0,
    /// east π/2).  Leaving the start against it costs
    /// [`WRONG_HEADING_PENALTY_S`].  Default: none.
    pub initial_heading: Option<f64>,

    /// Refine the heuristic with border lines from the reader.  Default: off.
    pub use_border_lines: bool,

    /// A new request whose start lies within this many metres of the previous
    /// route, towards the same target, re-plans only the head of the route.
    /// `0.0` disables partial recalculation.  Default: 0.0.
    pub partial_recalculation_distance_m: f64,
}

/// Seconds added for leaving the start segment against `initial_heading`.
pub const WRONG_HEADING_PENALTY_S: f64 = 500.0;

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            heuristic_coefficient:            1.0,
            direction:                        SearchDirection::Bidirectional,
            memory_limit_bytes:               256 * 1024 * 1024,
            initial_heading:                  None,
            use_border_lines:                 false,
            partial_recalculation_distance_m: 0.0,
        }
    }
}

impl RoutingConfig {
    /// Reject values the search cannot work with.
    pub fn validate(&self) -> RoutingResult<()> {
        if !self.heuristic_coefficient.is_finite() || self.heuristic_coefficient < 0.0 {
            return Err(RoutingError::Config(format!(
                "heuristic coefficient must be finite and non-negative, got {}",
                self.heuristic_coefficient
            )));
        }
        if self.memory_limit_bytes == 0 {
            return Err(RoutingError::Config("memory limit must be positive".to_string()));
        }
        if self.initial_heading.is_some_and(|h| !h.is_finite()) {
            return Err(RoutingError::Config("initial heading must be finite".to_string()));
        }
        if !self.partial_recalculation_distance_m.is_finite()
            || self.partial_recalculation_distance_m < 0.0
        {
            return Err(RoutingError::Config(format!(
                "partial recalculation distance must be finite and non-negative, got {}",
                self.partial_recalculation_distance_m
            )));
        }
        Ok(())
    }

    /// Build a configuration from routing-profile attributes, starting from
    /// the defaults.
    ///
    /// | Key                       | Field                              |
    /// |---------------------------|------------------------------------|
    /// | `heuristicCoefficient`    | `heuristic_coefficient`            |
    /// | `planRoadDirection`       | `direction` (`-1`, `0`, `1`)       |
    /// | `memoryLimitMb`           | `memory_limit_bytes`               |
    /// | `recalculateDistanceHelp` | `partial_recalculation_distance_m` |
    /// | `useBorderLines`          | `use_border_lines`                 |
    ///
    /// Unknown keys are ignored.  The result is validated.
    pub fn from_attributes(attributes: &HashMap<String, String>) -> RoutingResult<Self> {
        let mut config = Self::default();
        let mut keys: Vec<&String> = attributes.keys().collect();
        keys.sort();

        for key in keys {
            let value = attributes[key].trim();
            match key.as_str() {
                "heuristicCoefficient" => {
                    config.heuristic_coefficient = parse(key, value)?;
                }
                "planRoadDirection" => {
                    let d: i32 = parse(key, value)?;
                    config.direction = match d.signum() {
                        1 => SearchDirection::ForwardOnly,
                        -1 => SearchDirection::ReverseOnly,
                        _ => SearchDirection::Bidirectional,
                    };
                }
                "memoryLimitMb" => {
                    let mb: usize = parse(key, value)?;
                    config.memory_limit_bytes = mb.saturating_mul(1024 * 1024);
                }
                "recalculateDistanceHelp" => {
                    config.partial_recalculation_distance_m = parse(key, value)?;
                }
                "useBorderLines" => {
                    config.use_border_lines = parse(key, value)?;
                }
                _ => debug!(key = key.as_str(), "ignoring routing attribute"),
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> RoutingResult<T> {
    value
        .parse()
        .map_err(|_| RoutingError::Config(format!("attribute {key}: cannot parse {value:?}")))
}
