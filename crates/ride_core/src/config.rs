//! Session configuration.
//!
//! Every tunable constant of the engine lives here with its default. The
//! radius bands and spacing are "visually plausible" values, not derived ones.
//! All structs deserialize with missing fields filled from `Default`, and
//! durations are written as whole milliseconds.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::places::SearchRegion;
use crate::route::EdgeInsets;
use crate::routing::RouteProviderKind;

/// Serde helper: serialize a `Duration` as integer milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        (value.as_millis() as u64).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        u64::deserialize(de).map(Duration::from_millis)
    }
}

/// Fleet generation around the user's first location fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Vehicles requested per fleet.
    pub desired_count: usize,
    /// Snap attempts launched per requested vehicle.
    pub attempt_multiplier: usize,
    /// Inner radius of the spawn ring, metres.
    pub min_radius_m: f64,
    /// Outer radius of the spawn ring, metres.
    pub max_radius_m: f64,
    /// Minimum spacing between accepted vehicles, metres.
    pub dedup_distance_m: f64,
    /// Seed for RNG (for reproducibility). `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            desired_count: 9,
            attempt_multiplier: 3,
            min_radius_m: 100.0,
            max_radius_m: 400.0,
            dedup_distance_m: 50.0,
            seed: None,
        }
    }
}

/// Idle drift of an existing fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    #[serde(with = "duration_ms")]
    pub tick_interval: Duration,
    /// Wait between the fleet appearing and the first drift.
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,
    pub vehicles_per_tick: usize,
    pub min_drift_m: f64,
    pub max_drift_m: f64,
    #[serde(with = "duration_ms")]
    pub min_transition: Duration,
    #[serde(with = "duration_ms")]
    pub max_transition: Duration,
    pub seed: Option<u64>,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            settle_delay: Duration::from_secs(2),
            vehicles_per_tick: 1,
            min_drift_m: 30.0,
            max_drift_m: 80.0,
            min_transition: Duration::from_secs(40),
            max_transition: Duration::from_secs(60),
            seed: None,
        }
    }
}

/// Viewport fitting for computed routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Fraction of the route's span added beyond each edge.
    pub viewport_padding_fraction: f64,
    /// Screen insets reserved for overlay UI.
    pub insets: EdgeInsets,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            viewport_padding_fraction: 0.2,
            insets: EdgeInsets::default(),
        }
    }
}

/// Place search, recents and route draft limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(with = "duration_ms")]
    pub debounce: Duration,
    pub min_query_chars: usize,
    pub max_results: usize,
    pub max_recents: usize,
    pub max_stops: usize,
    pub bias_region: SearchRegion,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            min_query_chars: 4,
            max_results: 15,
            max_recents: 10,
            max_stops: 3,
            bias_region: SearchRegion::default(),
        }
    }
}

/// Everything a session needs besides its collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub fleet: FleetConfig,
    pub animator: AnimatorConfig,
    pub route: RouteConfig,
    pub search: SearchConfig,
    /// Delay between the first location fix and fleet generation.
    #[serde(with = "duration_ms")]
    pub fleet_load_delay: Duration,
    /// Side length of the region shown when centring on the user, metres.
    pub camera_span_m: f64,
    pub route_provider: RouteProviderKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fleet: FleetConfig::default(),
            animator: AnimatorConfig::default(),
            route: RouteConfig::default(),
            search: SearchConfig::default(),
            fleet_load_delay: Duration::from_millis(500),
            camera_span_m: 1000.0,
            route_provider: RouteProviderKind::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents)
            .map_err(|error| ConfigError::InvalidFormat(format!("invalid session config: {error}")))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|error| {
            ConfigError::Io(format!(
                "failed to read config file '{}': {error}",
                path.display()
            ))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn with_fleet_seed(mut self, seed: u64) -> Self {
        self.fleet.seed = Some(seed);
        self
    }

    pub fn with_animator_seed(mut self, seed: u64) -> Self {
        self.animator.seed = Some(seed);
        self
    }
}
