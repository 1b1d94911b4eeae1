//! Multi-segment route computation.
//!
//! A route is computed leg by leg: start → stop₁ → … → destination. A stop
//! whose leg cannot be routed is skipped and the next leg starts from the last
//! point that was reached, so the result may have fewer segments than legs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::RouteConfig;
use crate::error::RoutingError;
use crate::geo::{BoundingBox, Coordinate};
use crate::routing::{RoutePath, RouteProvider};

/// A labelled point the route must visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    pub label: String,
}

impl Waypoint {
    pub fn new(coordinate: Coordinate, label: impl Into<String>) -> Self {
        Self {
            coordinate,
            label: label.into(),
        }
    }
}

/// One routed leg. `source` and `destination` are the requested endpoints,
/// which may differ slightly from the first and last polyline points.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSegment {
    pub path: Vec<Coordinate>,
    pub source: Coordinate,
    pub destination: Coordinate,
    pub distance_m: f64,
    pub duration_secs: f64,
}

impl RouteSegment {
    fn from_path(path: RoutePath, source: Coordinate, destination: Coordinate) -> Self {
        Self {
            path: path.points,
            source,
            destination,
            distance_m: path.distance_m,
            duration_secs: path.duration_secs,
        }
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.path.iter().copied())
    }
}

/// Screen-space margins, in points, kept clear when fitting the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeInsets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl Default for EdgeInsets {
    fn default() -> Self {
        Self {
            top: 80.0,
            left: 40.0,
            bottom: 350.0,
            right: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bounds: BoundingBox,
    pub insets: EdgeInsets,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedRoute {
    pub segments: Vec<RouteSegment>,
    /// `None` exactly when there are no segments.
    pub viewport: Option<Viewport>,
}

impl ComputedRoute {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.segments.iter().map(|segment| segment.distance_m).sum()
    }

    pub fn total_duration_secs(&self) -> f64 {
        self.segments.iter().map(|segment| segment.duration_secs).sum()
    }
}

/// Union of every segment's bounds, each edge pushed out by
/// `viewport_padding_fraction` of the span.
pub fn fit_viewport(segments: &[RouteSegment], config: &RouteConfig) -> Option<Viewport> {
    let bounds = segments
        .iter()
        .filter_map(RouteSegment::bounds)
        .reduce(|acc, next| acc.union(&next))?;
    Some(Viewport {
        bounds: bounds.inflate(config.viewport_padding_fraction),
        insets: config.insets,
    })
}

pub struct RouteComputer {
    provider: Arc<dyn RouteProvider>,
    config: RouteConfig,
}

impl RouteComputer {
    pub fn new(provider: Arc<dyn RouteProvider>, config: RouteConfig) -> Self {
        Self { provider, config }
    }

    /// Route `start → stops… → destination`, skipping unreachable stops.
    ///
    /// Never fails: if no leg can be routed the result is empty. Legs run one
    /// at a time on the blocking pool, so dropping or aborting the future
    /// stops the chain at the next leg boundary.
    pub async fn compute_route(
        &self,
        start: Coordinate,
        stops: &[Waypoint],
        destination: &Waypoint,
    ) -> ComputedRoute {
        let mut segments = Vec::with_capacity(stops.len() + 1);
        let mut current_origin = start;

        for stop in stops {
            match self.leg(current_origin, stop.coordinate).await {
                Some(segment) => {
                    segments.push(segment);
                    current_origin = stop.coordinate;
                }
                None => log::debug!("skipping unreachable stop '{}'", stop.label),
            }
        }

        if let Some(segment) = self.leg(current_origin, destination.coordinate).await {
            segments.push(segment);
        }

        log::info!(
            "route to '{}' computed: {} of {} segments",
            destination.label,
            segments.len(),
            stops.len() + 1
        );

        let viewport = fit_viewport(&segments, &self.config);
        ComputedRoute { segments, viewport }
    }

    async fn leg(&self, source: Coordinate, destination: Coordinate) -> Option<RouteSegment> {
        let provider = Arc::clone(&self.provider);
        let result =
            tokio::task::spawn_blocking(move || provider.route(source, destination, false)).await;

        let paths = match result {
            Ok(Ok(paths)) => paths,
            Ok(Err(RoutingError::NoRoute)) => {
                log::debug!("no route from {source:?} to {destination:?}");
                return None;
            }
            Ok(Err(err)) => {
                log::warn!("segment routing failed: {err}");
                return None;
            }
            Err(err) => {
                log::warn!("segment routing task failed: {err}");
                return None;
            }
        };

        paths
            .into_iter()
            .next()
            .filter(|path| !path.points.is_empty())
            .map(|path| RouteSegment::from_path(path, source, destination))
    }
}
