//! Road snapping via the routing provider.
//!
//! There is no dedicated snap service behind [`RouteProvider`], so a target is
//! snapped by routing to it: the last point of a driving route always lies on
//! a road, while the raw target may sit in water or inside a building.

use std::sync::Arc;

use crate::error::RoutingError;
use crate::geo::Coordinate;
use crate::routing::{RoutePath, RouteProvider};

pub struct RoadSnapper {
    provider: Arc<dyn RouteProvider>,
}

impl RoadSnapper {
    pub fn new(provider: Arc<dyn RouteProvider>) -> Self {
        Self { provider }
    }

    /// Snap `target` onto the road network by routing to it from `origin`.
    ///
    /// Returns `None` when no route exists or the provider fails. No retry is
    /// attempted here; callers retry by picking a new target.
    pub fn snap(&self, target: Coordinate, origin: Coordinate) -> Option<Coordinate> {
        match self.provider.route(origin, target, false) {
            Ok(paths) => {
                let snapped = route_end(&paths);
                if snapped.is_none() {
                    log::debug!("road snap got an empty path for {target:?}");
                }
                snapped
            }
            Err(RoutingError::NoRoute) => {
                log::debug!("road snap found no route to {target:?}");
                None
            }
            Err(err) => {
                log::warn!("road snap failed for {target:?}: {err}");
                None
            }
        }
    }
}

/// Last point of the best path, if any.
pub fn route_end(paths: &[RoutePath]) -> Option<Coordinate> {
    paths.first().and_then(|path| path.points.last()).copied()
}
