//! Pluggable route providers: trait abstraction for routing backends.
//!
//! Three implementations, selectable via [`RouteProviderKind`]:
//!
//! - **`StraightLineRouteProvider`**: Direct origin→destination line + Haversine.
//!   Zero dependencies.
//! - **`OsrmRouteProvider`** (feature `osrm`): Calls a local/remote OSRM HTTP endpoint.
//! - **`PrecomputedRouteProvider`** (feature `precomputed`): Loads a serialized route
//!   table from disk.
//!
//! Providers are shared as `Arc<dyn RouteProvider>` between the road snapper,
//! the fleet generator and the route computer.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use h3o::Resolution;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::error::RoutingError;
use crate::geo::{distance_meters, Coordinate};

#[cfg(feature = "osrm")]
pub mod osrm;
#[cfg(feature = "precomputed")]
pub mod precomputed;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// One candidate path returned by a routing backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    /// Polyline along the road, origin first.
    pub points: Vec<Coordinate>,
    /// Road-network distance in metres.
    pub distance_m: f64,
    /// Free-flow travel time in seconds.
    pub duration_secs: f64,
}

/// Which routing backend to use.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum RouteProviderKind {
    /// Straight segments between the endpoints, zero external dependencies.
    #[default]
    StraightLine,
    /// OSRM HTTP endpoint (e.g. `"http://localhost:5000"`).
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
    /// Pre-computed route table loaded from a binary file at startup.
    #[cfg(feature = "precomputed")]
    Precomputed { path: String },
}

/// Trait for routing backends. Implementations must be `Send + Sync` so one
/// provider can serve many concurrent snap attempts.
///
/// Calls may block on I/O; async callers run them on the blocking pool.
pub trait RouteProvider: Send + Sync {
    /// Driving routes from `origin` to `destination`, best first.
    ///
    /// Returns [`RoutingError::NoRoute`] when the points are not connected by
    /// road. With `allow_alternates == false` at most one path is returned.
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        allow_alternates: bool,
    ) -> Result<Vec<RoutePath>, RoutingError>;
}

// ---------------------------------------------------------------------------
// Straight-line provider (always available)
// ---------------------------------------------------------------------------

const STRAIGHT_LINE_SPEED_KMH: f64 = 40.0;

/// Connects the endpoints directly. Useful offline and as a default; it never
/// fails, so it cannot move an off-road target onto a road.
pub struct StraightLineRouteProvider;

impl RouteProvider for StraightLineRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        _allow_alternates: bool,
    ) -> Result<Vec<RoutePath>, RoutingError> {
        let distance_m = distance_meters(origin, destination);
        // Estimate free-flow duration at 40 km/h average city speed
        let duration_secs = distance_m / 1000.0 / STRAIGHT_LINE_SPEED_KMH * 3600.0;
        Ok(vec![RoutePath {
            points: vec![origin, destination],
            distance_m,
            duration_secs,
        }])
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

/// Endpoints are quantized to H3 resolution 15 (~0.5 m) before keying.
const CACHE_KEY_RESOLUTION: Resolution = Resolution::Fifteen;

type RouteKey = (u64, u64, bool);

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// Cache key is `(origin_cell, destination_cell, allow_alternates)` (directional).
/// Only successful lookups are cached; failures are retried on the next call.
pub struct CachedRouteProvider {
    inner: Arc<dyn RouteProvider>,
    cache: Mutex<LruCache<RouteKey, Vec<RoutePath>>>,
}

impl CachedRouteProvider {
    pub fn new(inner: Arc<dyn RouteProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn key(
        origin: Coordinate,
        destination: Coordinate,
        allow_alternates: bool,
    ) -> Option<RouteKey> {
        let from = origin.to_cell(CACHE_KEY_RESOLUTION)?;
        let to = destination.to_cell(CACHE_KEY_RESOLUTION)?;
        Some((u64::from(from), u64::from(to), allow_alternates))
    }
}

impl RouteProvider for CachedRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        allow_alternates: bool,
    ) -> Result<Vec<RoutePath>, RoutingError> {
        let Some(key) = Self::key(origin, destination, allow_alternates) else {
            return self.inner.route(origin, destination, allow_alternates);
        };

        // Fast path: cache hit
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return Ok(cached.clone());
            }
        }

        let result = self.inner.route(origin, destination, allow_alternates)?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, result.clone());
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Factory: build a provider from RouteProviderKind
// ---------------------------------------------------------------------------

/// Default route cache capacity (used by OSRM and precomputed providers).
#[cfg(any(feature = "osrm", feature = "precomputed"))]
const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

/// Construct a shared [`RouteProvider`] from a [`RouteProviderKind`] descriptor.
///
/// - `StraightLine` is returned without caching (it is pure arithmetic).
/// - `Osrm` and `Precomputed` providers are wrapped in a [`CachedRouteProvider`].
pub fn build_route_provider(
    kind: &RouteProviderKind,
) -> Result<Arc<dyn RouteProvider>, RoutingError> {
    match kind {
        RouteProviderKind::StraightLine => Ok(Arc::new(StraightLineRouteProvider)),

        #[cfg(feature = "osrm")]
        RouteProviderKind::Osrm { endpoint } => {
            let inner = Arc::new(osrm::OsrmRouteProvider::new(endpoint)?);
            Ok(Arc::new(CachedRouteProvider::new(
                inner,
                DEFAULT_ROUTE_CACHE_CAPACITY,
            )))
        }

        #[cfg(feature = "precomputed")]
        RouteProviderKind::Precomputed { path } => {
            let inner = Arc::new(precomputed::PrecomputedRouteProvider::from_file(path)?);
            Ok(Arc::new(CachedRouteProvider::new(
                inner,
                DEFAULT_ROUTE_CACHE_CAPACITY,
            )))
        }
    }
}
