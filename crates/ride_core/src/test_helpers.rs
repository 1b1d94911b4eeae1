//! Test helpers: deterministic collaborator stubs and shared fixtures.
//!
//! Every stub is thread-safe and records enough about its calls for tests to
//! assert on them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{RoutingError, SearchError};
use crate::geo::{distance_meters, offset_by_meters, Coordinate};
use crate::location::LocationProvider;
use crate::places::{AddressComponents, PlaceCandidate, PlaceSearchProvider, SearchRegion};
use crate::routing::{RoutePath, RouteProvider};

/// Central Istanbul, used as the user's position across tests.
pub const TEST_CENTER: Coordinate = Coordinate::new(41.0082, 28.9784);

pub fn test_center() -> Coordinate {
    TEST_CENTER
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn straight_path(origin: Coordinate, destination: Coordinate) -> RoutePath {
    let midpoint = Coordinate::new(
        (origin.lat + destination.lat) / 2.0,
        (origin.lng + destination.lng) / 2.0,
    );
    let distance_m = distance_meters(origin, destination);
    RoutePath {
        points: vec![origin, midpoint, destination],
        distance_m,
        duration_secs: distance_m / 10.0,
    }
}

/// Always succeeds, ending call *n* `(n + 1) × spacing_m` metres east of the
/// origin, so any two answers are at least `spacing_m` apart.
pub struct SpreadRouteProvider {
    spacing_m: f64,
    calls: AtomicUsize,
}

impl SpreadRouteProvider {
    pub fn new(spacing_m: f64) -> Self {
        Self {
            spacing_m,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RouteProvider for SpreadRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        _destination: Coordinate,
        _allow_alternates: bool,
    ) -> Result<Vec<RoutePath>, RoutingError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let end = offset_by_meters(origin, (n + 1) as f64 * self.spacing_m, 0.0);
        Ok(vec![straight_path(origin, end)])
    }
}

/// Always fails with the configured error.
pub struct FailingRouteProvider {
    error: RoutingError,
}

impl FailingRouteProvider {
    pub fn with_error(error: RoutingError) -> Self {
        Self { error }
    }
}

impl Default for FailingRouteProvider {
    fn default() -> Self {
        Self {
            error: RoutingError::NoRoute,
        }
    }
}

impl RouteProvider for FailingRouteProvider {
    fn route(&self, _: Coordinate, _: Coordinate, _: bool) -> Result<Vec<RoutePath>, RoutingError> {
        Err(self.error.clone())
    }
}

/// Fails each call with probability `failure_rate`; successes end exactly at
/// the requested destination.
pub struct RandomlyFailingRouteProvider {
    rng: Mutex<StdRng>,
    failure_rate: f64,
}

impl RandomlyFailingRouteProvider {
    pub fn new(seed: u64, failure_rate: f64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl RouteProvider for RandomlyFailingRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        _allow_alternates: bool,
    ) -> Result<Vec<RoutePath>, RoutingError> {
        if lock(&self.rng).gen_bool(self.failure_rate) {
            return Err(RoutingError::Http("simulated outage".to_string()));
        }
        Ok(vec![straight_path(origin, destination)])
    }
}

/// Routes `[origin, midpoint, destination]` except for legs registered with
/// [`ScriptedRouteProvider::failing_leg`], and records every request.
#[derive(Default)]
pub struct ScriptedRouteProvider {
    failing: Vec<(Coordinate, Coordinate)>,
    delay: Duration,
    calls: Mutex<Vec<(Coordinate, Coordinate)>>,
}

impl ScriptedRouteProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_leg(mut self, origin: Coordinate, destination: Coordinate) -> Self {
        self.failing.push((origin, destination));
        self
    }

    /// Block every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(Coordinate, Coordinate)> {
        lock(&self.calls).clone()
    }
}

impl RouteProvider for ScriptedRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        _allow_alternates: bool,
    ) -> Result<Vec<RoutePath>, RoutingError> {
        lock(&self.calls).push((origin, destination));
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.failing.contains(&(origin, destination)) {
            return Err(RoutingError::NoRoute);
        }
        Ok(vec![straight_path(origin, destination)])
    }
}

/// Place search stub. Answers from per-query results when registered, and
/// from the shared result list otherwise.
#[derive(Default)]
pub struct RecordingPlaceSearch {
    results: Vec<PlaceCandidate>,
    results_by_query: HashMap<String, Vec<PlaceCandidate>>,
    delay: Duration,
    address: Option<AddressComponents>,
    fail: bool,
    queries: Mutex<Vec<String>>,
    reverse_lookups: Mutex<Vec<Coordinate>>,
}

impl RecordingPlaceSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, results: Vec<PlaceCandidate>) -> Self {
        self.results = results;
        self
    }

    pub fn with_query_results(mut self, query: &str, results: Vec<PlaceCandidate>) -> Self {
        self.results_by_query.insert(query.to_string(), results);
        self
    }

    /// Block every search for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_address(mut self, address: AddressComponents) -> Self {
        self.address = Some(address);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }

    pub fn reverse_lookups(&self) -> Vec<Coordinate> {
        lock(&self.reverse_lookups).clone()
    }
}

impl PlaceSearchProvider for RecordingPlaceSearch {
    fn search(
        &self,
        query: &str,
        _region: &SearchRegion,
    ) -> Result<Vec<PlaceCandidate>, SearchError> {
        lock(&self.queries).push(query.to_string());
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail {
            return Err(SearchError::Http("simulated outage".to_string()));
        }
        Ok(self
            .results_by_query
            .get(query)
            .unwrap_or(&self.results)
            .clone())
    }

    fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<Option<AddressComponents>, SearchError> {
        lock(&self.reverse_lookups).push(coordinate);
        if self.fail {
            return Err(SearchError::Http("simulated outage".to_string()));
        }
        Ok(self.address.clone())
    }
}

/// Counts permission requests and start/stop calls.
#[derive(Default)]
pub struct RecordingLocationProvider {
    permission_requests: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl RecordingLocationProvider {
    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl LocationProvider for RecordingLocationProvider {
    fn request_permission(&self) {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Candidate named `name` at `coordinate` with a Kadikoy address.
pub fn candidate(name: &str, coordinate: Coordinate) -> PlaceCandidate {
    PlaceCandidate {
        name: Some(name.to_string()),
        address: AddressComponents {
            locality: Some("Kadikoy".to_string()),
            administrative_area: Some("Istanbul".to_string()),
            ..AddressComponents::default()
        },
        coordinate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spread_provider_answers_are_spaced() {
        let provider = SpreadRouteProvider::new(60.0);
        let first = provider.route(TEST_CENTER, TEST_CENTER, false).expect("route");
        let second = provider.route(TEST_CENTER, TEST_CENTER, false).expect("route");
        let a = *first[0].points.last().expect("point");
        let b = *second[0].points.last().expect("point");
        assert!(distance_meters(a, b) >= 59.0);
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn scripted_provider_fails_only_registered_legs() {
        let a = TEST_CENTER;
        let b = offset_by_meters(a, 100.0, 0.0);
        let provider = ScriptedRouteProvider::new().failing_leg(a, b);
        assert_eq!(provider.route(a, b, false), Err(RoutingError::NoRoute));
        assert!(provider.route(b, a, false).is_ok());
        assert_eq!(provider.calls(), vec![(a, b), (b, a)]);
    }
}
