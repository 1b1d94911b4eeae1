//! OSRM `/route` service client.
//!
//! Wraps a blocking HTTP client and maps OSRM's JSON response onto
//! [`RoutePath`]s without leaking details of the HTTP response.

use std::time::Duration;

use reqwest::{blocking::Client, Url};
use serde::Deserialize;

use super::{RoutePath, RouteProvider};
use crate::error::RoutingError;
use crate::geo::Coordinate;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Routes via an OSRM HTTP endpoint.
#[derive(Debug, Clone)]
pub struct OsrmRouteProvider {
    client: Client,
    endpoint: String,
}

impl OsrmRouteProvider {
    /// Create a provider for the given OSRM endpoint (e.g. `http://localhost:5000`).
    pub fn new(endpoint: &str) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| RoutingError::Http(format!("failed to build OSRM client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn route_url(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        allow_alternates: bool,
    ) -> Result<Url, RoutingError> {
        // OSRM expects lng,lat pairs.
        let base = format!(
            "{}/route/v1/driving/{:.6},{:.6};{:.6},{:.6}",
            self.endpoint, origin.lng, origin.lat, destination.lng, destination.lat,
        );
        let mut url = Url::parse(&base)
            .map_err(|err| RoutingError::Http(format!("failed to build OSRM URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson")
            .append_pair("alternatives", if allow_alternates { "true" } else { "false" });
        Ok(url)
    }
}

impl RouteProvider for OsrmRouteProvider {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        allow_alternates: bool,
    ) -> Result<Vec<RoutePath>, RoutingError> {
        let url = self.route_url(origin, destination, allow_alternates)?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| RoutingError::Http(err.to_string()))?;
        let parsed: OsrmRouteResponse = response
            .json()
            .map_err(|err| RoutingError::InvalidResponse(err.to_string()))?;

        let mut paths = parse_route_response(parsed)?;
        if !allow_alternates {
            paths.truncate(1);
        }
        Ok(paths)
    }
}

/// Minimal OSRM JSON response structures.
#[derive(Deserialize)]
struct OsrmRouteResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64, // metres
    duration: f64, // seconds
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>, // [lng, lat]
}

fn parse_route_response(resp: OsrmRouteResponse) -> Result<Vec<RoutePath>, RoutingError> {
    match resp.code.as_str() {
        "Ok" => {}
        "NoRoute" | "NoSegment" => return Err(RoutingError::NoRoute),
        _ => return Err(RoutingError::Api(resp.code)),
    }

    let paths: Vec<RoutePath> = resp
        .routes
        .unwrap_or_default()
        .into_iter()
        .map(|route| RoutePath {
            points: route
                .geometry
                .coordinates
                .iter()
                .map(|c| Coordinate::new(c[1], c[0]))
                .collect(),
            distance_m: route.distance,
            duration_secs: route.duration,
        })
        .filter(|path| !path.points.is_empty())
        .collect();

    if paths.is_empty() {
        return Err(RoutingError::NoRoute);
    }
    Ok(paths)
}
