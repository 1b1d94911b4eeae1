//! Error types shared across the crate.
//!
//! Most failures in this crate are expected outcomes (no road, no results)
//! and are folded into empty results at the call site. These enums exist so
//! collaborators can say *why* something failed before it is logged.

/// Failure reported by a [`RouteProvider`](crate::routing::RouteProvider).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    /// Origin and destination are not connected by road. Expected, not a fault.
    #[error("no route between the requested points")]
    NoRoute,
    #[error("routing request failed: {0}")]
    Http(String),
    #[error("routing response could not be decoded: {0}")]
    InvalidResponse(String),
    #[error("routing service returned code {0}")]
    Api(String),
}

/// Failure reported by a [`PlaceSearchProvider`](crate::places::PlaceSearchProvider).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("place search request failed: {0}")]
    Http(String),
    #[error("place search response could not be decoded: {0}")]
    InvalidResponse(String),
}

/// Failure reported by a [`KeyValueStore`](crate::store::KeyValueStore).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    InvalidFormat(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("coordinate ({lat}, {lng}) is outside the valid range")]
    OutOfRange { lat: f64, lng: f64 },
}

/// Rejected edits to a [`RouteDraft`](crate::draft::RouteDraft).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("a route may have at most {max} stops")]
    StopLimitReached { max: usize },
    #[error("there is no stop at index {0}")]
    NoSuchStop(usize),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    InvalidFormat(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("the session has shut down")]
    Closed,
}
