//! User location: the provider interface and fix bookkeeping.
//!
//! Fixes are pushed into the session by the presentation layer; the provider
//! trait only lets the session ask for permission and start or stop updates.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Platform location permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthorizationState {
    #[default]
    NotDetermined,
    Restricted,
    Denied,
    AuthorizedWhenInUse,
    AuthorizedAlways,
}

impl AuthorizationState {
    pub fn is_authorized(self) -> bool {
        matches!(self, Self::AuthorizedWhenInUse | Self::AuthorizedAlways)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius in metres, if reported.
    pub accuracy_m: Option<f64>,
}

impl LocationFix {
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            accuracy_m: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationUpdate {
    Fix(LocationFix),
    Authorization(AuthorizationState),
}

pub trait LocationProvider: Send + Sync {
    fn request_permission(&self);
    fn start(&self);
    fn stop(&self);
}

/// Provider for hosts that deliver fixes without a permission flow.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLocationProvider;

impl LocationProvider for NoopLocationProvider {
    fn request_permission(&self) {}
    fn start(&self) {}
    fn stop(&self) {}
}

/// What an update changed, as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationChange {
    /// First fix of the session.
    InitialFix(Coordinate),
    PositionUpdated(Coordinate),
    AuthorizationChanged {
        state: AuthorizationState,
        became_authorized: bool,
    },
    Unchanged,
}

/// Tracks the latest fix and authorization state.
#[derive(Debug, Default)]
pub struct LocationTracker {
    current: Option<LocationFix>,
    authorization: AuthorizationState,
}

impl LocationTracker {
    pub fn current(&self) -> Option<Coordinate> {
        self.current.map(|fix| fix.coordinate)
    }

    pub fn authorization(&self) -> AuthorizationState {
        self.authorization
    }

    pub fn apply(&mut self, update: LocationUpdate) -> LocationChange {
        match update {
            LocationUpdate::Fix(fix) => {
                if Coordinate::validated(fix.coordinate.lat, fix.coordinate.lng).is_err() {
                    log::warn!("ignoring invalid location fix {:?}", fix.coordinate);
                    return LocationChange::Unchanged;
                }
                let initial = self.current.is_none();
                self.current = Some(fix);
                if initial {
                    LocationChange::InitialFix(fix.coordinate)
                } else {
                    LocationChange::PositionUpdated(fix.coordinate)
                }
            }
            LocationUpdate::Authorization(state) => {
                if state == self.authorization {
                    return LocationChange::Unchanged;
                }
                let became_authorized =
                    state.is_authorized() && !self.authorization.is_authorized();
                self.authorization = state;
                LocationChange::AuthorizationChanged {
                    state,
                    became_authorized,
                }
            }
        }
    }
}
