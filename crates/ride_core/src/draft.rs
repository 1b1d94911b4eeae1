//! The route being edited: pickup, up to `max_stops` stops, destination.

use serde::{Deserialize, Serialize};

use crate::error::DraftError;
use crate::geo::Coordinate;
use crate::places::Place;
use crate::route::Waypoint;

/// Which input a search query or selection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SearchField {
    Pickup,
    Stop(usize),
    #[default]
    Destination,
}

#[derive(Debug, Clone)]
pub struct RouteDraft {
    pub pickup: Option<Place>,
    /// Stop slots in route order; `None` until a place is chosen.
    pub stops: Vec<Option<Place>>,
    pub destination: Option<Place>,
    max_stops: usize,
}

impl RouteDraft {
    pub fn new(max_stops: usize) -> Self {
        Self {
            pickup: None,
            stops: Vec::new(),
            destination: None,
            max_stops,
        }
    }

    pub fn max_stops(&self) -> usize {
        self.max_stops
    }

    /// Append an empty stop slot and return its index.
    pub fn add_stop(&mut self) -> Result<usize, DraftError> {
        if self.stops.len() >= self.max_stops {
            return Err(DraftError::StopLimitReached {
                max: self.max_stops,
            });
        }
        self.stops.push(None);
        Ok(self.stops.len() - 1)
    }

    pub fn remove_stop(&mut self, index: usize) -> Result<Option<Place>, DraftError> {
        if index >= self.stops.len() {
            return Err(DraftError::NoSuchStop(index));
        }
        Ok(self.stops.remove(index))
    }

    pub fn swap_endpoints(&mut self) {
        std::mem::swap(&mut self.pickup, &mut self.destination);
    }

    /// Put `place` into `field`. Selecting into a missing stop slot does nothing.
    pub fn select(&mut self, field: SearchField, place: Place) -> bool {
        match field {
            SearchField::Pickup => self.pickup = Some(place),
            SearchField::Destination => self.destination = Some(place),
            SearchField::Stop(index) => match self.stops.get_mut(index) {
                Some(slot) => *slot = Some(place),
                None => return false,
            },
        }
        true
    }

    /// Use the user's position as pickup.
    pub fn set_pickup_to_location(&mut self, coordinate: Coordinate) {
        self.pickup = Some(Place::my_location(coordinate));
    }

    /// Give the location pickup a readable address. Ignored once the user
    /// has picked another pickup or the location has moved on.
    pub fn name_location_pickup(&mut self, coordinate: Coordinate, address: String) -> bool {
        match &mut self.pickup {
            Some(pickup) if pickup.is_my_location() && pickup.coordinate == coordinate => {
                pickup.title = address;
                true
            }
            _ => false,
        }
    }

    /// Waypoints of the stops that have a place, in order.
    pub fn stop_waypoints(&self) -> Vec<Waypoint> {
        self.stops
            .iter()
            .flatten()
            .map(Place::to_waypoint)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(title: &str) -> Place {
        Place::new(title, "", Coordinate::new(41.0, 29.0))
    }

    #[test]
    fn stop_limit_is_enforced() {
        let mut draft = RouteDraft::new(3);
        assert_eq!(draft.add_stop(), Ok(0));
        assert_eq!(draft.add_stop(), Ok(1));
        assert_eq!(draft.add_stop(), Ok(2));
        assert_eq!(
            draft.add_stop(),
            Err(DraftError::StopLimitReached { max: 3 })
        );
        assert_eq!(draft.stops.len(), 3);
    }

    #[test]
    fn remove_stop_checks_bounds() {
        let mut draft = RouteDraft::new(3);
        draft.add_stop().expect("slot");
        assert!(draft.select(SearchField::Stop(0), place("Stop")));
        assert_eq!(
            draft.remove_stop(0).expect("removed").map(|p| p.title),
            Some("Stop".to_string())
        );
        assert_eq!(draft.remove_stop(0), Err(DraftError::NoSuchStop(0)));
    }

    #[test]
    fn select_into_missing_stop_is_ignored() {
        let mut draft = RouteDraft::new(3);
        assert!(!draft.select(SearchField::Stop(1), place("Nowhere")));
        assert!(draft.stops.is_empty());
    }

    #[test]
    fn swap_exchanges_pickup_and_destination() {
        let mut draft = RouteDraft::new(3);
        let a = place("A");
        let b = place("B");
        draft.select(SearchField::Pickup, a.clone());
        draft.select(SearchField::Destination, b.clone());
        draft.swap_endpoints();
        assert_eq!(draft.pickup, Some(b));
        assert_eq!(draft.destination, Some(a));
    }

    #[test]
    fn stop_waypoints_skip_empty_slots() {
        let mut draft = RouteDraft::new(3);
        draft.add_stop().expect("slot");
        draft.add_stop().expect("slot");
        draft.select(SearchField::Stop(1), place("Second"));
        let waypoints = draft.stop_waypoints();
        assert_eq!(waypoints.len(), 1);
        assert_eq!(waypoints[0].label, "Second");
    }

    #[test]
    fn location_pickup_takes_address_only_while_current() {
        let here = Coordinate::new(41.0, 29.0);
        let mut draft = RouteDraft::new(3);
        draft.set_pickup_to_location(here);
        assert!(draft.name_location_pickup(here, "Moda, Bahariye Caddesi".to_string()));
        assert_eq!(
            draft.pickup.as_ref().map(|p| p.title.as_str()),
            Some("Moda, Bahariye Caddesi")
        );

        draft.select(SearchField::Pickup, place("Elsewhere"));
        assert!(!draft.name_location_pickup(here, "Late answer".to_string()));
    }
}
