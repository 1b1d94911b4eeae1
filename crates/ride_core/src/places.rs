//! Places: search results, recents, favorites and the place-search collaborator.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::geo::{BoundingBox, Coordinate, METERS_PER_DEGREE_LAT};
use crate::route::Waypoint;

#[cfg(feature = "nominatim")]
pub mod nominatim;

/// Title given to places with no usable name.
pub const UNKNOWN_PLACE_TITLE: &str = "Unknown Location";
/// Title of the synthetic place created from the user's location fix.
pub const MY_LOCATION_TITLE: &str = "My Location";

/// Opaque place identity. Zero is reserved for the user's own location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaceId(pub u64);

impl PlaceId {
    pub const MY_LOCATION: PlaceId = PlaceId(0);

    pub fn random() -> Self {
        Self(rand::random::<u64>().max(1))
    }
}

/// A search result, recent entry or favorite.
///
/// Two places are the same place when their ids match, whatever their titles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub title: String,
    pub subtitle: String,
    pub coordinate: Coordinate,
}

impl PartialEq for Place {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Place {
    pub fn new(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        coordinate: Coordinate,
    ) -> Self {
        Self {
            id: PlaceId::random(),
            title: title.into(),
            subtitle: subtitle.into(),
            coordinate,
        }
    }

    /// Place for the user's current position, before any address is known.
    pub fn my_location(coordinate: Coordinate) -> Self {
        Self {
            id: PlaceId::MY_LOCATION,
            title: MY_LOCATION_TITLE.to_string(),
            subtitle: String::new(),
            coordinate,
        }
    }

    pub fn from_candidate(candidate: PlaceCandidate) -> Self {
        let subtitle = candidate.address.subtitle();
        let title = candidate
            .name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| candidate.address.title.clone())
            .unwrap_or_else(|| UNKNOWN_PLACE_TITLE.to_string());
        Self::new(title, subtitle, candidate.coordinate)
    }

    pub fn is_my_location(&self) -> bool {
        self.id == PlaceId::MY_LOCATION || self.title == MY_LOCATION_TITLE
    }

    pub fn to_waypoint(&self) -> Waypoint {
        Waypoint::new(self.coordinate, self.title.clone())
    }
}

/// Structured address returned by the place-search collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponents {
    /// City or town.
    pub locality: Option<String>,
    /// Province or state.
    pub administrative_area: Option<String>,
    /// Neighbourhood.
    pub sub_locality: Option<String>,
    /// Street name.
    pub thoroughfare: Option<String>,
    /// House number.
    pub sub_thoroughfare: Option<String>,
    /// Full single-line label, used when nothing finer is known.
    pub title: Option<String>,
}

impl AddressComponents {
    /// `locality/ administrative_area`, or the full label when both are missing.
    pub fn subtitle(&self) -> String {
        let parts: Vec<&str> = [&self.locality, &self.administrative_area]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect();
        if parts.is_empty() {
            return self.title.clone().unwrap_or_default();
        }
        parts.join("/ ")
    }

    /// Short street address such as `Moda, Bahariye Caddesi, No. 12`.
    pub fn street_address(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(sub_locality) = &self.sub_locality {
            parts.push(sub_locality.clone());
        }
        if let Some(thoroughfare) = &self.thoroughfare {
            parts.push(thoroughfare.clone());
        }
        if let Some(number) = &self.sub_thoroughfare {
            parts.push(format!("No. {number}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Raw match returned by a [`PlaceSearchProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub name: Option<String>,
    pub address: AddressComponents,
    pub coordinate: Coordinate,
}

/// Region that search results are biased towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRegion {
    pub center: Coordinate,
    pub lat_span: f64,
    pub lng_span: f64,
}

impl Default for SearchRegion {
    /// Roughly the whole of Turkey, centred near Ankara.
    fn default() -> Self {
        Self {
            center: Coordinate::new(39.0, 35.0),
            lat_span: 10.0,
            lng_span: 20.0,
        }
    }
}

impl SearchRegion {
    /// Square region of `span_m` metres around `center`.
    pub fn around(center: Coordinate, span_m: f64) -> Self {
        let bounds = BoundingBox::around(center, span_m);
        Self {
            center,
            lat_span: span_m / METERS_PER_DEGREE_LAT,
            lng_span: bounds.lng_span(),
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        let half_lat = self.lat_span / 2.0;
        let half_lng = self.lng_span / 2.0;
        BoundingBox {
            lat_min: self.center.lat - half_lat,
            lat_max: self.center.lat + half_lat,
            lng_min: self.center.lng - half_lng,
            lng_max: self.center.lng + half_lng,
        }
    }
}

/// Natural-language place search and reverse geocoding.
///
/// Calls may block on I/O; the session runs them on the blocking pool.
pub trait PlaceSearchProvider: Send + Sync {
    /// Places matching `query`, best first, biased towards `region`.
    fn search(
        &self,
        query: &str,
        region: &SearchRegion,
    ) -> Result<Vec<PlaceCandidate>, SearchError>;

    /// Address of the place at `coordinate`, if the backend knows one.
    fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<Option<AddressComponents>, SearchError>;
}

/// Search backend for sessions without a place service; finds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlaceSearch;

impl PlaceSearchProvider for NoPlaceSearch {
    fn search(
        &self,
        _query: &str,
        _region: &SearchRegion,
    ) -> Result<Vec<PlaceCandidate>, SearchError> {
        Ok(Vec::new())
    }

    fn reverse_geocode(
        &self,
        _coordinate: Coordinate,
    ) -> Result<Option<AddressComponents>, SearchError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> AddressComponents {
        AddressComponents {
            locality: Some("Kadikoy".to_string()),
            administrative_area: Some("Istanbul".to_string()),
            sub_locality: Some("Moda".to_string()),
            thoroughfare: Some("Bahariye Caddesi".to_string()),
            sub_thoroughfare: Some("12".to_string()),
            title: Some("Bahariye Caddesi 12, Moda, Kadikoy".to_string()),
        }
    }

    #[test]
    fn subtitle_joins_locality_and_area() {
        assert_eq!(address().subtitle(), "Kadikoy/ Istanbul");

        let only_title = AddressComponents {
            title: Some("Somewhere".to_string()),
            ..AddressComponents::default()
        };
        assert_eq!(only_title.subtitle(), "Somewhere");
        assert_eq!(AddressComponents::default().subtitle(), "");
    }

    #[test]
    fn street_address_includes_house_number() {
        assert_eq!(
            address().street_address().as_deref(),
            Some("Moda, Bahariye Caddesi, No. 12")
        );
        assert_eq!(AddressComponents::default().street_address(), None);
    }

    #[test]
    fn candidate_without_name_falls_back() {
        let coordinate = Coordinate::new(41.0, 29.0);
        let named = Place::from_candidate(PlaceCandidate {
            name: Some("Galata Tower".to_string()),
            address: address(),
            coordinate,
        });
        assert_eq!(named.title, "Galata Tower");
        assert_eq!(named.subtitle, "Kadikoy/ Istanbul");

        let unnamed = Place::from_candidate(PlaceCandidate {
            name: None,
            address: AddressComponents::default(),
            coordinate,
        });
        assert_eq!(unnamed.title, UNKNOWN_PLACE_TITLE);
        assert!(!unnamed.is_my_location());
    }

    #[test]
    fn places_compare_by_id() {
        let coordinate = Coordinate::new(41.0, 29.0);
        let a = Place::new("A", "", coordinate);
        let mut renamed = a.clone();
        renamed.title = "B".to_string();
        assert_eq!(a, renamed);
        assert_ne!(a, Place::new("A", "", coordinate));
    }

    #[test]
    fn my_location_is_recognised() {
        let place = Place::my_location(Coordinate::new(41.0, 29.0));
        assert!(place.is_my_location());
        assert_eq!(place.to_waypoint().label, MY_LOCATION_TITLE);
    }

    #[test]
    fn default_region_covers_turkey() {
        let bounds = SearchRegion::default().bounds();
        assert!(bounds.contains(Coordinate::new(41.0082, 28.9784)));
        assert!(bounds.contains(Coordinate::new(39.9334, 32.8597)));
        assert!(!bounds.contains(Coordinate::new(48.8566, 2.3522)));
    }
}
